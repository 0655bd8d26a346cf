//! Concurrency gates bounding render sessions and link expansion
//!
//! A [`Gate`] is a counting semaphore with instrumentation: it tracks how many
//! permits are currently held and the highest number ever held at once, so
//! the bounds can be observed from tests and reported at the end of a run.

use crate::PagefoldError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Share of the open-file limit given to render sessions
const RENDER_SESSION_SHARE_PERCENT: u64 = 80;

/// Open-file limit assumed when the real one cannot be read
const FALLBACK_OPEN_FILE_LIMIT: u64 = 1024;

/// A bounded counting gate with acquire/release semantics
pub struct Gate {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    capacity: usize,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// A held slot of a [`Gate`]; the slot is returned when this is dropped
#[must_use = "the gate slot is released as soon as the permit is dropped"]
pub struct GatePermit {
    active: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Runs before the semaphore permit field is dropped, so `active`
        // never counts more holders than the semaphore allows.
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Gate {
    /// Creates a gate with `capacity` slots (at least one)
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Waits for a free slot
    ///
    /// # Errors
    ///
    /// Fails only if the gate has been closed, which halts the run.
    pub async fn acquire(&self) -> Result<GatePermit, PagefoldError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PagefoldError::Task(format!("{} gate closed", self.name)))?;

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tracing::trace!("{} gate: {}/{} in use", self.name, now, self.capacity);

        Ok(GatePermit {
            active: Arc::clone(&self.active),
            _permit: permit,
        })
    }

    /// Closes the gate; pending and future acquisitions fail
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of slots held at the same time so far
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Computes the render-session gate capacity from the process's open-file limit
///
/// Each open session can hold several sockets and files, so the gate keeps a
/// fifth of the limit in reserve.
pub fn render_session_capacity() -> usize {
    let limit = std::fs::read_to_string("/proc/self/limits")
        .ok()
        .and_then(|text| parse_open_file_limit(&text))
        .unwrap_or_else(|| {
            tracing::debug!(
                "Open-file limit unavailable, assuming {}",
                FALLBACK_OPEN_FILE_LIMIT
            );
            FALLBACK_OPEN_FILE_LIMIT
        });

    capacity_for_limit(limit)
}

fn capacity_for_limit(limit: u64) -> usize {
    let capacity = limit.saturating_mul(RENDER_SESSION_SHARE_PERCENT) / 100;
    usize::try_from(capacity).unwrap_or(usize::MAX).max(1)
}

/// Extracts the soft "Max open files" limit from `/proc/<pid>/limits` text
fn parse_open_file_limit(text: &str) -> Option<u64> {
    text.lines()
        .find_map(|line| line.strip_prefix("Max open files"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|soft| soft.parse::<u64>().ok())
}
