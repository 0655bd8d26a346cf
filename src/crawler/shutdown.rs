//! Cooperative shutdown
//!
//! A single [`ShutdownCoordinator`] is shared by the signal listener and every
//! traversal task. Once triggered it stays triggered: tasks stop admitting new
//! pages, in-flight work finishes, and an optional watchdog forces the process
//! down if that takes longer than the grace period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Exit status used when the grace period runs out
pub const FORCED_EXIT_CODE: i32 = 130;

/// Shared, set-once shutdown flag with a grace-period watchdog
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    triggered: Arc<AtomicBool>,
    watchdog: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown
    ///
    /// Returns true only for the call that actually flipped the flag.
    pub fn trigger(&self) -> bool {
        let first = !self.triggered.swap(true, Ordering::SeqCst);
        if first {
            tracing::info!("Shutdown requested, finishing in-flight pages");
        }
        self.token.cancel();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been triggered
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Starts a timer that calls `on_expire` unless disarmed within `grace`
    ///
    /// Arming again replaces the previous timer.
    pub fn arm_watchdog<F>(&self, grace: Duration, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            tracing::error!(
                "In-flight pages did not finish within {:?}, forcing exit",
                grace
            );
            on_expire();
        });

        let mut slot = self.watchdog.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Cancels a pending watchdog, if any
    pub fn disarm(&self) {
        let mut slot = self.watchdog.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    /// Spawns a task that triggers shutdown on Ctrl-C or SIGTERM
    ///
    /// When a signal arrives the watchdog is armed with `grace` and
    /// `on_expire`. The listener exits quietly if shutdown is triggered some
    /// other way first.
    pub fn listen_for_signals<F>(&self, grace: Duration, on_expire: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => {
                    tracing::warn!("Interrupt received, stopping after in-flight pages");
                    this.trigger();
                    this.arm_watchdog(grace, on_expire);
                }
                _ = this.cancelled() => {}
            }
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_trigger_is_set_once() {
        let shutdown = ShutdownCoordinator::new();
        assert!(!shutdown.is_triggered());
        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_clones_share_state() {
        let shutdown = ShutdownCoordinator::new();
        let clone = shutdown.clone();
        clone.trigger();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_trigger() {
        let shutdown = ShutdownCoordinator::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.cancelled().await })
        };
        shutdown.trigger();
        waiter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_fires_after_grace() {
        let shutdown = ShutdownCoordinator::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        shutdown.arm_watchdog(Duration::from_secs(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_watchdog_never_fires() {
        let shutdown = ShutdownCoordinator::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        shutdown.arm_watchdog(Duration::from_secs(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        shutdown.disarm();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
