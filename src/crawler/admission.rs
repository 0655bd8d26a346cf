//! Admission control: depth, scope, exclusions and the visited set
//!
//! [`AdmissionFilter::check`] is a read-only pre-filter that may be consulted
//! any number of times. [`AdmissionFilter::admit`] is the only place a URL is
//! marked visited, and it does so atomically.

use crate::config::TraversalConfig;
use crate::crawler::ShutdownCoordinator;
use crate::url::{matches_allowed, normalize_url, NormalizePolicy};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Why a URL was not visited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooDeep,
    Visited,
    OutOfScope,
    Excluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TooDeep => "beyond max depth",
            Self::Visited => "already visited",
            Self::OutOfScope => "outside allow-list",
            Self::Excluded => "excluded",
        };
        f.write_str(label)
    }
}

/// Result of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    AlreadyVisited,
    ShuttingDown,
}

/// Set of normalized URLs admitted during the run
///
/// Entries are only ever added.
#[derive(Debug, Default)]
pub struct VisitedSet {
    inner: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock().contains(identity)
    }

    /// Inserts `identity` unless it is present or shutdown has started
    ///
    /// The shutdown check and the insert happen under the same lock, so no
    /// URL is admitted after the flag is observed set.
    pub fn try_admit(&self, identity: String, shutdown: &ShutdownCoordinator) -> Admission {
        let mut visited = self.lock();
        if shutdown.is_triggered() {
            return Admission::ShuttingDown;
        }
        if visited.insert(identity) {
            Admission::Admitted
        } else {
            Admission::AlreadyVisited
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decides whether a candidate URL may be visited
pub struct AdmissionFilter {
    config: Arc<TraversalConfig>,
    policy: NormalizePolicy,
    visited: VisitedSet,
}

impl AdmissionFilter {
    pub fn new(config: Arc<TraversalConfig>) -> Self {
        let policy = config.normalize_policy();
        Self {
            config,
            policy,
            visited: VisitedSet::new(),
        }
    }

    /// Normalized identity of `url` under the run's policy
    pub fn identity(&self, url: &Url) -> String {
        normalize_url(url, &self.policy)
    }

    /// Returns the first reason `url` should not be visited at `depth`
    pub fn check(&self, url: &Url, depth: u32) -> Option<SkipReason> {
        if depth > self.config.max_depth {
            return Some(SkipReason::TooDeep);
        }

        let identity = self.identity(url);
        if self.visited.contains(&identity) {
            return Some(SkipReason::Visited);
        }

        if !matches_allowed(url, &self.config.allowed_prefixes) {
            return Some(SkipReason::OutOfScope);
        }

        if self.config.excluded.contains(&identity) {
            return Some(SkipReason::Excluded);
        }

        None
    }

    /// Read-only pre-filter
    pub fn should_skip(&self, url: &Url, depth: u32) -> bool {
        self.check(url, depth).is_some()
    }

    /// Marks `url` visited; the sole write point of the visited set
    pub fn admit(&self, url: &Url, shutdown: &ShutdownCoordinator) -> Admission {
        self.visited.try_admit(self.identity(url), shutdown)
    }

    /// Number of distinct pages admitted so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
