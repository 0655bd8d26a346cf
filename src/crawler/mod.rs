//! Crawler module for recursive page traversal
//!
//! This module contains the core traversal logic, including:
//! - Admission control over a shared visited set
//! - Page loading with bounded retries and backoff
//! - Concurrency gates for render sessions and link expansion
//! - Cooperative shutdown and progress aggregation
//! - The traversal engine tying these together

pub mod admission;
mod engine;
pub mod limiter;
pub mod progress;
pub mod retry;
mod shutdown;

pub use admission::{Admission, AdmissionFilter, SkipReason, VisitedSet};
pub use engine::{Engine, RunReport, TaskState, TraversalTask};
pub use limiter::{render_session_capacity, Gate, GatePermit};
pub use progress::{ErrorReason, FailureRecord, Outcome, Progress, ProgressSnapshot};
pub use retry::{fetch_and_render, RetryPolicy};
pub use shutdown::{ShutdownCoordinator, FORCED_EXIT_CODE};

use crate::config::TraversalConfig;
use crate::render::Renderer;
use crate::PagefoldError;
use std::sync::Arc;

/// Runs a complete traversal
///
/// This is the main entry point for a crawl. It will:
/// 1. Build the engine and its gates
/// 2. Visit the base URL and every admitted page below it
/// 3. Export each page through the renderer
/// 4. Merge the exported pages when requested
///
/// # Arguments
///
/// * `config` - The validated traversal configuration
/// * `renderer` - Rendering backend used for every page
/// * `shutdown` - Coordinator shared with the signal listener
///
/// # Returns
///
/// * `Ok(RunReport)` - Traversal finished, possibly with per-page failures
/// * `Err(PagefoldError)` - The renderer was unusable and the run halted
pub async fn crawl(
    config: TraversalConfig,
    renderer: Arc<dyn Renderer>,
    shutdown: ShutdownCoordinator,
) -> Result<RunReport, PagefoldError> {
    Engine::new(config, renderer, shutdown).run().await
}
