//! Traversal engine - recursive, bounded-concurrency page processing
//!
//! Each page is handled by one traversal task. A task runs its processing
//! unit (admission, render, export, link extraction) while holding a
//! render-session permit, releases it, then fans out over the page's links
//! and waits for the spawned children. Tasks are spawned onto the runtime, so
//! deep or wide sites never grow a call stack.
//!
//! Gate discipline:
//! - the render-session permit is held only during the processing unit
//! - an expansion permit is acquired by the parent for each regular child,
//!   after the parent has released its own render-session permit, and is
//!   released when the child's processing unit ends
//! - pagination children and the root task carry no expansion permit
//!
//! No task ever waits on another task while holding a permit.

use crate::config::TraversalConfig;
use crate::crawler::admission::{Admission, AdmissionFilter, SkipReason};
use crate::crawler::limiter::{render_session_capacity, Gate, GatePermit};
use crate::crawler::progress::{ErrorReason, FailureRecord, Outcome, Progress, ProgressSnapshot};
use crate::crawler::retry::{fetch_and_render, RetryPolicy};
use crate::crawler::ShutdownCoordinator;
use crate::output::document_file_name;
use crate::render::{MergePart, RenderError, RenderSession, Renderer};
use crate::url::{is_notebook_url, is_pagination_link, join};
use crate::PagefoldError;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use url::Url;

/// File name of the merged document, without extension
const MERGED_STEM: &str = "merged";

type TaskFuture = Pin<Box<dyn Future<Output = Result<TaskState, PagefoldError>> + Send>>;

/// Terminal state of one traversal task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Completed,
    Skipped(SkipReason),
    ShutdownAborted,
}

/// One page waiting to be processed
pub struct TraversalTask {
    pub url: Url,
    pub depth: u32,
    /// Expansion slot reserved by the parent; released after processing
    pub expansion: Option<GatePermit>,
}

impl TraversalTask {
    pub fn root(url: Url) -> Self {
        Self {
            url,
            depth: 0,
            expansion: None,
        }
    }
}

/// What the processing unit of a task produced
enum Processed {
    Skipped(SkipReason),
    Aborted,
    /// Absolute link candidates to fan out over
    Links(Vec<Url>),
}

/// Final state of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub progress: ProgressSnapshot,
    pub failures: Vec<FailureRecord>,
    /// Distinct pages admitted
    pub visited: usize,
    /// Highest number of render sessions open at once
    pub peak_render_sessions: usize,
    /// Highest number of expansion slots held at once
    pub peak_expansions: usize,
    /// Path of the merged document, when one was written
    pub merged_document: Option<PathBuf>,
    /// True if shutdown was triggered before the traversal finished
    pub interrupted: bool,
}

/// Drives a traversal from the base URL
pub struct Engine {
    config: Arc<TraversalConfig>,
    renderer: Arc<dyn Renderer>,
    shutdown: ShutdownCoordinator,
    filter: AdmissionFilter,
    render_gate: Gate,
    expansion_gate: Gate,
    retry: RetryPolicy,
    progress: Progress,
    merge_parts: Mutex<Vec<MergePart>>,
    merged_document: Mutex<Option<PathBuf>>,
    origin: String,
}

impl Engine {
    /// Creates an engine for one run
    ///
    /// The render-session gate takes its capacity from the configuration
    /// when set, otherwise from the process's open-file limit.
    pub fn new(
        config: TraversalConfig,
        renderer: Arc<dyn Renderer>,
        shutdown: ShutdownCoordinator,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let render_sessions = config
            .render_sessions
            .unwrap_or_else(render_session_capacity);
        let filter = AdmissionFilter::new(Arc::clone(&config));
        let origin = filter.identity(&config.base_url);

        tracing::debug!(
            "Gates: {} render sessions, {} expansions",
            render_sessions,
            config.concurrency
        );

        Arc::new(Self {
            render_gate: Gate::new("render-session", render_sessions),
            expansion_gate: Gate::new("expansion", config.concurrency),
            retry: RetryPolicy::from_config(&config),
            progress: Progress::new(config.max_pages),
            merge_parts: Mutex::new(Vec::new()),
            merged_document: Mutex::new(None),
            filter,
            origin,
            renderer,
            shutdown,
            config,
        })
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    pub fn render_gate(&self) -> &Gate {
        &self.render_gate
    }

    pub fn expansion_gate(&self) -> &Gate {
        &self.expansion_gate
    }

    /// Traverses from the base URL until every reachable page is done
    ///
    /// Per-page failures are recorded in the report. The run as a whole only
    /// fails when the renderer cannot be used at all or a gate is torn down;
    /// [`Engine::report`] still reflects the work done up to that point.
    pub async fn run(self: &Arc<Self>) -> Result<RunReport, PagefoldError> {
        tracing::info!(
            "Starting traversal of {} (max depth {}, concurrency {})",
            self.config.base_url,
            self.config.max_depth,
            self.config.concurrency
        );

        let root = TraversalTask::root(self.config.base_url.clone());
        let state = Arc::clone(self).visit(root).await?;
        tracing::debug!("Root task finished: {:?}", state);

        if self.config.merge {
            self.write_merged().await;
        }

        let report = self.report();
        tracing::info!(
            "Traversal finished: {} pages processed, {} failed",
            report.progress.processed,
            report.progress.failed
        );
        Ok(report)
    }

    /// Snapshot of the run so far
    pub fn report(&self) -> RunReport {
        RunReport {
            progress: self.progress.snapshot(),
            failures: self.progress.failures(),
            visited: self.filter.visited_count(),
            peak_render_sessions: self.render_gate.peak(),
            peak_expansions: self.expansion_gate.peak(),
            merged_document: self
                .merged_document
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            interrupted: self.shutdown.is_triggered(),
        }
    }

    /// Runs one traversal task to a terminal state
    fn visit(self: Arc<Self>, task: TraversalTask) -> TaskFuture {
        Box::pin(async move {
            let TraversalTask {
                url,
                depth,
                expansion,
            } = task;

            if self.shutdown.is_triggered() {
                tracing::debug!("Not starting {}: shutting down", url);
                return Ok(TaskState::ShutdownAborted);
            }

            let processed = {
                let _session_slot = match self.render_gate.acquire().await {
                    Ok(permit) => permit,
                    Err(_) if self.shutdown.is_triggered() => {
                        return Ok(TaskState::ShutdownAborted)
                    }
                    Err(e) => return Err(e),
                };
                self.process(&url, depth).await
            };
            drop(expansion);

            let links = match processed? {
                Processed::Skipped(reason) => {
                    tracing::trace!("Skipping {} at depth {}: {}", url, depth, reason);
                    return Ok(TaskState::Skipped(reason));
                }
                Processed::Aborted => return Ok(TaskState::ShutdownAborted),
                Processed::Links(links) => links,
            };

            self.fan_out(links, depth).await?;
            Ok(TaskState::Completed)
        })
    }

    /// Admission, render, export and link extraction for one page
    async fn process(&self, url: &Url, depth: u32) -> Result<Processed, PagefoldError> {
        if let Some(reason) = self.filter.check(url, depth) {
            return Ok(Processed::Skipped(reason));
        }

        match self.filter.admit(url, &self.shutdown) {
            Admission::Admitted => {}
            Admission::AlreadyVisited => return Ok(Processed::Skipped(SkipReason::Visited)),
            Admission::ShuttingDown => return Ok(Processed::Aborted),
        }

        // Admitted, but shutdown arrived before rendering began: no outcome.
        if self.shutdown.is_triggered() {
            tracing::debug!("Not rendering {}: shutting down", url);
            return Ok(Processed::Aborted);
        }

        tracing::debug!("Processing {} (depth {})", url, depth);

        let mut session = match self.renderer.open_session().await {
            Ok(session) => session,
            Err(e) => return Err(self.escalate(url, e)),
        };

        let result = self.render_page(session.as_mut(), url, depth).await;
        session.close().await;
        result
    }

    async fn render_page(
        &self,
        session: &mut dyn RenderSession,
        url: &Url,
        depth: u32,
    ) -> Result<Processed, PagefoldError> {
        let navigation = match fetch_and_render(
            self.renderer.as_ref(),
            &mut *session,
            url,
            &self.retry,
            &self.shutdown,
        )
        .await
        {
            Ok(navigation) => navigation,
            Err(e) if e.is_setup() => return Err(self.escalate(url, e)),
            Err(e) => {
                let reason = if is_notebook_url(url) {
                    ErrorReason::Notebook
                } else {
                    ErrorReason::TransientFetch
                };
                self.progress.record(url.as_str(), Outcome::error(reason, &e));
                return Ok(Processed::Links(Vec::new()));
            }
        };

        let is_origin = depth == 0 && self.filter.identity(url) == self.origin;
        if self.config.links_only && is_origin {
            self.progress
                .record(url.as_str(), Outcome::Success { path: None });
        } else {
            match self.export(&mut *session, url).await {
                Ok(path) => self
                    .progress
                    .record(url.as_str(), Outcome::Success { path: Some(path) }),
                Err(e) => self
                    .progress
                    .record(url.as_str(), Outcome::error(ErrorReason::Export, &e)),
            }
        }

        if depth >= self.config.max_depth {
            return Ok(Processed::Links(Vec::new()));
        }

        // Relative links resolve against where the page actually ended up.
        let page_url = navigation.final_url;
        let links = session
            .extract_links()
            .iter()
            .filter_map(|href| join(&page_url, href))
            .collect();

        Ok(Processed::Links(links))
    }

    async fn export(&self, session: &mut dyn RenderSession, url: &Url) -> Result<PathBuf, RenderError> {
        let title = session.extract_title();
        let file_name = document_file_name(
            title.as_deref(),
            url,
            self.renderer.document_extension(),
        );
        let path = self.config.output_dir.join(file_name);

        session
            .export_document(&path, self.config.page_size)
            .await?;

        if self.config.merge {
            if let Some(page) = session.content() {
                self.merge_parts
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(MergePart {
                        title: title.unwrap_or_else(|| url.to_string()),
                        url: url.to_string(),
                        body_html: page.body_html(),
                    });
            }
        }

        Ok(path)
    }

    /// Spawns children for a page's links and waits for all of them
    async fn fan_out(self: &Arc<Self>, links: Vec<Url>, depth: u32) -> Result<(), PagefoldError> {
        let (pagination, regular): (Vec<Url>, Vec<Url>) = if self.config.pagination {
            links.into_iter().partition(|link| {
                is_pagination_link(link, &self.config.base_url, &self.config.allowed_prefixes)
            })
        } else {
            (Vec::new(), links)
        };

        let mut children = JoinSet::new();
        let mut seen = HashSet::new();

        // Pagination variants stay at the current depth and skip the
        // expansion gate.
        for link in pagination {
            if !seen.insert(self.filter.identity(&link)) || self.filter.should_skip(&link, depth) {
                continue;
            }
            tracing::trace!("Following pagination link {}", link);
            children.spawn(Arc::clone(self).visit(TraversalTask {
                url: link,
                depth,
                expansion: None,
            }));
        }

        let child_depth = depth + 1;
        let mut spawn_error = None;

        for link in regular {
            if self.shutdown.is_triggered() {
                break;
            }
            if !seen.insert(self.filter.identity(&link))
                || self.filter.should_skip(&link, child_depth)
            {
                continue;
            }

            let expansion = match self.expansion_gate.acquire().await {
                Ok(permit) => permit,
                Err(_) if self.shutdown.is_triggered() => break,
                Err(e) => {
                    spawn_error = Some(e);
                    break;
                }
            };
            children.spawn(Arc::clone(self).visit(TraversalTask {
                url: link,
                depth: child_depth,
                expansion: Some(expansion),
            }));
        }

        let mut first_error = spawn_error;
        while let Some(joined) = children.join_next().await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => tracing::error!("Traversal task panicked: {}", e),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Turns a renderer failure into a run-halting error
    ///
    /// Both gates are closed so tasks still waiting for a slot give up
    /// instead of queueing behind a dead renderer.
    fn escalate(&self, url: &Url, error: RenderError) -> PagefoldError {
        tracing::error!("Renderer unavailable while processing {}: {}", url, error);
        self.shutdown.trigger();
        self.render_gate.close();
        self.expansion_gate.close();
        PagefoldError::RenderSetup(error.to_string())
    }

    async fn write_merged(&self) {
        let mut parts = std::mem::take(
            &mut *self
                .merge_parts
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if parts.is_empty() {
            tracing::info!("No exported pages to merge");
            return;
        }
        parts.sort_by(|a, b| a.url.cmp(&b.url));

        let path = self.config.output_dir.join(format!(
            "{}.{}",
            MERGED_STEM,
            self.renderer.document_extension()
        ));

        match self
            .renderer
            .merge_documents(&parts, &path, self.config.page_size)
            .await
        {
            Ok(()) => {
                tracing::info!("Merged {} pages into {}", parts.len(), path.display());
                *self
                    .merged_document
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(path);
            }
            Err(e) => tracing::error!("Failed to write merged document: {}", e),
        }
    }
}
