//! Sync orchestrator.

use crate::committer::BatchCommitter;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::fetcher::{Fetcher, PageIter};
use crate::runner::CancellationToken;
use crate::state::SyncStateStore;
use crate::summary::{ErrorInfo, ResourceOutcome, ResourceStatus, RunSummary};
use crate::transport::RemoteSource;
use chrono::{DateTime, SubsecRound, Utc};
use mirror_catalog::{Registry, ResourceDefinition};
use mirror_store::LocalStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Everything a run needs: the registry and both collaborators.
#[derive(Clone)]
pub struct SyncContext {
    /// Resource registry, shared read-only.
    pub registry: Arc<Registry>,
    /// Remote collaborator.
    pub remote: Arc<dyn RemoteSource>,
    /// Local collaborator.
    pub store: Arc<dyn LocalStore>,
    /// Defaults for page size, batch size and retries.
    pub config: SyncConfig,
}

impl SyncContext {
    /// Creates a context.
    pub fn new(
        registry: Arc<Registry>,
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn LocalStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            registry,
            remote,
            store,
            config,
        }
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("resources", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Options of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOptions {
    /// Resources to sync; empty means all, in registry order.
    pub resources: Vec<String>,
    /// Overrides the stored watermark of every selected resource.
    pub since: Option<DateTime<Utc>>,
    /// Ignore watermarks (wins over `since`).
    pub full_refresh: bool,
    /// Overrides the configured page size.
    pub page_size: Option<u32>,
    /// Overrides the configured batch size.
    pub batch_size: Option<usize>,
}

impl SyncOptions {
    /// Options selecting every resource.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the run to the given resources.
    pub fn with_resources<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.resources = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the since override.
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Sets full refresh.
    pub fn with_full_refresh(mut self, full_refresh: bool) -> Self {
        self.full_refresh = full_refresh;
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    fn effective_config(&self, base: &SyncConfig) -> SyncConfig {
        let mut config = base.clone();
        if let Some(size) = self.page_size {
            config.page_size = size;
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        config
    }
}

/// Drives a run across the selected resources.
///
/// # Invariants
///
/// - Resources are processed sequentially in registry order
/// - A watermark is written only after the resource's last batch committed,
///   and its value is the time the resource started
/// - `Fetch` and `Persistence` failures are isolated to their resource
/// - `Authentication` aborts the run; remaining resources are skipped
/// - Cancellation flushes the buffer, withholds the watermark and skips the
///   remaining resources
pub struct SyncOrchestrator<'a> {
    ctx: &'a SyncContext,
}

impl<'a> SyncOrchestrator<'a> {
    /// Creates an orchestrator over `ctx`.
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self { ctx }
    }

    /// Runs the selected resources (empty = all).
    ///
    /// # Errors
    ///
    /// Returns `UnknownResource` before any fetch if a name is not
    /// registered, and `Config` for invalid settings. Per-resource failures
    /// are reported in the summary instead.
    pub fn run<S: AsRef<str>>(&self, selected: &[S], full_refresh: bool) -> SyncResult<RunSummary> {
        let options = SyncOptions::all()
            .with_resources(selected.iter().map(|s| s.as_ref().to_string()))
            .with_full_refresh(full_refresh);
        self.run_with(&options, &CancellationToken::new())
    }

    /// Runs with explicit options and a cancellation token.
    pub fn run_with(
        &self,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> SyncResult<RunSummary> {
        let config = options.effective_config(&self.ctx.config);
        config.validate()?;
        let selected = self.ctx.registry.list_resources(&options.resources)?;

        let mut summary = RunSummary::start(now());
        info!(
            run_id = %summary.run_id,
            resources = selected.len(),
            full_refresh = options.full_refresh,
            "sync run started"
        );

        for definition in selected {
            if summary.aborted || summary.cancelled {
                summary.resources.push(ResourceOutcome::skipped(definition.name));
                continue;
            }
            if cancel.is_cancelled() {
                summary.cancelled = true;
                summary.resources.push(ResourceOutcome::skipped(definition.name));
                continue;
            }

            let (outcome, failure) = self.sync_resource(definition, options, &config, cancel);
            match (&outcome.status, failure) {
                (ResourceStatus::Cancelled, _) => summary.cancelled = true,
                (_, Some(err)) if err.is_run_fatal() => {
                    warn!(resource = %definition.name, "aborting run: {err}");
                    summary.aborted = true;
                }
                _ => {}
            }
            summary.resources.push(outcome);
        }

        summary.finish(now());
        info!(
            run_id = %summary.run_id,
            records = summary.total_records(),
            failed = summary.failed_count(),
            aborted = summary.aborted,
            cancelled = summary.cancelled,
            "sync run finished"
        );
        Ok(summary)
    }

    fn sync_resource(
        &self,
        definition: &ResourceDefinition,
        options: &SyncOptions,
        config: &SyncConfig,
        cancel: &CancellationToken,
    ) -> (ResourceOutcome, Option<SyncError>) {
        let started = Instant::now();
        let mut outcome = ResourceOutcome::skipped(definition.name);
        info!(resource = %definition.name, "syncing resource");

        let result = self.drive(definition, options, config, cancel, &mut outcome);
        outcome.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => {
                outcome.status = ResourceStatus::Success;
                info!(
                    resource = %definition.name,
                    records = outcome.records,
                    batches = outcome.batches,
                    skipped = outcome.skipped,
                    elapsed_ms = outcome.elapsed_ms,
                    "resource synced"
                );
                (outcome, None)
            }
            Err(SyncError::Cancelled) => {
                outcome.status = ResourceStatus::Cancelled;
                warn!(resource = %definition.name, records = outcome.records, "resource cancelled");
                (outcome, None)
            }
            Err(err) => {
                outcome.status = ResourceStatus::Failed;
                outcome.error = Some(ErrorInfo::from(&err));
                error!(resource = %definition.name, kind = err.kind(), "resource failed: {err}");
                (outcome, Some(err))
            }
        }
    }

    fn drive(
        &self,
        definition: &ResourceDefinition,
        options: &SyncOptions,
        config: &SyncConfig,
        cancel: &CancellationToken,
        outcome: &mut ResourceOutcome,
    ) -> SyncResult<()> {
        let state = SyncStateStore::new(self.ctx.store.as_ref());
        let since = if options.full_refresh {
            None
        } else {
            match options.since {
                Some(since) => Some(since),
                None => state.read(definition.name)?,
            }
        };
        outcome.since = since.filter(|_| definition.supports_incremental());

        let run_start = now();
        let fetcher = Fetcher::new(self.ctx.remote.as_ref(), config.retry.clone());
        let mut committer =
            BatchCommitter::new(self.ctx.store.as_ref(), definition, config.batch_size)?;
        let mut pages = fetcher.pages(definition, since, config.page_size)?;

        let fetched = consume(&mut pages, &mut committer, cancel, outcome);
        let result = match fetched {
            Ok(()) => committer.flush().map(|_| ()),
            Err(err @ SyncError::Persistence(_)) => Err(err),
            Err(err) => {
                // Records already fetched are still valid
                if let Err(flush_err) = committer.flush() {
                    warn!(resource = %definition.name, "flush after failure failed: {flush_err}");
                }
                Err(err)
            }
        };
        outcome.batches = committer.batches();
        result?;

        state.write(definition.name, run_start)?;
        outcome.watermark = Some(run_start);
        Ok(())
    }
}

/// Current time at the precision watermarks are stored with.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn consume(
    pages: &mut PageIter<'_>,
    committer: &mut BatchCommitter<'_>,
    cancel: &CancellationToken,
    outcome: &mut ResourceOutcome,
) -> SyncResult<()> {
    loop {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let Some(page) = pages.next() else {
            return Ok(());
        };
        let page = page?;
        outcome.skipped += page.skipped;
        for record in page.records {
            committer.accumulate(record)?;
            outcome.records += 1;
        }
    }
}
