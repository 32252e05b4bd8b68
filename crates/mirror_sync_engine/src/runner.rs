//! Single-flight run management and cancellation.

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::{SyncContext, SyncOptions, SyncOrchestrator};
use crate::summary::{ErrorInfo, RunSummary};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Runs one sync to completion on the calling thread.
///
/// No single-flight guard is taken; use [`SyncRunner`] when runs can be
/// triggered concurrently.
pub fn synchronise(ctx: &SyncContext, options: SyncOptions) -> SyncResult<RunSummary> {
    SyncOrchestrator::new(ctx).run_with(&options, &CancellationToken::new())
}

/// A cloneable cancellation flag checked at the top of every page loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct ActiveRun {
    token: CancellationToken,
    started_at: DateTime<Utc>,
    options: SyncOptions,
}

#[derive(Debug, Default)]
struct RunnerState {
    active: Mutex<Option<ActiveRun>>,
    last_summary: RwLock<Option<RunSummary>>,
    last_error: RwLock<Option<ErrorInfo>>,
}

/// Snapshot of the runner, as served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RunnerStatus {
    /// Whether a run is active.
    pub running: bool,
    /// Start time of the active run.
    pub started_at: Option<DateTime<Utc>>,
    /// Options of the active run.
    pub options: Option<SyncOptions>,
    /// Summary of the last completed run.
    pub last_summary: Option<RunSummary>,
    /// Error of the last run that failed before producing a summary.
    pub last_error: Option<ErrorInfo>,
}

/// Allows at most one active run per process.
///
/// Cloning shares the same slot.
///
/// # Example
///
/// ```rust
/// use mirror_sync_engine::{SyncError, SyncOptions, SyncRunner};
///
/// let runner = SyncRunner::new();
/// let guard = runner.begin(SyncOptions::all()).unwrap();
/// assert!(matches!(runner.begin(SyncOptions::all()), Err(SyncError::AlreadyRunning)));
/// drop(guard);
/// assert!(!runner.is_running());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncRunner {
    state: Arc<RunnerState>,
}

impl SyncRunner {
    /// Creates an idle runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the run slot.
    ///
    /// The returned guard releases the slot when dropped, so it can be moved
    /// into a worker thread.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if another run holds the slot.
    pub fn begin(&self, options: SyncOptions) -> SyncResult<RunGuard> {
        let mut slot = self.state.active.lock();
        if slot.is_some() {
            return Err(SyncError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        *slot = Some(ActiveRun {
            token: token.clone(),
            started_at: Utc::now(),
            options: options.clone(),
        });

        Ok(RunGuard {
            state: Arc::clone(&self.state),
            token,
            options,
        })
    }

    /// Claims the slot and runs on the calling thread.
    pub fn run(&self, ctx: &SyncContext, options: SyncOptions) -> SyncResult<RunSummary> {
        self.begin(options)?.run(ctx)
    }

    /// Requests cancellation of the active run.
    ///
    /// Returns false if no run is active.
    pub fn cancel(&self) -> bool {
        match self.state.active.lock().as_ref() {
            Some(active) => {
                info!("cancellation requested");
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns true while a run holds the slot.
    pub fn is_running(&self) -> bool {
        self.state.active.lock().is_some()
    }

    /// Summary of the last completed run.
    pub fn last_summary(&self) -> Option<RunSummary> {
        self.state.last_summary.read().clone()
    }

    /// Current status.
    pub fn status(&self) -> RunnerStatus {
        let active = self.state.active.lock();
        RunnerStatus {
            running: active.is_some(),
            started_at: active.as_ref().map(|a| a.started_at),
            options: active.as_ref().map(|a| a.options.clone()),
            last_summary: self.state.last_summary.read().clone(),
            last_error: self.state.last_error.read().clone(),
        }
    }
}

/// Exclusive right to run, obtained from [`SyncRunner::begin`].
#[derive(Debug)]
pub struct RunGuard {
    state: Arc<RunnerState>,
    token: CancellationToken,
    options: SyncOptions,
}

impl RunGuard {
    /// Token cancelling this run.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Options of this run.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Executes the run, records its outcome and releases the slot.
    pub fn run(self, ctx: &SyncContext) -> SyncResult<RunSummary> {
        let result = SyncOrchestrator::new(ctx).run_with(&self.options, &self.token);
        match &result {
            Ok(summary) => {
                *self.state.last_summary.write() = Some(summary.clone());
                *self.state.last_error.write() = None;
            }
            Err(err) => *self.state.last_error.write() = Some(ErrorInfo::from(err)),
        }
        result
    }

    /// Records a failure that prevented the run from starting and releases
    /// the slot.
    pub fn fail(self, err: SyncError) -> SyncError {
        *self.state.last_error.write() = Some(ErrorInfo::from(&err));
        err
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *self.state.active.lock() = None;
    }
}
