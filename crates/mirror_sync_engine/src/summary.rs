//! Run summaries.

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Final state of one resource within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Every page fetched, every batch committed, watermark written.
    Success,
    /// The resource failed; see the outcome's error.
    Failed,
    /// The run was cancelled while this resource was in progress.
    Cancelled,
    /// Never attempted (run aborted or cancelled earlier).
    Skipped,
}

impl ResourceStatus {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Success => "success",
            ResourceStatus::Failed => "failed",
            ResourceStatus::Cancelled => "cancelled",
            ResourceStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to a failed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// Stable error kind, see [`SyncError::kind`].
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&SyncError> for ErrorInfo {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceOutcome {
    /// Resource name.
    pub resource: String,
    /// Final state.
    pub status: ResourceStatus,
    /// Records handed to the committer.
    pub records: usize,
    /// Documents dropped for lack of an identifier.
    pub skipped: usize,
    /// Batches committed.
    pub batches: usize,
    /// Lower bound used for the incremental filter.
    pub since: Option<DateTime<Utc>>,
    /// Watermark written by this run.
    pub watermark: Option<DateTime<Utc>>,
    /// Failure, if any.
    pub error: Option<ErrorInfo>,
    /// Wall time spent on the resource, in milliseconds.
    pub elapsed_ms: u64,
}

impl ResourceOutcome {
    /// An outcome for a resource that was never attempted.
    pub fn skipped(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            status: ResourceStatus::Skipped,
            records: 0,
            skipped: 0,
            batches: 0,
            since: None,
            watermark: None,
            error: None,
            elapsed_ms: 0,
        }
    }

    /// Returns true if the resource failed.
    pub fn is_failure(&self) -> bool {
        self.status == ResourceStatus::Failed
    }
}

/// Summary of one sync invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Unique run id.
    pub run_id: Uuid,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time; `None` while running.
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether a run-fatal error ended the run early.
    pub aborted: bool,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Per-resource outcomes in processing order.
    pub resources: Vec<ResourceOutcome>,
}

impl RunSummary {
    /// Starts an empty summary.
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: None,
            aborted: false,
            cancelled: false,
            resources: Vec::new(),
        }
    }

    /// Marks the run as finished.
    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    /// Outcome of a resource.
    pub fn outcome(&self, resource: &str) -> Option<&ResourceOutcome> {
        self.resources.iter().find(|o| o.resource == resource)
    }

    /// Returns true if nothing failed and the run was neither aborted nor
    /// cancelled.
    pub fn is_success(&self) -> bool {
        !self.aborted
            && !self.cancelled
            && self
                .resources
                .iter()
                .all(|o| o.status == ResourceStatus::Success)
    }

    /// Number of failed resources.
    pub fn failed_count(&self) -> usize {
        self.resources.iter().filter(|o| o.is_failure()).count()
    }

    /// Total records processed across resources.
    pub fn total_records(&self) -> usize {
        self.resources.iter().map(|o| o.records).sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {}", self.run_id)?;
        for outcome in &self.resources {
            write!(
                f,
                "  {:<24} {:<9} records={:<7} batches={:<4} skipped={}",
                outcome.resource, outcome.status, outcome.records, outcome.batches, outcome.skipped
            )?;
            if let Some(error) = &outcome.error {
                write!(f, "  [{}] {}", error.kind, error.message)?;
            }
            writeln!(f)?;
        }
        let verdict = if self.is_success() {
            "ok"
        } else if self.aborted {
            "aborted"
        } else if self.cancelled {
            "cancelled"
        } else {
            "failed"
        };
        write!(
            f,
            "Result: {verdict} ({} records, {} failed)",
            self.total_records(),
            self.failed_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, status: ResourceStatus) -> ResourceOutcome {
        ResourceOutcome {
            status,
            records: 3,
            ..ResourceOutcome::skipped(name)
        }
    }

    #[test]
    fn success_requires_every_resource() {
        let mut summary = RunSummary::start(Utc::now());
        summary.resources.push(outcome("a", ResourceStatus::Success));
        assert!(summary.is_success());

        summary.resources.push(outcome("b", ResourceStatus::Failed));
        assert!(!summary.is_success());
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.total_records(), 6);
    }

    #[test]
    fn serializes_statuses_in_snake_case() {
        let mut summary = RunSummary::start(Utc::now());
        summary.resources.push(outcome("a", ResourceStatus::Cancelled));
        summary.finish(Utc::now());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["resources"][0]["status"], "cancelled");
        assert!(json["finished_at"].is_string());
    }

    #[test]
    fn display_lists_resources() {
        let mut summary = RunSummary::start(Utc::now());
        summary.resources.push(outcome("products", ResourceStatus::Success));
        let text = summary.to_string();
        assert!(text.contains("products"));
        assert!(text.ends_with("Result: ok (3 records, 0 failed)"));
    }
}
