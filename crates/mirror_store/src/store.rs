//! Store trait definition and read-side views.

use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use mirror_catalog::{Record, Registry, ResourceDefinition};
use serde::Serialize;
use serde_json::Value;

/// Status recorded next to a watermark written after a successful run.
pub const STATUS_SUCCESS: &str = "success";

/// Upper bound on rows returned by [`LocalStore::search`].
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Clamps a requested search limit to `1..=MAX_SEARCH_LIMIT`.
pub fn clamp_search_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_SEARCH_LIMIT)
}

/// The local persistence collaborator.
///
/// # Invariants
///
/// - `upsert_batch` is atomic: either every record of the batch is written
///   or none is
/// - Upserts overwrite payload, `updated_at` and `fetched_at` of existing rows
/// - `write_watermark` is idempotent and last-write-wins
/// - `read_watermark` returns `None` until a watermark has been written
pub trait LocalStore: Send + Sync {
    /// Upserts a batch into `table` in one transaction.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is invalid or the transaction fails;
    /// in that case nothing from this batch is persisted.
    fn upsert_batch(
        &self,
        table: &str,
        primary_key_field: &str,
        records: &[Record],
    ) -> StoreResult<usize>;

    /// Reads the last successful watermark of a resource.
    fn read_watermark(&self, resource: &str) -> StoreResult<Option<DateTime<Utc>>>;

    /// Writes the watermark of a resource and marks its last run successful.
    fn write_watermark(&self, resource: &str, at: DateTime<Utc>) -> StoreResult<()>;

    /// Lists every watermark row.
    fn sync_states(&self) -> StoreResult<Vec<SyncStateEntry>>;

    /// Aggregated information per registered resource, in registry order.
    fn overview(&self, registry: &Registry) -> StoreResult<Vec<ResourceOverview>>;

    /// Records of a resource whose id equals `query` or whose payload
    /// contains it, newest capture first.
    ///
    /// Without a query the most recently captured records are returned.
    fn search(
        &self,
        definition: &ResourceDefinition,
        query: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<StoredRecord>>;

    /// Up to `limit` records of a resource, newest capture first.
    ///
    /// Unlike [`search`](LocalStore::search) the limit is not clamped; this
    /// is the bulk read used by reports.
    fn scan(&self, definition: &ResourceDefinition, limit: usize) -> StoreResult<Vec<StoredRecord>>;

    /// A single record by id. Blank ids yield `None`.
    fn get_record(
        &self,
        definition: &ResourceDefinition,
        id: &str,
    ) -> StoreResult<Option<StoredRecord>>;
}

/// A persisted watermark row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStateEntry {
    /// Resource name.
    pub resource_name: String,
    /// Watermark used as the next run's `since`.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Status of the run that wrote the watermark.
    pub last_run_status: Option<String>,
}

/// A stored record as read back from the local store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    /// Primary key.
    pub id: String,
    /// Payload as stored.
    pub data: Value,
    /// Source update time (or capture time when the source had none).
    pub updated_at: String,
    /// Capture time.
    pub fetched_at: String,
}

/// Aggregated view of one resource's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceOverview {
    /// Resource name.
    pub resource: String,
    /// Human label.
    pub label: String,
    /// Number of stored rows.
    pub count: u64,
    /// Latest source update time.
    pub last_updated: Option<String>,
    /// Latest capture time.
    pub last_fetched: Option<String>,
    /// Watermark of the last successful run.
    pub last_synced: Option<DateTime<Utc>>,
}
