//! Watermark access.

use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use mirror_store::LocalStore;

/// Reads and writes per-resource watermarks.
///
/// A watermark is the `since` of the next incremental run. It is written
/// only after every batch of a resource committed; there is no retry, a
/// failed write surfaces as `Persistence`.
pub struct SyncStateStore<'a> {
    store: &'a dyn LocalStore,
}

impl<'a> SyncStateStore<'a> {
    /// Wraps a local store.
    pub fn new(store: &'a dyn LocalStore) -> Self {
        Self { store }
    }

    /// Last successful watermark, `None` if the resource never completed.
    pub fn read(&self, resource: &str) -> SyncResult<Option<DateTime<Utc>>> {
        Ok(self.store.read_watermark(resource)?)
    }

    /// Records a successful completion at `at`. Last write wins.
    pub fn write(&self, resource: &str, at: DateTime<Utc>) -> SyncResult<()> {
        Ok(self.store.write_watermark(resource, at)?)
    }
}
