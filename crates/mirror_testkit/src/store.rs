//! Fault-injecting store wrapper.

use chrono::{DateTime, Utc};
use mirror_catalog::{Record, Registry, ResourceDefinition};
use mirror_store::{
    LocalStore, ResourceOverview, StoreError, StoreResult, StoredRecord, SyncStateEntry,
};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Wraps a store and fails chosen operations.
///
/// Failures are keyed by table (upserts) or resource (watermark writes).
/// Everything else is delegated untouched.
#[derive(Debug)]
pub struct FaultyStore<S> {
    inner: S,
    /// table -> number of successful upserts allowed before failing
    upsert_budget: Mutex<HashMap<String, usize>>,
    failing_watermarks: Mutex<Vec<String>>,
}

impl<S: LocalStore> FaultyStore<S> {
    /// Wraps `inner` without any fault.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            upsert_budget: Mutex::new(HashMap::new()),
            failing_watermarks: Mutex::new(Vec::new()),
        }
    }

    /// Fails every upsert into `table`.
    pub fn fail_upserts(&self, table: &str) {
        self.fail_upserts_after(table, 0);
    }

    /// Lets `successes` upserts into `table` through, then fails the rest.
    pub fn fail_upserts_after(&self, table: &str, successes: usize) {
        self.upsert_budget.lock().insert(table.to_string(), successes);
    }

    /// Fails watermark writes for `resource`.
    pub fn fail_watermark(&self, resource: &str) {
        self.failing_watermarks.lock().push(resource.to_string());
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: LocalStore> LocalStore for FaultyStore<S> {
    fn upsert_batch(
        &self,
        table: &str,
        primary_key_field: &str,
        records: &[Record],
    ) -> StoreResult<usize> {
        if let Some(budget) = self.upsert_budget.lock().get_mut(table) {
            if *budget == 0 {
                return Err(StoreError::Unavailable(format!("injected upsert failure on {table}")));
            }
            *budget -= 1;
        }
        self.inner.upsert_batch(table, primary_key_field, records)
    }

    fn read_watermark(&self, resource: &str) -> StoreResult<Option<DateTime<Utc>>> {
        self.inner.read_watermark(resource)
    }

    fn write_watermark(&self, resource: &str, at: DateTime<Utc>) -> StoreResult<()> {
        if self.failing_watermarks.lock().iter().any(|r| r == resource) {
            return Err(StoreError::Unavailable(format!(
                "injected watermark failure on {resource}"
            )));
        }
        self.inner.write_watermark(resource, at)
    }

    fn sync_states(&self) -> StoreResult<Vec<SyncStateEntry>> {
        self.inner.sync_states()
    }

    fn overview(&self, registry: &Registry) -> StoreResult<Vec<ResourceOverview>> {
        self.inner.overview(registry)
    }

    fn search(
        &self,
        definition: &ResourceDefinition,
        query: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<StoredRecord>> {
        self.inner.search(definition, query, limit)
    }

    fn scan(&self, definition: &ResourceDefinition, limit: usize) -> StoreResult<Vec<StoredRecord>> {
        self.inner.scan(definition, limit)
    }

    fn get_record(
        &self,
        definition: &ResourceDefinition,
        id: &str,
    ) -> StoreResult<Option<StoredRecord>> {
        self.inner.get_record(definition, id)
    }
}
