//! In-memory store for testing.

use crate::error::{StoreError, StoreResult};
use crate::store::{
    clamp_search_limit, LocalStore, ResourceOverview, StoredRecord, SyncStateEntry,
    STATUS_SUCCESS,
};
use chrono::{DateTime, Utc};
use mirror_catalog::{format_timestamp, Record, Registry, ResourceDefinition};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// One committed batch, as seen by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommitLogEntry {
    /// Target table.
    pub table: String,
    /// Primary keys of the batch, in commit order.
    pub keys: Vec<String>,
}

#[derive(Debug, Clone)]
struct Row {
    record: StoredRecord,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, BTreeMap<String, Row>>,
    watermarks: BTreeMap<String, DateTime<Utc>>,
    commits: Vec<CommitLogEntry>,
    seq: u64,
}

/// A store that keeps everything in memory.
///
/// Besides implementing [`LocalStore`] it keeps a log of every committed
/// batch, so tests can assert batch boundaries.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.inner.read().tables.get(table).map_or(0, BTreeMap::len)
    }

    /// Every committed batch, oldest first.
    #[must_use]
    pub fn commits(&self) -> Vec<CommitLogEntry> {
        self.inner.read().commits.clone()
    }

    /// Stored payload of `id` in `table`.
    #[must_use]
    pub fn payload(&self, table: &str, id: &str) -> Option<serde_json::Value> {
        let inner = self.inner.read();
        inner
            .tables
            .get(table)
            .and_then(|rows| rows.get(id))
            .map(|row| row.record.data.clone())
    }
}

impl LocalStore for MemoryStore {
    fn upsert_batch(
        &self,
        table: &str,
        _primary_key_field: &str,
        records: &[Record],
    ) -> StoreResult<usize> {
        if table.is_empty() || table == "sync_state" {
            return Err(StoreError::InvalidTable(table.to_string()));
        }

        let mut inner = self.inner.write();
        let mut seq = inner.seq;
        let rows = inner.tables.entry(table.to_string()).or_default();
        for record in records {
            seq += 1;
            rows.insert(
                record.primary_key.clone(),
                Row {
                    record: StoredRecord {
                        id: record.primary_key.clone(),
                        data: record.raw_payload.clone(),
                        updated_at: record.updated_at_column(),
                        fetched_at: format_timestamp(&record.fetched_at),
                    },
                    seq,
                },
            );
        }
        inner.seq = seq;
        inner.commits.push(CommitLogEntry {
            table: table.to_string(),
            keys: records.iter().map(|r| r.primary_key.clone()).collect(),
        });
        Ok(records.len())
    }

    fn read_watermark(&self, resource: &str) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.inner.read().watermarks.get(resource).copied())
    }

    fn write_watermark(&self, resource: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.write().watermarks.insert(resource.to_string(), at);
        Ok(())
    }

    fn sync_states(&self) -> StoreResult<Vec<SyncStateEntry>> {
        Ok(self
            .inner
            .read()
            .watermarks
            .iter()
            .map(|(name, at)| SyncStateEntry {
                resource_name: name.clone(),
                last_sync_at: Some(*at),
                last_run_status: Some(STATUS_SUCCESS.to_string()),
            })
            .collect())
    }

    fn overview(&self, registry: &Registry) -> StoreResult<Vec<ResourceOverview>> {
        let inner = self.inner.read();
        Ok(registry
            .iter()
            .map(|def| {
                let rows = inner.tables.get(def.table);
                let max_of = |pick: fn(&StoredRecord) -> &String| {
                    rows.and_then(|r| r.values().map(|row| pick(&row.record)).max().cloned())
                };
                ResourceOverview {
                    resource: def.name.to_string(),
                    label: def.label.to_string(),
                    count: rows.map_or(0, |r| r.len() as u64),
                    last_updated: max_of(|r| &r.updated_at),
                    last_fetched: max_of(|r| &r.fetched_at),
                    last_synced: inner.watermarks.get(def.name).copied(),
                }
            })
            .collect())
    }

    fn search(
        &self,
        definition: &ResourceDefinition,
        query: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<StoredRecord>> {
        let limit = clamp_search_limit(limit);
        let query = query.map(str::trim).filter(|q| !q.is_empty());

        let inner = self.inner.read();
        let Some(rows) = inner.tables.get(definition.table) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<&Row> = rows
            .values()
            .filter(|row| match query {
                None => true,
                Some(q) => row.record.id == q || row.record.data.to_string().contains(q),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.record
                .fetched_at
                .cmp(&a.record.fetched_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(hits
            .into_iter()
            .take(limit)
            .map(|row| row.record.clone())
            .collect())
    }

    fn scan(&self, definition: &ResourceDefinition, limit: usize) -> StoreResult<Vec<StoredRecord>> {
        let inner = self.inner.read();
        let Some(rows) = inner.tables.get(definition.table) else {
            return Ok(Vec::new());
        };

        let mut all: Vec<&Row> = rows.values().collect();
        all.sort_by(|a, b| {
            b.record
                .fetched_at
                .cmp(&a.record.fetched_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(all
            .into_iter()
            .take(limit)
            .map(|row| row.record.clone())
            .collect())
    }

    fn get_record(
        &self,
        definition: &ResourceDefinition,
        id: &str,
    ) -> StoreResult<Option<StoredRecord>> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }
        let inner = self.inner.read();
        Ok(inner
            .tables
            .get(definition.table)
            .and_then(|rows| rows.get(id))
            .map(|row| row.record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(id: &str) -> Record {
        let def = ResourceDefinition::new("products", "producto/");
        Record::from_document(&def, json!({"id": id, "nombre": format!("item {id}")}), Utc::now())
            .unwrap()
    }

    #[test]
    fn commit_log_tracks_batches() {
        let store = MemoryStore::new();
        store
            .upsert_batch("products", "id", &[record("1"), record("2")])
            .unwrap();
        store.upsert_batch("products", "id", &[record("1")]).unwrap();

        assert_eq!(store.row_count("products"), 2);
        let commits = store.commits();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].keys, vec!["1", "2"]);
        assert_eq!(commits[1].keys, vec!["1"]);
    }

    #[test]
    fn watermarks_last_write_wins() {
        let store = MemoryStore::new();
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        assert_eq!(store.read_watermark("products").unwrap(), None);
        store.write_watermark("products", a).unwrap();
        store.write_watermark("products", b).unwrap();
        assert_eq!(store.read_watermark("products").unwrap(), Some(b));
        assert_eq!(store.sync_states().unwrap().len(), 1);
    }

    #[test]
    fn search_matches_id_or_payload() {
        let store = MemoryStore::new();
        let def = ResourceDefinition::new("products", "producto/");
        store
            .upsert_batch("products", "id", &[record("10"), record("20")])
            .unwrap();

        assert_eq!(store.search(&def, Some("20"), 10).unwrap()[0].id, "20");
        assert_eq!(store.search(&def, Some("item"), 10).unwrap().len(), 2);
        assert_eq!(store.search(&def, None, 1).unwrap().len(), 1);
        assert!(store.get_record(&def, "10").unwrap().is_some());
    }

    #[test]
    fn scan_returns_everything_up_to_limit() {
        let store = MemoryStore::new();
        let def = ResourceDefinition::new("products", "producto/");
        let records: Vec<Record> = (0..120).map(|i| record(&i.to_string())).collect();
        store.upsert_batch("products", "id", &records).unwrap();

        assert_eq!(store.scan(&def, 500).unwrap().len(), 120);
        assert_eq!(store.scan(&def, 5).unwrap().len(), 5);
        let other = ResourceDefinition::new("brands", "marca/");
        assert!(store.scan(&other, 5).unwrap().is_empty());
    }
}
