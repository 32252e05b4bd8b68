//! SQLite-backed store.

use crate::error::{StoreError, StoreResult};
use crate::store::{
    clamp_search_limit, LocalStore, ResourceOverview, StoredRecord, SyncStateEntry,
    STATUS_SUCCESS,
};
use chrono::{DateTime, Utc};
use mirror_catalog::{format_timestamp, parse_timestamp, Record, Registry, ResourceDefinition};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const SYNC_STATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sync_state (
    resource TEXT PRIMARY KEY,
    last_sync_at TEXT,
    last_run_status TEXT
);
";

/// A store persisting every resource in one SQLite database.
///
/// # Durability
///
/// Every `upsert_batch` and `write_watermark` call commits its own
/// transaction, so a crash never loses a batch that was reported as written.
///
/// # Thread Safety
///
/// The connection is guarded by a mutex: readers and the single writer are
/// serialized, which matches the one-run-at-a-time model of the engine.
///
/// # Example
///
/// ```no_run
/// use mirror_catalog::Registry;
/// use mirror_store::{LocalStore, SqliteStore};
/// use std::path::Path;
///
/// let registry = Registry::builtin();
/// let store = SqliteStore::open(Path::new("data/inventory.db"), &registry).unwrap();
/// let overview = store.overview(&registry).unwrap();
/// ```
#[derive(Debug)]
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
    tables: Mutex<HashSet<String>>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`, creating parent directories
    /// and one table per registered resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open(path: &Path, registry: &Registry) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

        Self::bootstrap(conn, Some(path.to_path_buf()), registry)
    }

    /// Creates a private in-memory database.
    pub fn open_in_memory(registry: &Registry) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn, None, registry)
    }

    fn bootstrap(conn: Connection, path: Option<PathBuf>, registry: &Registry) -> StoreResult<Self> {
        conn.execute_batch(SYNC_STATE_SCHEMA)?;
        let store = Self {
            path,
            conn: Mutex::new(conn),
            tables: Mutex::new(HashSet::new()),
        };
        {
            let conn = store.conn.lock();
            for definition in registry.iter() {
                store.ensure_table(&conn, definition.table)?;
            }
        }
        Ok(store)
    }

    /// Returns the database path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of rows stored in `table`.
    pub fn row_count(&self, table: &str) -> StoreResult<u64> {
        let conn = self.conn.lock();
        self.ensure_table(&conn, table)?;
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn ensure_table(&self, conn: &Connection, table: &str) -> StoreResult<()> {
        if !is_plain_identifier(table) || table == "sync_state" {
            return Err(StoreError::InvalidTable(table.to_string()));
        }

        let mut tables = self.tables.lock();
        if tables.contains(table) {
            return Ok(());
        }

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            );"
        ))?;
        tables.insert(table.to_string());
        Ok(())
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> StoreResult<Vec<StoredRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, data, updated_at, fetched_at) = row?;
            records.push(StoredRecord {
                id,
                data: serde_json::from_str(&data)?,
                updated_at,
                fetched_at,
            });
        }
        Ok(records)
    }
}

impl LocalStore for SqliteStore {
    fn upsert_batch(
        &self,
        table: &str,
        primary_key_field: &str,
        records: &[Record],
    ) -> StoreResult<usize> {
        let mut conn = self.conn.lock();
        self.ensure_table(&conn, table)?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {table} (id, data, updated_at, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     data = excluded.data,
                     updated_at = excluded.updated_at,
                     fetched_at = excluded.fetched_at"
            ))?;
            for record in records {
                let payload = serde_json::to_string(&record.raw_payload)?;
                stmt.execute(params![
                    record.primary_key,
                    payload,
                    record.updated_at_column(),
                    format_timestamp(&record.fetched_at),
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            table,
            key = primary_key_field,
            rows = records.len(),
            "committed batch"
        );
        Ok(records.len())
    }

    fn read_watermark(&self, resource: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let conn = self.conn.lock();
        let value: Option<Option<String>> = conn
            .query_row(
                "SELECT last_sync_at FROM sync_state WHERE resource = ?1",
                params![resource],
                |row| row.get(0),
            )
            .optional()?;

        match value.flatten() {
            None => Ok(None),
            Some(text) => parse_timestamp(&text).map(Some).ok_or_else(|| {
                StoreError::Corrupted(format!("watermark of {resource} is not a timestamp: {text}"))
            }),
        }
    }

    fn write_watermark(&self, resource: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sync_state (resource, last_sync_at, last_run_status)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(resource) DO UPDATE SET
                 last_sync_at = excluded.last_sync_at,
                 last_run_status = excluded.last_run_status",
            params![resource, format_timestamp(&at), STATUS_SUCCESS],
        )?;
        Ok(())
    }

    fn sync_states(&self) -> StoreResult<Vec<SyncStateEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT resource, last_sync_at, last_run_status FROM sync_state ORDER BY resource",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (resource_name, last_sync_at, last_run_status) = row?;
            entries.push(SyncStateEntry {
                resource_name,
                last_sync_at: last_sync_at.as_deref().and_then(parse_timestamp),
                last_run_status,
            });
        }
        Ok(entries)
    }

    fn overview(&self, registry: &Registry) -> StoreResult<Vec<ResourceOverview>> {
        let states = self.sync_states()?;

        let conn = self.conn.lock();
        let mut overview = Vec::with_capacity(registry.len());
        for definition in registry.iter() {
            self.ensure_table(&conn, definition.table)?;
            let (count, last_updated, last_fetched): (i64, Option<String>, Option<String>) = conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*), MAX(updated_at), MAX(fetched_at) FROM {}",
                        definition.table
                    ),
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;

            overview.push(ResourceOverview {
                resource: definition.name.to_string(),
                label: definition.label.to_string(),
                count: count.max(0) as u64,
                last_updated,
                last_fetched,
                last_synced: states
                    .iter()
                    .find(|s| s.resource_name == definition.name)
                    .and_then(|s| s.last_sync_at),
            });
        }
        Ok(overview)
    }

    fn search(
        &self,
        definition: &ResourceDefinition,
        query: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<StoredRecord>> {
        let limit = clamp_search_limit(limit) as i64;
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let table = definition.table;

        let conn = self.conn.lock();
        self.ensure_table(&conn, table)?;

        match query {
            Some(q) => {
                let pattern = format!("%{q}%");
                Self::query_records(
                    &conn,
                    &format!(
                        "SELECT id, data, updated_at, fetched_at FROM {table}
                         WHERE id = ?1 OR data LIKE ?2
                         ORDER BY fetched_at DESC LIMIT ?3"
                    ),
                    params![q, pattern, limit],
                )
            }
            None => Self::query_records(
                &conn,
                &format!(
                    "SELECT id, data, updated_at, fetched_at FROM {table}
                     ORDER BY fetched_at DESC LIMIT ?1"
                ),
                params![limit],
            ),
        }
    }

    fn scan(&self, definition: &ResourceDefinition, limit: usize) -> StoreResult<Vec<StoredRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let table = definition.table;

        let conn = self.conn.lock();
        self.ensure_table(&conn, table)?;
        Self::query_records(
            &conn,
            &format!(
                "SELECT id, data, updated_at, fetched_at FROM {table}
                 ORDER BY fetched_at DESC, rowid DESC LIMIT ?1"
            ),
            params![limit],
        )
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
        let table = definition.table;

        let conn = self.conn.lock();
        self.ensure_table(&conn, table)?;
        let mut records = Self::query_records(
            &conn,
            &format!(
                "SELECT id, data, updated_at, fetched_at FROM {table} WHERE id = ?1 LIMIT 1"
            ),
            params![id],
        )?;
        Ok(records.pop())
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
