//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up stores, registries and
//! sync contexts in tests.

use chrono::Utc;
use mirror_catalog::{Record, Registry, ResourceDefinition};
use serde_json::Value;
use mirror_store::{LocalStore, SqliteStore};
use mirror_sync_engine::{RemoteSource, RetryConfig, SyncConfig, SyncContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A SQLite store in a temporary directory, removed on drop.
pub struct TestStore {
    /// The store instance.
    pub store: SqliteStore,
    path: PathBuf,
    /// Kept alive to prevent cleanup.
    _temp_dir: TempDir,
}

impl TestStore {
    /// Creates a file-backed store for `registry`.
    pub fn new(registry: &Registry) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("data").join("inventory.db");
        let store = SqliteStore::open(&path, registry).expect("Failed to open test store");
        Self {
            store,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reopens the same file, as a new process would.
    pub fn reopen(&self, registry: &Registry) -> SqliteStore {
        SqliteStore::open(&self.path, registry).expect("Failed to reopen test store")
    }
}

impl std::ops::Deref for TestStore {
    type Target = SqliteStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary file-backed store.
pub fn with_temp_store<F, R>(registry: &Registry, f: F) -> R
where
    F: FnOnce(&SqliteStore, &Path) -> R,
{
    let test_store = TestStore::new(registry);
    f(&test_store.store, test_store.path())
}

/// Three small resources: `alpha` and `beta` with an incremental filter,
/// `gamma` without one.
pub fn test_registry() -> Registry {
    Registry::new(vec![
        ResourceDefinition::new("alpha", "alpha/").with_label("Alpha"),
        ResourceDefinition::new("beta", "beta/").with_label("Beta"),
        ResourceDefinition::new("gamma", "gamma/")
            .with_label("Gamma")
            .without_incremental_filter(),
    ])
    .expect("Invalid test registry")
}

/// Sync settings for tests: retries never sleep.
pub fn test_config(page_size: u32, batch_size: usize) -> SyncConfig {
    SyncConfig::new()
        .with_page_size(page_size)
        .with_batch_size(batch_size)
        .with_retry(RetryConfig::immediate(3))
}

/// Builds a context around the given collaborators.
pub fn context(
    registry: Registry,
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn LocalStore>,
    config: SyncConfig,
) -> SyncContext {
    SyncContext::new(Arc::new(registry), remote, store, config)
}

/// Writes raw upstream documents into the table of `resource`.
///
/// Documents without a usable id are skipped. Returns the rows written.
pub fn seed_documents(
    store: &dyn LocalStore,
    registry: &Registry,
    resource: &str,
    documents: Vec<Value>,
) -> usize {
    let def = registry.get(resource).expect("Unknown resource");
    let records: Vec<Record> = documents
        .into_iter()
        .filter_map(|doc| Record::from_document(def, doc, Utc::now()))
        .collect();
    store
        .upsert_batch(def.table, def.primary_key_field, &records)
        .expect("Failed to seed documents")
}
