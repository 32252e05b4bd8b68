//! # Catalog Mirror: Store
//!
//! Local persistence for mirrored records and per-resource watermarks.
//!
//! This crate is the persistence collaborator of the sync engine. It exposes
//! exactly what the engine needs (batch upserts and watermark reads/writes)
//! plus the read side used by the CLI and the HTTP panel.
//!
//! ## Design Principles
//!
//! - One table per resource, keyed by the record's primary key
//! - One shared `sync_state` table keyed by resource name
//! - Each `upsert_batch` call is one transaction
//! - Stores must be `Send + Sync`; writers are serialized internally
//!
//! ## Available Stores
//!
//! - [`SqliteStore`] - Durable storage in a SQLite file
//! - [`MemoryStore`] - For tests; also records every commit
//!
//! ## Example
//!
//! ```rust
//! use mirror_catalog::{Record, ResourceDefinition};
//! use mirror_store::{LocalStore, MemoryStore};
//! use serde_json::json;
//!
//! let store = MemoryStore::new();
//! let def = ResourceDefinition::new("products", "producto/");
//! let record = Record::from_document(&def, json!({"id": "P1"}), chrono::Utc::now()).unwrap();
//!
//! let written = store.upsert_batch("products", "id", &[record]).unwrap();
//! assert_eq!(written, 1);
//! assert_eq!(store.row_count("products"), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod sqlite;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::{CommitLogEntry, MemoryStore};
pub use sqlite::SqliteStore;
pub use store::{
    clamp_search_limit, LocalStore, ResourceOverview, StoredRecord, SyncStateEntry,
    MAX_SEARCH_LIMIT, STATUS_SUCCESS,
};
