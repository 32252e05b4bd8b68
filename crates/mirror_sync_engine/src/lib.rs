//! # Catalog Mirror: Sync Engine
//!
//! Incremental, resumable mirroring of a paginated remote catalog into a
//! local store.
//!
//! This crate provides:
//! - A paginated fetcher with retry and exponential backoff
//! - A batch committer (one transaction per batch)
//! - Watermark bookkeeping per resource
//! - The orchestrator that runs resources sequentially with failure isolation
//! - A single-flight runner with cooperative cancellation
//! - The HTTP remote source for the catalog REST API
//!
//! ## Architecture
//!
//! For every selected resource, in registry order:
//! 1. Pick `since`: nothing on full refresh, else the override, else the
//!    stored watermark
//! 2. Fetch pages and hand each record to the committer
//! 3. Flush the committer, then write the run-start time as the new watermark
//!
//! ## Key Invariants
//!
//! - A watermark is written only after every batch of its resource committed
//! - Fetch and persistence failures stay within their resource
//! - Authentication failures abort the run
//! - At most one run is active per [`SyncRunner`]
//!
//! ## Example
//!
//! ```rust
//! use mirror_catalog::Registry;
//! use mirror_store::MemoryStore;
//! use mirror_sync_engine::{synchronise, MockRemote, SyncConfig, SyncContext, SyncOptions};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let remote = Arc::new(MockRemote::new());
//! remote.set_documents("producto/", vec![json!({"id": "P1"}), json!({"id": "P2"})]);
//! let store = Arc::new(MemoryStore::new());
//!
//! let ctx = SyncContext::new(
//!     Arc::new(Registry::builtin()),
//!     remote,
//!     store.clone(),
//!     SyncConfig::default(),
//! );
//! let summary = synchronise(&ctx, SyncOptions::all().with_resources(["products"])).unwrap();
//!
//! assert!(summary.is_success());
//! assert_eq!(store.row_count("products"), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod committer;
mod config;
mod error;
mod fetcher;
mod http;
mod orchestrator;
mod runner;
mod state;
mod summary;
mod transport;

pub use committer::BatchCommitter;
pub use config::{RetryConfig, SyncConfig, DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE};
pub use error::{SyncError, SyncResult};
pub use fetcher::{Fetcher, PageIter};
pub use http::{classify_status, error_message, HttpSource, HttpSourceConfig, DEFAULT_BASE_URL};
pub use orchestrator::{SyncContext, SyncOptions, SyncOrchestrator};
pub use runner::{synchronise, CancellationToken, RunGuard, RunnerStatus, SyncRunner};
pub use state::SyncStateStore;
pub use summary::{ErrorInfo, ResourceOutcome, ResourceStatus, RunSummary};
pub use transport::{MockRemote, RemoteSource};
