//! # Mirror Sync Server
//!
//! HTTP panel over the local mirror.
//!
//! This crate provides:
//! - Read-only views of the mirrored resources (overview, search, detail)
//! - Inventory KPIs computed from the mirror
//! - A sync trigger that honors the single-flight rule
//! - Status and cancellation of the active run
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/health` | liveness and whether a run is active |
//! | GET | `/api/resources` | registered resource definitions |
//! | GET | `/api/overview` | row counts and watermarks per resource |
//! | GET | `/api/resource/{slug}?q=&limit=` | newest or matching rows |
//! | GET | `/api/resource/{slug}/item/{id}` | one stored row |
//! | GET | `/api/analytics/report?velocity_days=&turnover_days=&safety_stock=&low_days=&excess_days=&top=&limit=` | inventory report |
//! | GET | `/api/analytics/product/{id}?...` | KPIs of one product (same query) |
//! | POST | `/api/sync?resources=&since=&full_refresh=&page_size=&batch_size=&wait=` | start a run |
//! | GET | `/api/sync/status` | active run and last outcome |
//! | POST | `/api/sync/cancel` | cancel the active run |
//!
//! Errors are returned as `{"error": "..."}` with a 4xx or 5xx status.
//!
//! # Threading
//!
//! The engine is blocking. Store reads and sync runs execute on Tokio's
//! blocking pool, and the remote source is built there through a
//! [`SourceFactory`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::{ErrorBody, ServerError, ServerResult};
pub use handler::{AnalyticsParams, HandlerContext, SearchParams, SearchResponse, SourceFactory, SyncParams};
pub use server::MirrorServer;
