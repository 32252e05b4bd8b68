//! # Catalog Mirror: Catalog
//!
//! Resource registry and record types shared by every mirror crate.
//!
//! This crate provides:
//! - [`ResourceDefinition`] describing one synchronizable remote resource
//! - [`Registry`], the static, ordered catalog of definitions
//! - [`Record`] and [`Page`], the units produced by the paginated fetcher
//! - [`PageRequest`] and [`RemotePage`], the remote collaborator's wire shapes
//!
//! This is a pure data crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - Definitions are immutable once the registry is built
//! - Registry order is declaration order and drives run reports
//! - Every stored record has a non-blank primary key

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod record;
mod registry;
mod request;
mod resource;
mod timestamp;

pub use error::{CatalogError, CatalogResult};
pub use record::{extract_primary_key, Page, Record};
pub use registry::Registry;
pub use request::{PageRequest, RemotePage};
pub use resource::{
    ResourceDefinition, DEFAULT_ID_FALLBACKS, DEFAULT_INCREMENTAL_FIELD, DEFAULT_TIMESTAMP_FIELDS,
};
pub use timestamp::{format_timestamp, parse_timestamp};
