//! # Catalog Mirror Testkit
//!
//! Test utilities for the catalog mirror.
//!
//! This crate provides:
//! - Temporary SQLite stores and a small test registry
//! - A scripted remote that replays pages and failures in order
//! - A store wrapper that injects persistence failures
//! - Document generators and proptest strategies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mirror_testkit::prelude::*;
//!
//! #[test]
//! fn mirrors_one_resource() {
//!     let remote = ScriptedRemote::new();
//!     remote.script("alpha/", [Reply::last(documents("a", 3))]);
//!     // ... build a context and run
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod remote;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::remote::*;
    pub use crate::store::*;
}

pub use fixtures::*;
pub use generators::*;
pub use remote::*;
pub use store::*;
