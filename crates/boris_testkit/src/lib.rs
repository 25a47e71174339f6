//! # BORIS Testkit
//!
//! Test utilities for the BORIS data core.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//! - A storage backend with injectable failures
//!
//! ## Usage
//!
//! ```rust
//! use boris_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     let ids = seed_tasks(db, 3);
//!     assert_eq!(ids.len(), 3);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod failing;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::failing::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use failing::*;
pub use fixtures::*;
pub use generators::*;
