//! # BORIS Storage
//!
//! Snapshot storage backends for the BORIS OS data core.
//!
//! This crate provides the lowest-level persistence abstraction. Backends
//! are **opaque byte stores** holding exactly one snapshot: they do not
//! interpret the data they store.
//!
//! ## Design Principles
//!
//! - Backends hold a single snapshot (load, replace, sync)
//! - Replacing the snapshot is all-or-nothing
//! - No knowledge of collections, records or the snapshot encoding
//! - Must be `Send + Sync` so a database can be shared across tasks
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral databases
//! - [`FileBackend`] - For persistent storage using write-then-rename
//!
//! ## Example
//!
//! ```rust
//! use boris_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! assert!(backend.load().unwrap().is_none());
//!
//! backend.replace(b"{\"collections\":{}}").unwrap();
//! assert_eq!(backend.load().unwrap().unwrap(), b"{\"collections\":{}}");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
