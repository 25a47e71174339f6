//! # BORIS Core
//!
//! Local persistence core for BORIS OS.
//!
//! This crate provides:
//! - A storage gateway over named collections with secondary indexes
//! - A write guard that pauses ordinary writes while a restore runs
//! - Soft deletes through tombstones, with restore, purge and reconcile
//! - Versioned JSON backup bundles: export, validate and import
//! - Health metrics for the settings screen
//!
//! ## Quick start
//!
//! ```rust
//! use boris_core::{schema::stores, Database};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> boris_core::CoreResult<()> {
//! let db = Database::open_in_memory()?;
//!
//! let tasks = db.entities(stores::TASKS)?;
//! let task = tasks.create(json!({ "title": "Water the plants" })).await?;
//! let id = task.get_str("id").unwrap_or_default().to_string();
//!
//! assert!(tasks.delete(&id).await?);
//! assert!(tasks.get(&id)?.is_none());
//!
//! tasks.restore(&id).await?;
//! assert!(tasks.get(&id)?.is_some());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backup;
mod change_feed;
mod config;
mod connector;
mod database;
pub mod dir;
mod entity;
mod error;
pub mod guard;
mod health;
mod index;
mod record;
pub mod schema;
mod stats;
mod tombstone;
mod types;

pub use backup::{BackupManager, Bundle, BundleMeta, BundleReport, ImportOptions, ImportSummary};
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeType, EventSink};
pub use config::{Config, APP_ID};
pub use connector::Connector;
pub use database::{Database, WriteBatch, WriteOp};
pub use entity::{EntityStore, CREATED_AT};
pub use error::{CoreError, CoreResult};
pub use guard::{ExclusiveGuard, WriteGuard};
pub use health::HealthMetrics;
pub use index::IndexKey;
pub use record::{Record, UPDATED_AT, UPDATED_AT_CAMEL};
pub use schema::{Schema, SchemaStep, SchemaVersion};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use tombstone::{ReconcileReport, Tombstone, TombstoneManager};
pub use types::{iso_timestamp, parse_timestamp, SequenceNumber};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
