//! CLI command implementations.

pub mod backup;
pub mod health;
pub mod tombstones;
