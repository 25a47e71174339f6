//! Storage with configurable failure injection.
//!
//! [`FailingBackend`] delegates to an [`InMemoryBackend`] and fails chosen
//! `replace` or `sync` calls. The [`FaultPlan`] is shared, so a test keeps
//! a clone to arm failures after the backend has been moved into a
//! database.

use boris_core::{Config, Database};
use boris_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Which backend calls fail.
///
/// Each `*_fail_at` holds a call number (1-based, counted since the plan
/// was created); that call and every later one fail. 0 disables failure.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    replace_fail_at: Arc<AtomicU64>,
    sync_fail_at: Arc<AtomicU64>,
    replace_count: Arc<AtomicU64>,
    sync_count: Arc<AtomicU64>,
}

impl FaultPlan {
    /// Creates a plan with no failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `replace` call and every one after it.
    pub fn fail_next_replace(&self) {
        let next = self.replace_count.load(Ordering::SeqCst) + 1;
        self.replace_fail_at.store(next, Ordering::SeqCst);
    }

    /// Fails the next `sync` call and every one after it.
    pub fn fail_next_sync(&self) {
        let next = self.sync_count.load(Ordering::SeqCst) + 1;
        self.sync_fail_at.store(next, Ordering::SeqCst);
    }

    /// Disables all failures.
    pub fn clear_failures(&self) {
        self.replace_fail_at.store(0, Ordering::SeqCst);
        self.sync_fail_at.store(0, Ordering::SeqCst);
    }

    /// Returns how many `replace` calls were made.
    pub fn replace_calls(&self) -> u64 {
        self.replace_count.load(Ordering::SeqCst)
    }

    fn should_fail(counter: &AtomicU64, fail_at: &AtomicU64) -> bool {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let target = fail_at.load(Ordering::SeqCst);
        target != 0 && count >= target
    }
}

/// Backend that delegates to [`InMemoryBackend`] but can inject failures.
#[derive(Debug)]
pub struct FailingBackend {
    inner: InMemoryBackend,
    plan: FaultPlan,
}

impl FailingBackend {
    /// Creates an empty backend following `plan`.
    pub fn new(plan: FaultPlan) -> Self {
        Self {
            inner: InMemoryBackend::new(),
            plan,
        }
    }

    fn injected(op: &str) -> StorageError {
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("injected {op} failure"),
        ))
    }
}

impl StorageBackend for FailingBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        self.inner.load()
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        if FaultPlan::should_fail(&self.plan.replace_count, &self.plan.replace_fail_at) {
            return Err(Self::injected("replace"));
        }
        self.inner.replace(data)
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if FaultPlan::should_fail(&self.plan.sync_count, &self.plan.sync_fail_at) {
            return Err(Self::injected("sync"));
        }
        self.inner.sync()
    }
}

/// Opens a database on a [`FailingBackend`] and returns its plan.
pub fn failing_database(config: Config) -> (Database, FaultPlan) {
    let plan = FaultPlan::new();
    let db = Database::open_with_backend(config, Box::new(FailingBackend::new(plan.clone())))
        .expect("Failed to open database on failing backend");
    (db, plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fails_from_the_armed_call_on() {
        let plan = FaultPlan::new();
        let mut backend = FailingBackend::new(plan.clone());

        backend.replace(b"one").unwrap();
        plan.fail_next_replace();
        assert!(backend.replace(b"two").is_err());
        assert!(backend.replace(b"three").is_err());
        assert_eq!(backend.load().unwrap(), Some(b"one".to_vec()));

        plan.clear_failures();
        backend.replace(b"four").unwrap();
        assert_eq!(plan.replace_calls(), 4);
    }

    #[test]
    fn sync_failures_are_independent() {
        let plan = FaultPlan::new();
        let mut backend = FailingBackend::new(plan.clone());

        plan.fail_next_sync();
        backend.replace(b"data").unwrap();
        assert!(backend.sync().is_err());
    }
}
