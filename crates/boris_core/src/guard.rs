//! Write guard: one exclusive operation versus all other writes.
//!
//! Every mutation runs through [`WriteGuard::run_write`]. An exclusive
//! operation (a replace import) calls [`WriteGuard::acquire`]: from that
//! moment no new write begins, and the acquirer waits until writes already
//! in flight have finished. [`WriteGuard::release`] resumes every suspended
//! writer.
//!
//! ```text
//!  writer ──run_write──► enabled? ──no──► active_writes += 1 ─► op ─► -= 1 ─► 0? wake drain
//!                           │
//!                          yes ─► wait for resume ─┐
//!                           ▲─────────────────────┘
//!  importer ─acquire─► holders += 1 ─► wait for drain ─► ... ─release─► holders -= 1 ─► 0? wake writers
//! ```
//!
//! The guard is enabled while at least one acquirer holds it. Each
//! successful `acquire` must be paired with one `release`.
//!
//! Reads never go through the guard.
//!
//! # Example
//!
//! ```rust
//! use boris_core::guard::WriteGuard;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> boris_core::CoreResult<()> {
//! let guard = WriteGuard::new(Duration::from_secs(5), None);
//!
//! let value = guard.run_write(|| async { 41 + 1 }).await;
//! assert_eq!(value, 42);
//!
//! {
//!     let _exclusive = guard.exclusive().await?;
//!     assert!(guard.is_enabled());
//! }
//! assert!(!guard.is_enabled());
//! # Ok(())
//! # }
//! ```

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct GuardState {
    holders: usize,
    active_writes: usize,
}

impl GuardState {
    fn enabled(&self) -> bool {
        self.holders > 0
    }
}

/// Serializes "all writes" against "one exclusive operation".
#[derive(Debug)]
pub struct WriteGuard {
    state: Mutex<GuardState>,
    /// Wakes writers suspended while the guard was enabled.
    resume: Notify,
    /// Wakes acquirers once `active_writes` reaches zero.
    drained: Notify,
    drain_warning_after: Duration,
    acquire_timeout: Option<Duration>,
}

impl WriteGuard {
    /// Creates a disabled guard.
    ///
    /// `drain_warning_after` is when a slow drain gets logged;
    /// `acquire_timeout` is when [`acquire`](Self::acquire) gives up.
    #[must_use]
    pub fn new(drain_warning_after: Duration, acquire_timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(GuardState::default()),
            resume: Notify::new(),
            drained: Notify::new(),
            drain_warning_after,
            acquire_timeout,
        }
    }

    /// Returns true while an exclusive operation holds (or is acquiring) the guard.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled()
    }

    /// Returns the number of writes currently in flight.
    #[must_use]
    pub fn active_writes(&self) -> usize {
        self.state.lock().active_writes
    }

    /// Runs a write, waiting first while the guard is enabled.
    ///
    /// `op` is not called until the write is admitted. The in-flight count
    /// is decremented however the write ends: success, error, panic, or the
    /// returned future being dropped.
    pub async fn run_write<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self.admit().await;
        op().await
    }

    async fn admit(&self) -> WritePermit<'_> {
        loop {
            // Register interest before checking, so a release between the
            // check and the await is not missed.
            let resumed = self.resume.notified();
            tokio::pin!(resumed);
            resumed.as_mut().enable();

            {
                let mut state = self.state.lock();
                if !state.enabled() {
                    state.active_writes += 1;
                    return WritePermit { guard: self };
                }
            }

            debug!("write suspended while guard is enabled");
            resumed.await;
        }
    }

    fn finish_write(&self) {
        let drained = {
            let mut state = self.state.lock();
            state.active_writes = state.active_writes.saturating_sub(1);
            state.active_writes == 0
        };
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Enables the guard and waits for in-flight writes to drain.
    ///
    /// Acquiring an already enabled guard adds a holder and still waits
    /// for drain. The guard stays enabled until every holder has released.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::GuardTimeout`] if writes are still in flight
    /// after the configured timeout. This call's hold is given up first.
    pub async fn acquire(&self) -> CoreResult<()> {
        let holders = {
            let mut state = self.state.lock();
            state.holders += 1;
            state.holders
        };
        debug!(holders, "write guard enabled");

        let started = Instant::now();
        let mut warned = false;

        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            let active = self.active_writes();
            if active == 0 {
                return Ok(());
            }

            let elapsed = started.elapsed();
            if let Some(limit) = self.acquire_timeout {
                if elapsed >= limit {
                    self.release();
                    return Err(CoreError::GuardTimeout {
                        waited_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                        active_writes: active,
                    });
                }
            }

            if !warned && elapsed >= self.drain_warning_after {
                warn!(
                    waited_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    active_writes = active,
                    "write guard still waiting for in-flight writes"
                );
                warned = true;
            }

            let mut wait = None;
            if !warned {
                wait = Some(self.drain_warning_after.saturating_sub(elapsed));
            }
            if let Some(limit) = self.acquire_timeout {
                let remaining = limit.saturating_sub(elapsed);
                wait = Some(wait.map_or(remaining, |w: Duration| w.min(remaining)));
            }

            match wait {
                Some(wait) => {
                    let _ = tokio::time::timeout(wait, drained).await;
                }
                None => drained.await,
            }
        }
    }

    /// Gives up one hold; the last holder disables the guard and resumes
    /// every suspended writer.
    pub fn release(&self) {
        let holders = {
            let mut state = self.state.lock();
            state.holders = state.holders.saturating_sub(1);
            state.holders
        };
        if holders == 0 {
            self.resume.notify_waiters();
        }
        debug!(holders, "write guard released");
    }

    /// Acquires the guard for the lifetime of the returned value.
    ///
    /// The guard is released when the value is dropped, on every exit path.
    pub async fn exclusive(&self) -> CoreResult<ExclusiveGuard<'_>> {
        self.acquire().await?;
        Ok(ExclusiveGuard { guard: self })
    }
}

impl Default for WriteGuard {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Some(Duration::from_secs(60)))
    }
}

struct WritePermit<'a> {
    guard: &'a WriteGuard,
}

impl Drop for WritePermit<'_> {
    fn drop(&mut self) {
        self.guard.finish_write();
    }
}

/// Scoped exclusive access; releases the guard on drop.
#[derive(Debug)]
#[must_use = "the guard is released as soon as this value is dropped"]
pub struct ExclusiveGuard<'a> {
    guard: &'a WriteGuard,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        self.guard.release();
    }
}
