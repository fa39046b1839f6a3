//! Lock service surface
//!
//! The data syncer must run on at most one replica at a time. The lock
//! service contract mirrors a database-backed server lock: at most one
//! body runs cluster-wide per name, the lock is released when the body
//! returns, and a crashed holder's lock times out after the staleness
//! bound.

use async_trait::async_trait;
use futures::future::BoxFuture;
use janus_common::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::identity::RequestContext;

/// The critical section executed under the lock
pub type LockBody = Box<dyn FnOnce(RequestContext) -> BoxFuture<'static, ()> + Send>;

/// Distributed named mutex with a staleness bound.
///
/// `max_interval` must be so long that two bodies can never run at the
/// same time; a holder that crashed is considered released once
/// `max_interval` has elapsed since it acquired the lock.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Run `body` if the named lock is free (or stale), releasing the
    /// lock afterwards. If another process holds the lock, return
    /// without running the body; that is not an error.
    async fn lock_execute_and_release(
        &self,
        ctx: &RequestContext,
        name: &str,
        max_interval: Duration,
        body: LockBody,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    acquired_at: Option<Instant>,
}

/// In-process lock service for single-node deployments and tests.
///
/// Implements the same skip-when-held and stale-takeover semantics as a
/// database-backed lock, scoped to one process.
#[derive(Debug, Default)]
pub struct InProcessLockService {
    locks: Mutex<HashMap<String, LockState>>,
}

impl InProcessLockService {
    /// Create an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn try_acquire(&self, name: &str, max_interval: Duration) -> bool {
        let mut locks = self.locks.lock();
        let state = locks.entry(name.to_string()).or_default();
        if state.held {
            match state.acquired_at {
                Some(at) if at.elapsed() < max_interval => return false,
                // Stale holder: assume it crashed and take over.
                _ => {}
            }
        }
        state.held = true;
        state.acquired_at = Some(Instant::now());
        true
    }

    fn release(&self, name: &str) {
        let mut locks = self.locks.lock();
        if let Some(state) = locks.get_mut(name) {
            state.held = false;
            state.acquired_at = None;
        }
    }
}

#[async_trait]
impl LockService for InProcessLockService {
    async fn lock_execute_and_release(
        &self,
        ctx: &RequestContext,
        name: &str,
        max_interval: Duration,
        body: LockBody,
    ) -> Result<()> {
        if !self.try_acquire(name, max_interval) {
            tracing::debug!("lock {:?} is held elsewhere, skipping", name);
            return Ok(());
        }
        body(ctx.clone()).await;
        self.release(name);
        Ok(())
    }
}
