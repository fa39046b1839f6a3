//! Background sync scheduling
//!
//! The core exposes `sync` as a one-shot pass; this module provides the
//! trivial scheduler that invokes it on the configured interval. Each
//! tick is independent: a failed pass is logged and the next tick runs
//! normally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use crate::identity::{RequestContext, RequestInfo};
use crate::lock::LockService;
use crate::metrics::DualWriterMetrics;
use crate::store::ResourceStore;
use crate::syncer;

/// Handle to a running background sync loop
pub struct SyncScheduler {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawn a loop that runs a sync pass every `interval`, starting
    /// with an immediate first pass.
    pub fn spawn(
        legacy: Arc<dyn ResourceStore>,
        storage: Arc<dyn ResourceStore>,
        resource: impl Into<String>,
        metrics: Arc<DualWriterMetrics>,
        lock_service: Arc<dyn LockService>,
        request_info: RequestInfo,
        interval: Duration,
    ) -> Self {
        let resource = resource.into();
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let ctx = RequestContext::new();
                match syncer::sync(
                    &ctx,
                    legacy.clone(),
                    storage.clone(),
                    &resource,
                    metrics.clone(),
                    lock_service.clone(),
                    &request_info,
                    interval,
                )
                .await
                {
                    Ok(true) => debug!("sync pass for {:?} converged", resource),
                    Ok(false) => warn!("sync pass for {:?} left items out of sync", resource),
                    Err(err) => error!("sync pass for {:?} failed: {}", resource, err),
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Ask the loop to stop at its next tick
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Stop the loop and wait for it to finish
    pub async fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.handle.abort();
        let _ = self.handle.await;
    }
}
