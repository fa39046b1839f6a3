//! Data syncer
//!
//! Periodic reconciler that drives unified storage toward the legacy
//! store as source of truth. A pass lists both stores, computes a diff
//! keyed by name, and applies upserts and deletions to unified storage.
//! The whole body runs under a cluster-wide named lock so at most one
//! replica syncs at a time.

use janus_common::config::SYNC_LOCK_SLACK;
use janus_common::{DeleteOptions, Error, ListOptions, ResourceObject, Result, UpdateOptions};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::compare;
use crate::identity::{RequestContext, RequestInfo, Requester};
use crate::lock::{LockBody, LockService};
use crate::meta;
use crate::metrics::DualWriterMetrics;
use crate::store::{DefaultUpdatedObjectInfo, ResourceStore};

/// Name of the cluster-wide lock serializing sync passes
pub const SYNC_LOCK_NAME: &str = "dualwriter mode 2 sync";

/// Upper bound on unified-storage records a pass will handle. A store
/// past this size aborts the pass; partial syncs are never attempted.
const MAX_SYNC_RECORDS: usize = 1000;

/// Org the synthetic sync principal operates in
const SYNC_ORG_ID: i64 = 1;

/// Per-name pairing of the two stores' views during a pass
#[derive(Debug, Default)]
struct SyncItem {
    obj_legacy: Option<ResourceObject>,
    obj_storage: Option<ResourceObject>,
}

#[derive(Default)]
struct SyncReport {
    everything_synced: bool,
    error: Option<Error>,
}

/// Run one sync pass under the distributed lock.
///
/// Returns whether everything that was out of sync was converged. When
/// another replica holds the lock the pass is skipped and `false` is
/// returned without error.
#[allow(clippy::too_many_arguments)]
pub async fn sync(
    ctx: &RequestContext,
    legacy: Arc<dyn ResourceStore>,
    storage: Arc<dyn ResourceStore>,
    resource: &str,
    metrics: Arc<DualWriterMetrics>,
    lock_service: Arc<dyn LockService>,
    request_info: &RequestInfo,
    data_syncer_interval: Duration,
) -> Result<bool> {
    // The staleness bound must exceed any possible body duration so a
    // crashed holder times out but two bodies never overlap.
    let max_interval = data_syncer_interval + SYNC_LOCK_SLACK;

    let report = Arc::new(Mutex::new(SyncReport::default()));
    let body_report = report.clone();
    let resource = resource.to_string();
    let request_info = request_info.clone();

    let body: LockBody = Box::new(move |lock_ctx| {
        Box::pin(async move {
            let outcome =
                run_sync_pass(lock_ctx, legacy, storage, &resource, &metrics, &request_info).await;
            let mut report = body_report.lock();
            match outcome {
                Ok(synced) => report.everything_synced = synced,
                Err(err) => report.error = Some(err),
            }
        })
    });

    lock_service
        .lock_execute_and_release(ctx, SYNC_LOCK_NAME, max_interval, body)
        .await?;

    let mut report = report.lock();
    if let Some(err) = report.error.take() {
        return Err(err);
    }
    Ok(report.everything_synced)
}

async fn run_sync_pass(
    ctx: RequestContext,
    legacy: Arc<dyn ResourceStore>,
    storage: Arc<dyn ResourceStore>,
    resource: &str,
    metrics: &DualWriterMetrics,
    request_info: &RequestInfo,
) -> Result<bool> {
    info!("starting dual writer data sync for {:?}", resource);
    let start = Instant::now();

    // Both stores enforce authorization; the pass runs as a synthetic
    // service account that can read and write every resource.
    let ctx = ctx
        .with_requester(Requester::sync_requester(SYNC_ORG_ID))
        .with_namespace(request_info.namespace.clone())
        .with_request_info(request_info.clone());

    let result = align_stores(&ctx, &*legacy, &*storage, request_info).await;
    match &result {
        Ok(synced) => {
            metrics.record_sync_outcome(*synced);
            metrics.record_sync_duration(false, start);
            info!(
                "finished dual writer data sync for {:?}: synced={}",
                resource, synced
            );
        }
        Err(err) => {
            error!("dual writer data sync for {:?} failed: {}", resource, err);
            metrics.record_sync_duration(true, start);
        }
    }
    result
}

async fn align_stores(
    ctx: &RequestContext,
    legacy: &dyn ResourceStore,
    storage: &dyn ResourceStore,
    request_info: &RequestInfo,
) -> Result<bool> {
    let storage_items = storage
        .list(ctx, &ListOptions::limited(MAX_SYNC_RECORDS))
        .await?
        .items;
    if storage_items.len() >= MAX_SYNC_RECORDS {
        return Err(Error::ListTooLarge {
            limit: MAX_SYNC_RECORDS,
        });
    }
    info!("got {} items from unified storage", storage_items.len());

    let legacy_items = legacy.list(ctx, &ListOptions::default()).await?.items;
    info!("got {} items from legacy storage", legacy_items.len());

    let mut items_by_name: BTreeMap<String, SyncItem> = BTreeMap::new();
    for obj in legacy_items {
        match meta::object_name(&obj) {
            Ok(name) => {
                let name = name.to_string();
                items_by_name.entry(name).or_default().obj_legacy = Some(obj);
            }
            Err(err) => warn!("skipping legacy object without identity: {}", err),
        }
    }
    for obj in storage_items {
        match meta::object_name(&obj) {
            Ok(name) => {
                let name = name.to_string();
                items_by_name.entry(name).or_default().obj_storage = Some(obj);
            }
            Err(err) => warn!("skipping storage object without identity: {}", err),
        }
    }
    info!("got {} items to reconcile", items_by_name.len());

    let mut out_of_sync = 0usize;
    let mut sync_success = 0usize;
    let mut sync_err = 0usize;
    let mut cancelled = false;

    for (name, item) in items_by_name {
        if ctx.is_cancelled() {
            warn!("sync cancelled, leaving remaining items for the next pass");
            cancelled = true;
            break;
        }

        match (item.obj_legacy, item.obj_storage) {
            // Upsert: storage is missing the object or its content
            // disagrees with legacy. Bookkeeping is deliberately not
            // chased here: each store owns its own uid and resource
            // version, so an upsert could never converge them.
            (Some(mut legacy_obj), storage_obj) => {
                let in_sync = storage_obj
                    .as_ref()
                    .is_some_and(|s| compare::contents_match(&legacy_obj, s));
                if in_sync {
                    continue;
                }
                out_of_sync += 1;

                let prepared = match &storage_obj {
                    // Carry storage's bookkeeping so the write passes its
                    // optimistic concurrency check.
                    Some(storage_obj) => {
                        info!("updating {:?} in unified storage", name);
                        meta::copy_store_bookkeeping(&mut legacy_obj, storage_obj)
                    }
                    // Storage will allocate fresh bookkeeping.
                    None => {
                        info!("inserting {:?} into unified storage", name);
                        meta::clear_store_bookkeeping(&mut legacy_obj)
                    }
                };
                if let Err(err) = prepared {
                    warn!("skipping {:?}: {}", name, err);
                    sync_err += 1;
                    continue;
                }

                let obj_info = DefaultUpdatedObjectInfo::new(legacy_obj);
                match storage
                    .update(
                        ctx,
                        &name,
                        &obj_info,
                        None,
                        None,
                        true,
                        &UpdateOptions::default(),
                    )
                    .await
                {
                    Ok(_) => sync_success += 1,
                    Err(err) => {
                        error!("could not upsert {:?} in unified storage: {}", name, err);
                        sync_err += 1;
                    }
                }
            }

            // Delete: the object is gone from legacy but lingers in storage.
            (None, Some(_)) => {
                out_of_sync += 1;
                let item_ctx = ctx
                    .clone()
                    .with_request_info(request_info.scoped_to(name.as_str()));
                info!("deleting {:?} from unified storage", name);
                match storage
                    .delete(&item_ctx, &name, None, &DeleteOptions::default())
                    .await
                {
                    Ok(_) => sync_success += 1,
                    Err(err) if err.is_not_found() => sync_success += 1,
                    Err(err) => {
                        error!("could not delete {:?} from unified storage: {}", name, err);
                        sync_err += 1;
                    }
                }
            }

            (None, None) => {}
        }
    }

    let everything_synced = !cancelled && out_of_sync == sync_success;
    info!(
        "finished reconciling: out_of_sync={} updated={} failed={} synced={}",
        out_of_sync, sync_success, sync_err, everything_synced
    );
    Ok(everything_synced)
}
