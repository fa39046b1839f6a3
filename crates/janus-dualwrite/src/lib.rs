//! Janus Dualwrite - dual-writer storage dispatcher and data syncer
//!
//! This crate coordinates writes and reads across two backing stores
//! during a live migration from a legacy store to a new unified store.
//! The dual writer preserves single-store semantics to callers while
//! mirroring writes to both stores; the data syncer periodically aligns
//! the unified store toward the legacy store under a cluster-wide lock.

pub mod compare;
pub mod identity;
pub mod lock;
pub mod memstore;
pub mod meta;
pub mod metrics;
pub mod mode2;
pub mod scheduler;
pub mod store;
pub mod syncer;

pub use identity::{namespace_for, RequestContext, RequestInfo, Requester};
pub use lock::{InProcessLockService, LockService};
pub use memstore::MemoryStore;
pub use metrics::DualWriterMetrics;
pub use mode2::DualWriter;
pub use scheduler::SyncScheduler;
pub use store::{
    DefaultUpdatedObjectInfo, DualWriterMode, ObjectValidator, ResourceStore, UpdateValidator,
    UpdatedObjectInfo,
};
pub use syncer::{sync, SYNC_LOCK_NAME};
