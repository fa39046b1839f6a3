//! Configuration types for janus
//!
//! This module defines the dual-write configuration shared by the REST
//! layer, the dual writer, and the background syncer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Extra slack added to the syncer lock's staleness bound so a crashed
/// holder times out but two sync bodies can never overlap.
pub const SYNC_LOCK_SLACK: Duration = Duration::from_secs(5 * 60);

/// Dual-write configuration for a single resource
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DualWriteConfig {
    /// Dual-writer variant; only mode 2 (write-both, read-legacy) is supported
    pub mode: u8,
    /// Resource tag used to label metrics (e.g. "savedviews")
    pub resource: String,
    /// Seconds between data-syncer passes
    pub data_syncer_interval_secs: u64,
    /// Cloud stack identifier; selects the cloud namespace formatter when set
    pub stack_id: Option<String>,
}

impl Default for DualWriteConfig {
    fn default() -> Self {
        Self {
            mode: 2,
            resource: "resources".to_string(),
            data_syncer_interval_secs: 60,
            stack_id: None,
        }
    }
}

impl DualWriteConfig {
    /// Period between sync attempts
    #[must_use]
    pub fn data_syncer_interval(&self) -> Duration {
        Duration::from_secs(self.data_syncer_interval_secs)
    }

    /// Staleness bound for the syncer's distributed lock. Must strictly
    /// exceed the longest plausible sync runtime.
    #[must_use]
    pub fn sync_lock_max_interval(&self) -> Duration {
        self.data_syncer_interval() + SYNC_LOCK_SLACK
    }
}
