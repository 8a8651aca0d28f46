// Recognized configuration (spec.md §6). Parsing config files is an
// external concern (spec.md §1 Non-goals); this is the plain struct
// the rest of the external configuration layer is expected to fill
// in, serde-derived the way teacher config-shaped structs are
// (e.g. common/src/kyc/data.rs).

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynchronizerConfig {
    /// `ModifiersCache` capacity.
    pub max_modifiers_cache_size: usize,
    /// Per-attempt wait before `CheckDelivery` fires, in milliseconds.
    pub delivery_timeout_ms: u64,
    /// Attempts before an id is forgotten.
    pub max_delivery_checks: u32,
    /// Upper bound on ids per Inv/Request message.
    pub max_inv_objects: usize,
    /// Upper bound on bytes per Modifiers message.
    pub max_packet_size: usize,
    /// Periodic sync-info tick, in milliseconds.
    pub sync_interval_ms: u64,
    /// Minimum gap between two outbound syncs to the same peer, in milliseconds.
    pub sync_status_refresh_ms: u64,
    /// Depth of the inbound event queue (spec.md §5: "bounded inbound queue").
    pub event_queue_capacity: usize,
}

impl SynchronizerConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn sync_status_refresh(&self) -> Duration {
        Duration::from_millis(self.sync_status_refresh_ms)
    }
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            max_modifiers_cache_size: 1024,
            delivery_timeout_ms: 10_000,
            max_delivery_checks: 2,
            max_inv_objects: 512,
            max_packet_size: 2 * 1024 * 1024,
            sync_interval_ms: 20_000,
            sync_status_refresh_ms: 5_000,
            event_queue_capacity: 1024,
        }
    }
}
