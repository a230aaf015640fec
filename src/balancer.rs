//! Balancer Module
//!
//! Picks the shard that receives the next item from an occupancy snapshot.
//!
//! ## Policies
//! - **Fill**: lowest shard id still under the soft cap. When every shard is
//!   at or over the cap there is no answer, and the caller decides whether to
//!   provision or saturate.
//! - **RoundRobin**: least-loaded shard, ties to the lowest id. The soft cap
//!   is ignored, so round-robin never asks for a new shard while any exists.
//!
//! Selection is pure. The snapshot's order does not matter.

use crate::config::BalancingMode;
use crate::metadata::ShardRecord;

/// Shard selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balancer {
    mode: BalancingMode,
    soft_cap: u64,
}

impl Balancer {
    pub fn new(mode: BalancingMode, soft_cap: u64) -> Self {
        Self { mode, soft_cap }
    }

    /// Target shard for the next item, or `None` when no shard qualifies
    pub fn select(&self, records: &[ShardRecord]) -> Option<u32> {
        match self.mode {
            BalancingMode::Fill => records
                .iter()
                .filter(|r| r.item_count < self.soft_cap)
                .map(|r| r.shard_id)
                .min(),
            BalancingMode::RoundRobin => least_loaded(records),
        }
    }

    pub fn mode(&self) -> BalancingMode {
        self.mode
    }

    pub fn soft_cap(&self) -> u64 {
        self.soft_cap
    }
}

/// Shard with the fewest items; ties go to the lowest id
pub fn least_loaded(records: &[ShardRecord]) -> Option<u32> {
    records
        .iter()
        .min_by_key(|r| (r.item_count, r.shard_id))
        .map(|r| r.shard_id)
}
