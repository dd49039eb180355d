//! Background garbage collector for tombstoned quotes
//!
//! A single perpetual loop with two states:
//!
//! ```text
//!   idle ──(tombstones / records > threshold)──→ compacting
//!    ↑                                              │
//!    └──────────────── one pass ────────────────────┘
//! ```
//!
//! Between checks the task sleeps for the policy interval. The task only
//! holds a weak reference to its store and is aborted when the store is
//! dropped.

use super::memory::MemoryStore;
use crate::metrics;
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub const DEFAULT_THRESHOLD: f64 = 0.1;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// When and how often the collector compacts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcPolicy {
    /// Tombstone fraction of all records that must be exceeded
    pub threshold: f64,
    /// Sleep between two checks
    pub interval: Duration,
}

impl Default for GcPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl GcPolicy {
    /// An empty store never compacts.
    pub fn should_compact(&self, tombstones: usize, records: usize) -> bool {
        if records == 0 {
            return false;
        }
        tombstones as f64 / records as f64 > self.threshold
    }
}

/// Outcome of one compaction pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompactionStats {
    /// Tombstoned quotes physically removed
    pub reclaimed: usize,
    /// Quotes left in the primary map, and in the rebuilt roster
    pub surviving: usize,
    /// Author buckets removed because they became empty
    pub authors_dropped: usize,
    pub duration: Duration,
}

pub(crate) fn spawn(runtime: &Handle, store: Weak<MemoryStore>, interval: Duration) -> JoinHandle<()> {
    runtime.spawn(async move {
        debug!(interval_ms = interval.as_millis() as u64, "Garbage collector started");

        loop {
            tokio::time::sleep(interval).await;

            let Some(store) = store.upgrade() else {
                debug!("Store dropped, garbage collector exiting");
                break;
            };

            match store.collect_garbage() {
                Ok(Some(stats)) => metrics::record_compaction(&stats),
                Ok(None) => {}
                Err(e) => {
                    // No retry: a failed pass leaves the store poisoned.
                    error!(error = %e, "Garbage collector stopped");
                    break;
                }
            }
        }

        info!("Garbage collector finished");
    })
}
