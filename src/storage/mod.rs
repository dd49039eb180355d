//! Storage layer
//!
//! # Architecture
//!
//! ```text
//! Storage (facade used by the HTTP layer)
//!   └─→ dyn QuoteEngine
//!        └─→ MemoryStore ("memdb")
//!             ├─→ IdGenerator        strictly increasing ids
//!             ├─→ primary map, author index, roster, tombstones
//!             └─→ garbage collector  background compaction task
//! ```
//!
//! Deletes are logical: a quote is tombstoned at once and physically
//! reclaimed later, when the tombstone ratio exceeds the configured
//! threshold.

pub mod engine;
pub mod gc;
pub mod id_gen;
pub mod memory;
pub mod quote;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use engine::{QuoteEngine, Storage, StoreStats};
pub use gc::{CompactionStats, GcPolicy};
pub use id_gen::IdGenerator;
pub use memory::MemoryStore;
pub use quote::{NewQuote, Quote, QuoteId};

/// Backend name of the in-memory store
pub const MEMDB: &str = "memdb";

/// Store configuration (`[database]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend type; only "memdb" exists
    #[serde(rename = "type")]
    pub kind: String,
    /// First id handed out
    pub start_id: QuoteId,
    /// Tombstone ratio above which the collector compacts
    pub gc_threshold: f64,
    /// Milliseconds between two collector checks
    pub gc_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: MEMDB.to_string(),
            start_id: 0,
            gc_threshold: gc::DEFAULT_THRESHOLD,
            gc_interval_ms: gc::DEFAULT_INTERVAL.as_millis() as u64,
        }
    }
}

impl StoreConfig {
    pub fn gc_policy(&self) -> GcPolicy {
        GcPolicy {
            threshold: self.gc_threshold,
            interval: Duration::from_millis(self.gc_interval_ms),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kind != MEMDB {
            return Err(Error::Config(format!("no such db: {:?}", self.kind)));
        }
        if !(self.gc_threshold > 0.0 && self.gc_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "gc_threshold must be in (0, 1], got {}",
                self.gc_threshold
            )));
        }
        if self.gc_interval_ms == 0 {
            return Err(Error::Config("gc_interval_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Open the configured backend. Must run inside a Tokio runtime.
pub fn open(config: &StoreConfig) -> Result<Storage> {
    config.validate()?;
    let store = MemoryStore::new(config.clone())?;
    Ok(Storage::new(store as Arc<dyn QuoteEngine>))
}
