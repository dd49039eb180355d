//! In-memory quote store with lazy deletion
//!
//! # Architecture
//!
//! ```text
//! MemoryStore
//!   └─→ RwLock<Tables>            shared:    insert, list, random, delete
//!        │                         exclusive: compaction (stop the world)
//!        ├─→ quotes:     DashMap<QuoteId, Arc<Entry>>
//!        │                 Entry { quote, deleted: Mutex<bool> }
//!        ├─→ by_author:  DashMap<author, HashSet<QuoteId>>
//!        ├─→ roster:     Mutex<Vec<QuoteId>>      sampling domain for random()
//!        └─→ tombstones: Mutex<HashSet<QuoteId>>  deleted, not yet reclaimed
//! ```
//!
//! Deletion only flips the per-entry flag and registers the id as a
//! tombstone. Entries are physically removed from all structures by a
//! compaction pass, which the garbage collector triggers once the
//! tombstone ratio crosses the policy threshold.
//!
//! Lock order: entry flag → tombstones, roster → tombstones.

use super::engine::{QuoteEngine, StoreStats};
use super::gc::{self, CompactionStats, GcPolicy};
use super::id_gen::IdGenerator;
use super::quote::{NewQuote, Quote, QuoteId};
use super::StoreConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

/// Rejection-sampling attempts before `random()` falls back to a roster scan
const MAX_RANDOM_DRAWS: usize = 64;

/// A quote plus its tombstone flag. The flag never goes back to false.
struct Entry {
    quote: Quote,
    deleted: Mutex<bool>,
}

impl Entry {
    fn new(quote: Quote) -> Self {
        Self {
            quote,
            deleted: Mutex::new(false),
        }
    }

    fn is_deleted(&self) -> bool {
        *self.deleted.lock()
    }
}

#[derive(Default)]
struct Tables {
    quotes: DashMap<QuoteId, Arc<Entry>>,
    by_author: DashMap<String, HashSet<QuoteId>>,
    roster: Mutex<Vec<QuoteId>>,
    tombstones: Mutex<HashSet<QuoteId>>,
}

impl Tables {
    /// Copy of the quote behind `id`, unless it is unknown or tombstoned
    fn alive(&self, id: QuoteId) -> Option<Quote> {
        let entry = self.quotes.get(&id)?.value().clone();
        if entry.is_deleted() {
            None
        } else {
            Some(entry.quote.clone())
        }
    }

    /// Draw one roster entry, or `None` once nothing alive is left
    fn draw<R: Rng>(&self, rng: &mut R) -> Option<QuoteId> {
        let roster = self.roster.lock();
        let dead = self.tombstones.lock().len();
        if roster.len().saturating_sub(dead) == 0 {
            return None;
        }
        Some(roster[rng.gen_range(0..roster.len())])
    }

    fn compact(&mut self) -> Result<CompactionStats> {
        let dead: Vec<QuoteId> = self.tombstones.get_mut().drain().collect();

        for &id in &dead {
            let (_, entry) = self.quotes.remove(&id).ok_or_else(|| {
                Error::Corruption(format!("tombstoned quote {} missing from primary map", id))
            })?;
            if !entry.is_deleted() {
                return Err(Error::Corruption(format!(
                    "quote {} registered as tombstone but not flagged deleted",
                    id
                )));
            }

            let indexed = self
                .by_author
                .get_mut(&entry.quote.author)
                .map(|mut ids| ids.remove(&id))
                .unwrap_or(false);
            if !indexed {
                return Err(Error::Corruption(format!(
                    "quote {} missing from author index {:?}",
                    id, entry.quote.author
                )));
            }
        }

        let authors_before = self.by_author.len();
        self.by_author.retain(|_, ids| !ids.is_empty());
        let authors_dropped = authors_before - self.by_author.len();

        let roster = self.roster.get_mut();
        roster.clear();
        roster.extend(self.quotes.iter().map(|e| *e.key()));
        roster.sort_unstable();

        Ok(CompactionStats {
            reclaimed: dead.len(),
            surviving: roster.len(),
            authors_dropped,
            ..Default::default()
        })
    }
}

/// Concurrent in-memory quote store
///
/// Constructed once and shared behind an `Arc`. Reads, inserts and deletes
/// run concurrently under the shared side of a store-wide lock; only
/// compaction takes it exclusively.
pub struct MemoryStore {
    ids: IdGenerator,
    tables: RwLock<Tables>,
    policy: GcPolicy,
    compactions: AtomicU64,
    /// Set once a compaction pass finds the structures inconsistent
    poison: OnceLock<String>,
    collector: OnceLock<JoinHandle<()>>,
}

impl MemoryStore {
    /// Create a store and start its garbage collector on the current Tokio
    /// runtime. The collector lives as long as the store.
    pub fn new(config: StoreConfig) -> Result<Arc<Self>> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::Internal(format!("garbage collector needs a Tokio runtime: {}", e))
        })?;

        let store = Self::without_collector(config);
        let handle = gc::spawn(&runtime, Arc::downgrade(&store), store.policy.interval);
        let _ = store.collector.set(handle);

        info!(
            threshold = store.policy.threshold,
            interval_ms = store.policy.interval.as_millis() as u64,
            "Memory store started"
        );
        Ok(store)
    }

    /// Create a store without a background collector.
    ///
    /// Compaction then only happens through [`MemoryStore::compact`] or
    /// [`MemoryStore::collect_garbage`].
    pub fn without_collector(config: StoreConfig) -> Arc<Self> {
        Arc::new(Self {
            ids: IdGenerator::new(config.start_id),
            tables: RwLock::new(Tables::default()),
            policy: config.gc_policy(),
            compactions: AtomicU64::new(0),
            poison: OnceLock::new(),
            collector: OnceLock::new(),
        })
    }

    pub fn policy(&self) -> &GcPolicy {
        &self.policy
    }

    fn ensure_available(&self) -> Result<()> {
        match self.poison.get() {
            Some(reason) => Err(Error::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    /// Insert a quote and return its freshly assigned id
    pub fn insert(&self, quote: NewQuote) -> Result<QuoteId> {
        self.ensure_available()?;
        if quote.text.is_empty() {
            return Err(Error::Validation("quote text must not be empty".to_string()));
        }

        let tables = self.tables.read();
        let id = self.ids.next();
        let NewQuote { text, author } = quote;

        tables.quotes.insert(
            id,
            Arc::new(Entry::new(Quote {
                id,
                text,
                author: author.clone(),
            })),
        );
        tables.by_author.entry(author).or_default().insert(id);
        tables.roster.lock().push(id);

        debug!(id, "Quote inserted");
        Ok(id)
    }

    /// Snapshot of every alive quote, in no particular order
    pub fn list_all(&self) -> Result<Vec<Quote>> {
        self.ensure_available()?;
        let tables = self.tables.read();

        Ok(tables
            .quotes
            .iter()
            .filter(|e| !e.value().is_deleted())
            .map(|e| e.value().quote.clone())
            .collect())
    }

    /// Snapshot of the alive quotes by `author`. Unknown authors yield an
    /// empty list.
    pub fn list_by_author(&self, author: &str) -> Result<Vec<Quote>> {
        self.ensure_available()?;
        let tables = self.tables.read();

        let ids: Vec<QuoteId> = match tables.by_author.get(author) {
            Some(ids) => ids.iter().copied().collect(),
            None => return Ok(Vec::new()),
        };

        Ok(ids.into_iter().filter_map(|id| tables.alive(id)).collect())
    }

    /// One alive quote chosen at random
    ///
    /// Samples the roster with rejection of tombstoned ids. The alive count
    /// is re-checked on every draw, so concurrent deletions of the last
    /// alive quotes end the loop with [`Error::EmptyStore`].
    pub fn random(&self) -> Result<Quote> {
        self.ensure_available()?;
        let tables = self.tables.read();
        let mut rng = rand::thread_rng();

        for _ in 0..MAX_RANDOM_DRAWS {
            let id = tables.draw(&mut rng).ok_or(Error::EmptyStore)?;
            if let Some(quote) = tables.alive(id) {
                return Ok(quote);
            }
        }

        // Mostly dead roster: pick among the survivors directly.
        let roster = tables.roster.lock().clone();
        let alive: Vec<Quote> = roster
            .into_iter()
            .filter_map(|id| tables.alive(id))
            .collect();
        debug!(
            candidates = alive.len(),
            "Random draw fell back to roster scan"
        );
        alive.choose(&mut rng).cloned().ok_or(Error::EmptyStore)
    }

    /// Tombstone a quote. Unknown and already deleted ids are a no-op.
    pub fn delete(&self, id: QuoteId) -> Result<()> {
        self.ensure_available()?;
        let tables = self.tables.read();

        let Some(entry) = tables.quotes.get(&id).map(|e| e.value().clone()) else {
            debug!(id, "Delete of unknown quote ignored");
            return Ok(());
        };

        let mut deleted = entry.deleted.lock();
        if !*deleted {
            *deleted = true;
            tables.tombstones.lock().insert(id);
            debug!(id, "Quote tombstoned");
        }
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        let tables = self.tables.read();
        let records = tables.quotes.len();
        let tombstones = tables.tombstones.lock().len();
        let roster_len = tables.roster.lock().len();

        StoreStats {
            records,
            alive: records.saturating_sub(tombstones),
            tombstones,
            authors: tables.by_author.len(),
            roster_len,
            compactions: self.compactions.load(Ordering::Relaxed),
        }
    }

    /// One idle-state check of the collector: compact only when the
    /// tombstone ratio exceeds the policy threshold.
    pub fn collect_garbage(&self) -> Result<Option<CompactionStats>> {
        self.ensure_available()?;

        let (tombstones, records) = {
            let tables = self.tables.read();
            let tombstones = tables.tombstones.lock().len();
            (tombstones, tables.quotes.len())
        };

        if self.policy.should_compact(tombstones, records) {
            self.compact().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Physically remove every tombstoned quote, blocking all other
    /// operations for the duration of the pass.
    ///
    /// An inconsistency found here poisons the store: every later call
    /// fails with [`Error::Unavailable`].
    #[instrument(skip(self))]
    pub fn compact(&self) -> Result<CompactionStats> {
        let started = Instant::now();
        let mut tables = self.tables.write();
        self.ensure_available()?;

        match tables.compact() {
            Ok(mut stats) => {
                stats.duration = started.elapsed();
                self.compactions.fetch_add(1, Ordering::Relaxed);
                info!(
                    reclaimed = stats.reclaimed,
                    surviving = stats.surviving,
                    authors_dropped = stats.authors_dropped,
                    duration_us = stats.duration.as_micros() as u64,
                    "Compaction complete"
                );
                Ok(stats)
            }
            Err(e) => {
                error!(error = %e, "Compaction failed, store stops serving");
                let _ = self.poison.set(e.to_string());
                Err(e)
            }
        }
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait]
impl QuoteEngine for MemoryStore {
    async fn insert(&self, quote: NewQuote) -> Result<QuoteId> {
        MemoryStore::insert(self, quote)
    }

    async fn list_all(&self) -> Result<Vec<Quote>> {
        MemoryStore::list_all(self)
    }

    async fn list_by_author(&self, author: &str) -> Result<Vec<Quote>> {
        MemoryStore::list_by_author(self, author)
    }

    async fn random(&self) -> Result<Quote> {
        MemoryStore::random(self)
    }

    async fn delete(&self, id: QuoteId) -> Result<()> {
        MemoryStore::delete(self, id)
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(MemoryStore::stats(self))
    }
}
