//! Storage engine trait

use super::quote::{NewQuote, Quote, QuoteId};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Point-in-time counters of a store's internal structures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Entries in the primary map, alive or tombstoned
    pub records: usize,
    pub alive: usize,
    pub tombstones: usize,
    /// Author buckets in the index
    pub authors: usize,
    pub roster_len: usize,
    /// Compaction passes completed since construction
    pub compactions: u64,
}

/// Storage engine trait
///
/// The fixed CRUD surface every quote backend offers to the service layer.
#[async_trait]
pub trait QuoteEngine: Send + Sync {
    /// Store a quote; fails with `Validation` on empty text
    async fn insert(&self, quote: NewQuote) -> Result<QuoteId>;

    /// Every alive quote
    async fn list_all(&self) -> Result<Vec<Quote>>;

    /// Alive quotes with exactly this author; empty for unknown authors
    async fn list_by_author(&self, author: &str) -> Result<Vec<Quote>>;

    /// One alive quote at random; fails with `EmptyStore` when none exist
    async fn random(&self) -> Result<Quote>;

    /// Remove a quote. Unknown ids succeed.
    async fn delete(&self, id: QuoteId) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Main storage interface
pub struct Storage {
    engine: Arc<dyn QuoteEngine>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish()
    }
}

impl Storage {
    pub fn new(engine: Arc<dyn QuoteEngine>) -> Self {
        Self { engine }
    }

    pub async fn insert(&self, quote: NewQuote) -> Result<QuoteId> {
        self.engine.insert(quote).await
    }

    pub async fn list_all(&self) -> Result<Vec<Quote>> {
        self.engine.list_all().await
    }

    pub async fn list_by_author(&self, author: &str) -> Result<Vec<Quote>> {
        self.engine.list_by_author(author).await
    }

    /// All quotes, or only those by `author` when one is given.
    /// An empty author string counts as no filter.
    pub async fn quotes(&self, author: Option<&str>) -> Result<Vec<Quote>> {
        match author {
            Some(author) if !author.is_empty() => self.list_by_author(author).await,
            _ => self.list_all().await,
        }
    }

    pub async fn random(&self) -> Result<Quote> {
        self.engine.random().await
    }

    pub async fn delete(&self, id: QuoteId) -> Result<()> {
        self.engine.delete(id).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.engine.stats().await
    }
}
