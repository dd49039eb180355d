//! Monotonic quote id generator

use super::quote::QuoteId;
use parking_lot::Mutex;

/// Hands out strictly increasing ids, starting at a configured value.
///
/// The lock is held only for the increment, so concurrent callers never
/// observe the same id.
#[derive(Debug)]
pub struct IdGenerator {
    next_id: Mutex<QuoteId>,
}

impl IdGenerator {
    pub fn new(start_id: QuoteId) -> Self {
        Self {
            next_id: Mutex::new(start_id),
        }
    }

    pub fn next(&self) -> QuoteId {
        let mut next_id = self.next_id.lock();
        let id = *next_id;
        *next_id += 1;
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}
