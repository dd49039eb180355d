//! Quote records

use serde::{Deserialize, Serialize};

/// Store-assigned quote identifier
pub type QuoteId = u64;

/// A stored quote as handed out to callers
///
/// Always a copy; callers never hold references into store state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    pub author: String,
}

/// Payload for inserting a quote. The id is assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuote {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub author: String,
}

impl NewQuote {
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
        }
    }
}
