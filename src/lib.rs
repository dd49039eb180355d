// Quote Book - Rust Implementation
// A concurrent in-memory quote store with lazy deletion

#![warn(rust_2018_idioms)]

pub mod config;
pub mod metrics;
pub mod server;
pub mod storage;

// Re-exports for convenience
pub use config::AppConfig;
pub use storage::{MemoryStore, NewQuote, Quote, QuoteEngine, QuoteId, Storage, StoreConfig};

/// Quote Book error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Validation error: {0}")]
        Validation(String),

        #[error("Store is empty: no alive quotes")]
        EmptyStore,

        #[error("Corrupted store: {0}")]
        Corruption(String),

        #[error("Store unavailable: {0}")]
        Unavailable(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Internal error: {0}")]
        Internal(String),
    }

    impl From<::config::ConfigError> for Error {
        fn from(e: ::config::ConfigError) -> Self {
            Error::Config(e.to_string())
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
