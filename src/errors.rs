use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("{tier} tier is full: {detail}")]
    StorageFull { tier: &'static str, detail: String },

    #[error("slow tier unavailable: {0}")]
    SlowTierUnavailable(String),

    #[error("no tokio runtime available to drive the slow-tier writer")]
    NoRuntime,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl CacheError {
    /// Quota/capacity failures are recovered locally and never reach callers of `set`.
    #[must_use]
    pub fn is_storage_full(&self) -> bool {
        matches!(self, CacheError::StorageFull { .. })
    }
}
