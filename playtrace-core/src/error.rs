//! Error types for playtrace-core

use thiserror::Error;

/// Main error type for the playtrace-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Persistence layer rejected or failed a read/write
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Connection could not be acquired (poisoned lock)
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Malformed raw snapshot, rejected before normalization
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream playtime source error
    #[error("poller error: {0}")]
    Poller(String),
}

impl Error {
    /// True for faults of the persistence layer.
    ///
    /// Callers use this to tell "the store failed" apart from "the input was bad";
    /// neither is ever the same as an empty result.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::StorageUnavailable(_))
    }
}

/// Result type alias for playtrace-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_storage() {
        let err = Error::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.is_storage());
        assert!(Error::StorageUnavailable("poisoned".to_string()).is_storage());
        assert!(!Error::InvalidInput("missing player id".to_string()).is_storage());
    }
}
