use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Transport failure while retrieving a source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("network error: {0}")]
    Network(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed feed: {0}")]
    MalformedFeed(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),
}

#[derive(Error, Debug)]
pub enum SecNewsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Feed parsing error: {0}")]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scheduler is not running")]
    SchedulerStopped,
}

pub type Result<T> = std::result::Result<T, SecNewsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_keeps_sub_second_precision() {
        assert_eq!(
            FetchError::Timeout(Duration::from_millis(200)).to_string(),
            "request timed out after 200ms"
        );
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(15)).to_string(),
            "request timed out after 15s"
        );
    }
}
