pub mod sqlite;

use serde::Serialize;

use crate::app::StorageError;
use crate::domain::Item;

pub use sqlite::SqliteStore;

pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    UpdatedNoChange,
    Updated,
}

/// Keyed item storage. `link` is the only identity.
///
/// Implementations must commit durably before returning from `upsert`, and
/// must serialize writes to the same link.
pub trait Store: Send + Sync {
    fn upsert(&self, item: &Item) -> Result<UpsertOutcome, StorageError>;
    fn exists(&self, link: &str) -> Result<bool, StorageError>;
    fn get(&self, link: &str) -> Result<Option<Item>, StorageError>;
    /// Newest first by `published_at`; undated items last.
    fn list(&self, limit: usize, offset: usize) -> Result<Vec<Item>, StorageError>;
    fn count(&self) -> Result<u64, StorageError>;
}

/// Clamp a requested page size to `1..=MAX_LIST_LIMIT`.
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIST_LIMIT)
}
