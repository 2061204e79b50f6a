//! Error types for the document cache.

use thiserror::Error;

/// Failures raised by a [`DocumentStore`](super::storage::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("lock poisoned: {0}")]
  LockPoisoned(String),

  #[error("failed to prepare cache location: {0}")]
  Io(#[from] std::io::Error),

  #[error("could not determine data directory")]
  NoDataDir,
}

/// Failures surfaced by the document cache.
///
/// Read-path variants are carried inside a failed
/// [`Document`](super::document::Document) rather than returned as `Err`.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("Failed to read from cache.")]
  ReadFailure(#[source] StorageError),

  #[error("Document was not found in the cache.")]
  Miss,

  #[error("Document was found in the cache, but it was expired. The cached document has been invalidated.")]
  Expired,

  #[error("Failed to deserialize cached document.")]
  Deserialization(#[source] serde_json::Error),

  #[error("Failed to serialize document.")]
  Serialization(#[source] serde_json::Error),

  #[error("Failed to write to cache.")]
  WriteFailure(#[source] StorageError),

  #[error("A failed document carries no value and cannot be cached.")]
  FailedDocument,

  #[error("Invalid device time-to-live: {0}")]
  InvalidTimeToLive(i32),
}

impl CacheError {
  /// True for the outcomes where the cache simply had nothing usable.
  pub fn is_miss(&self) -> bool {
    matches!(self, Self::Miss | Self::Expired)
  }
}
