//! Local document cache that fronts a remote document store.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::document::{Document, StoredDocument};
use super::error::CacheError;
use super::locks::KeyLocks;
use super::options::{ReadOptions, WriteOptions};
use super::policy::{self, Clock, SystemClock};
use super::row::{CacheRow, Column, PendingOperation};
use super::storage::DocumentStore;

/// Read/write/delete front for cached documents.
///
/// Every write is an upsert on `(partition, id)` tagged with a pending
/// operation for the sync layer. Reads serve fresh rows, re-stamp their
/// expiration (sliding expiry), and eagerly delete rows found stale.
///
/// All operations block on storage I/O. Operations on the same key are
/// serialized so a read and its refresh cannot interleave with a write.
pub struct LocalDocumentCache<S: DocumentStore, C: Clock = SystemClock> {
  store: Arc<S>,
  clock: Arc<C>,
  locks: Arc<KeyLocks>,
}

impl<S: DocumentStore> LocalDocumentCache<S, SystemClock> {
  /// Create a cache over `store` using the wall clock.
  pub fn new(store: S) -> Self {
    Self::with_clock(store, SystemClock)
  }
}

impl<S: DocumentStore, C: Clock> LocalDocumentCache<S, C> {
  pub fn with_clock(store: S, clock: C) -> Self {
    Self {
      store: Arc::new(store),
      clock: Arc::new(clock),
      locks: Arc::new(KeyLocks::new()),
    }
  }

  /// The underlying store.
  pub fn store(&self) -> &S {
    &self.store
  }

  /// Cache `document`, recording a `CREATE` pending operation.
  pub fn write<T: Serialize>(
    &self,
    document: &Document<T>,
    options: WriteOptions,
  ) -> Result<(), CacheError> {
    self.write_with_operation(document, options, PendingOperation::Create)
  }

  /// Cache `document`, recording `operation` as the pending mutation.
  ///
  /// Any prior row for the key is replaced wholesale.
  pub fn write_with_operation<T: Serialize>(
    &self,
    document: &Document<T>,
    options: WriteOptions,
    operation: PendingOperation,
  ) -> Result<(), CacheError> {
    let _guard = self.locks.lock(document.partition(), document.id());
    self.write_row(document, options, operation, self.clock.now_millis())
  }

  /// Upsert `document` stamped at `now`. Callers hold the key's stripe.
  fn write_row<T: Serialize>(
    &self,
    document: &Document<T>,
    options: WriteOptions,
    operation: PendingOperation,
    now: i64,
  ) -> Result<(), CacheError> {
    let (partition, id) = (document.partition(), document.id());
    debug!(partition, id, %operation, "Trying to replace document in cache");

    let value = document.value().ok_or(CacheError::FailedDocument)?;
    let payload = serde_json::to_string(&StoredDocument {
      document: value,
      partition: partition.to_string(),
      id: id.to_string(),
      etag: document.etag().map(String::from),
    })
    .map_err(CacheError::Serialization)?;

    let row = CacheRow {
      partition: partition.to_string(),
      document_id: id.to_string(),
      document: payload,
      etag: document.etag().map(String::from),
      expiration_time: options.expires_at(now),
      download_time: now,
      operation_time: now,
      pending_operation: Some(operation),
    };

    self.store.upsert(&row).map_err(|e| {
      error!(partition, id, error = %e, "Failed to write to cache");
      CacheError::WriteFailure(e)
    })
  }

  /// Read `(partition, id)` from the cache.
  ///
  /// Never fails outright: a miss, an expired entry, a backend failure or
  /// an unreadable payload all come back as a failed [`Document`]. A fresh
  /// hit is written back with the reader's TTL, as if freshly written.
  pub fn read<T>(&self, partition: &str, id: &str, options: ReadOptions) -> Document<T>
  where
    T: Serialize + DeserializeOwned,
  {
    debug!(partition, id, "Trying to read document from cache");
    let _guard = self.locks.lock(partition, id);
    let now = self.clock.now_millis();

    let rows = match self.store.query_by_key(partition, id) {
      Ok(rows) => rows,
      Err(e) => {
        error!(partition, id, error = %e, "Failed to read from cache");
        return Document::failed(partition, id, CacheError::ReadFailure(e));
      }
    };

    // Upserts keep at most one row per key; the latest expiry wins otherwise.
    let Some(stored) = rows.into_iter().next() else {
      info!(partition, id, "Document was not found in the cache");
      return Document::failed(partition, id, CacheError::Miss);
    };
    let row = stored.row;

    if policy::is_stale(row.expiration_time, row.download_time, now) {
      if let Err(e) = self.store.delete_by_row_id(stored.row_id) {
        warn!(partition, id, error = %e, "Failed to invalidate expired document");
      }
      info!(partition, id, "Document was found in the cache, but it was expired. The cached document has been invalidated");
      return Document::failed(partition, id, CacheError::Expired);
    }

    let mut document: Document<T> =
      match serde_json::from_str::<StoredDocument<T>>(&row.document) {
        Ok(parsed) => parsed.into(),
        Err(e) => {
          error!(partition, id, error = %e, "Failed to deserialize cached document");
          return Document::failed(partition, id, CacheError::Deserialization(e));
        }
      };

    let refresh = self.write_row(
      &document,
      WriteOptions::from(options),
      PendingOperation::Create,
      now,
    );
    if let Err(e) = refresh {
      warn!(partition, id, error = %e, "Failed to refresh cached document");
    }
    document.set_from_cache(true);
    document
  }

  /// Remove `(partition, id)` from the cache.
  ///
  /// Best effort: backend failures are logged, and removing an absent key
  /// is not an error.
  pub fn delete(&self, partition: &str, id: &str) {
    debug!(partition, id, "Trying to delete document from cache");
    let _guard = self.locks.lock(partition, id);
    match self
      .store
      .delete_where(&[(Column::Partition, partition), (Column::DocumentId, id)])
    {
      Ok(removed) => debug!(partition, id, removed, "Deleted document from cache"),
      Err(e) => error!(partition, id, error = %e, "Failed to delete from cache"),
    }
  }

  /// The raw row for `(partition, id)`, without any expiry handling.
  pub fn inspect(&self, partition: &str, id: &str) -> Result<Option<CacheRow>, CacheError> {
    let rows = self
      .store
      .query_by_key(partition, id)
      .map_err(CacheError::ReadFailure)?;
    Ok(rows.into_iter().next().map(|stored| stored.row))
  }

  /// Every row cached for `partition`.
  pub fn list(&self, partition: &str) -> Result<Vec<CacheRow>, CacheError> {
    self
      .store
      .scan_partition(partition)
      .map_err(CacheError::ReadFailure)
  }

  /// Rows whose local mutation has not been confirmed remotely yet.
  pub fn pending(&self) -> Result<Vec<CacheRow>, CacheError> {
    self.store.pending_rows().map_err(CacheError::ReadFailure)
  }
}

impl<S: DocumentStore, C: Clock> Clone for LocalDocumentCache<S, C> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      clock: Arc::clone(&self.clock),
      locks: Arc::clone(&self.locks),
    }
  }
}
