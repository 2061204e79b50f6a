//! Document store trait and SQLite implementation.

use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::error::StorageError;
use super::row::{CacheRow, Column, PendingOperation, StoredRow, CACHE_SCHEMA, TABLE};

/// Trait for cache persistence backends.
///
/// Every method is blocking and may perform storage I/O.
pub trait DocumentStore: Send + Sync {
  /// Insert or replace the row keyed by `(partition, document_id)`.
  fn upsert(&self, row: &CacheRow) -> Result<(), StorageError>;

  /// Rows for a key, latest expiration first.
  fn query_by_key(&self, partition: &str, document_id: &str)
    -> Result<Vec<StoredRow>, StorageError>;

  /// Delete one row by its backend id. Returns the number of rows removed.
  fn delete_by_row_id(&self, row_id: i64) -> Result<usize, StorageError>;

  /// Delete rows where every `(column, value)` pair matches.
  fn delete_where(&self, predicate: &[(Column, &str)]) -> Result<usize, StorageError>;

  /// All rows of a partition, ordered by document id.
  fn scan_partition(&self, partition: &str) -> Result<Vec<CacheRow>, StorageError>;

  /// Rows carrying a pending-operation marker, oldest operation first.
  fn pending_rows(&self) -> Result<Vec<CacheRow>, StorageError>;

  /// Number of rows stored.
  fn len(&self) -> Result<usize, StorageError>;

  /// Remove every row.
  fn clear(&self) -> Result<(), StorageError>;
}

/// Store that doesn't cache anything.
/// Used when caching is disabled - writes are discarded and reads miss.
pub struct NoopStore;

impl DocumentStore for NoopStore {
  fn upsert(&self, _row: &CacheRow) -> Result<(), StorageError> {
    Ok(()) // Discard
  }

  fn query_by_key(
    &self,
    _partition: &str,
    _document_id: &str,
  ) -> Result<Vec<StoredRow>, StorageError> {
    Ok(Vec::new()) // Always miss
  }

  fn delete_by_row_id(&self, _row_id: i64) -> Result<usize, StorageError> {
    Ok(0)
  }

  fn delete_where(&self, _predicate: &[(Column, &str)]) -> Result<usize, StorageError> {
    Ok(0)
  }

  fn scan_partition(&self, _partition: &str) -> Result<Vec<CacheRow>, StorageError> {
    Ok(Vec::new())
  }

  fn pending_rows(&self) -> Result<Vec<CacheRow>, StorageError> {
    Ok(Vec::new())
  }

  fn len(&self) -> Result<usize, StorageError> {
    Ok(0)
  }

  fn clear(&self) -> Result<(), StorageError> {
    Ok(())
  }
}

/// SQLite-based document store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteStore")
      .field("conn", &"<sqlite>")
      .finish()
  }
}

impl SqliteStore {
  /// Open (or create) a store at the default location.
  pub fn open_default() -> Result<Self, StorageError> {
    Self::open(&Self::default_path()?)
  }

  /// Open (or create) a store at `path`.
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }

    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    tracing::debug!(path = %path.display(), "opened document cache");
    Self::with_connection(conn)
  }

  /// Store backed by a private in-memory database.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, StorageError> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf, StorageError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StorageError::NoDataDir)?;

    Ok(data_dir.join("doccache").join("documents.db"))
  }

  fn run_migrations(&self) -> Result<(), StorageError> {
    self.conn()?.execute_batch(CACHE_SCHEMA)?;
    Ok(())
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::LockPoisoned(e.to_string()))
  }
}

const SELECT_COLUMNS: &str = "rowid, partition, document_id, document, etag, expiration_time, \
   download_time, operation_time, pending_operation";

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
  let pending: Option<String> = row.get(8)?;
  let pending_operation = pending
    .map(|p| {
      p.parse::<PendingOperation>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
          8,
          rusqlite::types::Type::Text,
          e.into(),
        )
      })
    })
    .transpose()?;

  Ok(StoredRow {
    row_id: row.get(0)?,
    row: CacheRow {
      partition: row.get(1)?,
      document_id: row.get(2)?,
      document: row.get(3)?,
      etag: row.get(4)?,
      expiration_time: row.get(5)?,
      download_time: row.get(6)?,
      operation_time: row.get(7)?,
      pending_operation,
    },
  })
}

impl DocumentStore for SqliteStore {
  fn upsert(&self, row: &CacheRow) -> Result<(), StorageError> {
    let conn = self.conn()?;
    conn.execute(
      &format!(
        "INSERT OR REPLACE INTO {TABLE} (partition, document_id, document, etag, \
         expiration_time, download_time, operation_time, pending_operation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
      ),
      params![
        row.partition,
        row.document_id,
        row.document,
        row.etag,
        row.expiration_time,
        row.download_time,
        row.operation_time,
        row.pending_operation.map(PendingOperation::as_str),
      ],
    )?;
    Ok(())
  }

  fn query_by_key(
    &self,
    partition: &str,
    document_id: &str,
  ) -> Result<Vec<StoredRow>, StorageError> {
    let conn = self.conn()?;
    let mut stmt = conn.prepare(&format!(
      "SELECT {SELECT_COLUMNS} FROM {TABLE}
       WHERE partition = ?1 AND document_id = ?2
       ORDER BY expiration_time DESC"
    ))?;
    let rows = stmt
      .query_map(params![partition, document_id], read_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn delete_by_row_id(&self, row_id: i64) -> Result<usize, StorageError> {
    let conn = self.conn()?;
    let removed = conn.execute(
      &format!("DELETE FROM {TABLE} WHERE rowid = ?1"),
      params![row_id],
    )?;
    Ok(removed)
  }

  fn delete_where(&self, predicate: &[(Column, &str)]) -> Result<usize, StorageError> {
    // An empty predicate would match every row; use `clear` for that.
    if predicate.is_empty() {
      return Ok(0);
    }
    let clause = predicate
      .iter()
      .enumerate()
      .map(|(i, (column, _))| format!("{} = ?{}", column.name(), i + 1))
      .collect::<Vec<_>>()
      .join(" AND ");

    let conn = self.conn()?;
    let removed = conn.execute(
      &format!("DELETE FROM {TABLE} WHERE {clause}"),
      params_from_iter(predicate.iter().map(|(_, value)| *value)),
    )?;
    Ok(removed)
  }

  fn scan_partition(&self, partition: &str) -> Result<Vec<CacheRow>, StorageError> {
    let conn = self.conn()?;
    let mut stmt = conn.prepare(&format!(
      "SELECT {SELECT_COLUMNS} FROM {TABLE}
       WHERE partition = ?1
       ORDER BY document_id"
    ))?;
    let rows = stmt
      .query_map(params![partition], read_row)?
      .map(|r| r.map(|stored| stored.row))
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn pending_rows(&self) -> Result<Vec<CacheRow>, StorageError> {
    let conn = self.conn()?;
    let mut stmt = conn.prepare(&format!(
      "SELECT {SELECT_COLUMNS} FROM {TABLE}
       WHERE pending_operation IS NOT NULL
       ORDER BY operation_time, partition, document_id"
    ))?;
    let rows = stmt
      .query_map([], read_row)?
      .map(|r| r.map(|stored| stored.row))
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn len(&self) -> Result<usize, StorageError> {
    let conn = self.conn()?;
    let count: i64 =
      conn.query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))?;
    Ok(count as usize)
  }

  fn clear(&self) -> Result<(), StorageError> {
    self.conn()?.execute(&format!("DELETE FROM {TABLE}"), [])?;
    Ok(())
  }
}

impl<S: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<S> {
  fn upsert(&self, row: &CacheRow) -> Result<(), StorageError> {
    (**self).upsert(row)
  }

  fn query_by_key(
    &self,
    partition: &str,
    document_id: &str,
  ) -> Result<Vec<StoredRow>, StorageError> {
    (**self).query_by_key(partition, document_id)
  }

  fn delete_by_row_id(&self, row_id: i64) -> Result<usize, StorageError> {
    (**self).delete_by_row_id(row_id)
  }

  fn delete_where(&self, predicate: &[(Column, &str)]) -> Result<usize, StorageError> {
    (**self).delete_where(predicate)
  }

  fn scan_partition(&self, partition: &str) -> Result<Vec<CacheRow>, StorageError> {
    (**self).scan_partition(partition)
  }

  fn pending_rows(&self) -> Result<Vec<CacheRow>, StorageError> {
    (**self).pending_rows()
  }

  fn len(&self) -> Result<usize, StorageError> {
    (**self).len()
  }

  fn clear(&self) -> Result<(), StorageError> {
    (**self).clear()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::NamedTempFile;

  fn row(partition: &str, id: &str, document: &str, expiration_time: i64) -> CacheRow {
    CacheRow {
      partition: partition.to_string(),
      document_id: id.to_string(),
      document: document.to_string(),
      etag: None,
      expiration_time,
      download_time: 0,
      operation_time: 0,
      pending_operation: Some(PendingOperation::Create),
    }
  }

  #[test]
  fn test_upsert_replaces_existing_key() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.upsert(&row("p", "1", "first", 10)).unwrap();
    let mut second = row("p", "1", "second", 20);
    second.etag = Some("e2".to_string());
    store.upsert(&second).unwrap();

    assert_eq!(store.len().unwrap(), 1);
    let rows = store.query_by_key("p", "1").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row, second);
  }

  #[test]
  fn test_query_miss_returns_empty() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.query_by_key("p", "missing").unwrap().is_empty());
  }

  #[test]
  fn test_delete_by_row_id() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.upsert(&row("p", "1", "doc", 10)).unwrap();
    let row_id = store.query_by_key("p", "1").unwrap()[0].row_id;

    assert_eq!(store.delete_by_row_id(row_id).unwrap(), 1);
    assert_eq!(store.delete_by_row_id(row_id).unwrap(), 0);
    assert_eq!(store.len().unwrap(), 0);
  }

  #[test]
  fn test_delete_where_matches_all_pairs() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.upsert(&row("p", "1", "a", 10)).unwrap();
    store.upsert(&row("p", "2", "b", 10)).unwrap();
    store.upsert(&row("q", "1", "c", 10)).unwrap();

    let removed = store
      .delete_where(&[(Column::Partition, "p"), (Column::DocumentId, "1")])
      .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.len().unwrap(), 2);
    assert!(store.query_by_key("q", "1").unwrap().len() == 1);

    // Deleting an absent key is a no-op
    let removed = store
      .delete_where(&[(Column::Partition, "p"), (Column::DocumentId, "1")])
      .unwrap();
    assert_eq!(removed, 0);
  }

  #[test]
  fn test_empty_predicate_deletes_nothing() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.upsert(&row("p", "1", "a", 10)).unwrap();
    assert_eq!(store.delete_where(&[]).unwrap(), 0);
    assert_eq!(store.len().unwrap(), 1);
  }

  #[test]
  fn test_scan_partition_ordered_by_id() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.upsert(&row("p", "b", "2", 10)).unwrap();
    store.upsert(&row("p", "a", "1", 10)).unwrap();
    store.upsert(&row("other", "c", "3", 10)).unwrap();

    let ids: Vec<_> = store
      .scan_partition("p")
      .unwrap()
      .into_iter()
      .map(|r| r.document_id)
      .collect();
    assert_eq!(ids, vec!["a", "b"]);
  }

  #[test]
  fn test_pending_rows_skip_cleared_markers() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut synced = row("p", "1", "a", 10);
    synced.pending_operation = None;
    store.upsert(&synced).unwrap();
    let mut replaced = row("p", "2", "b", 10);
    replaced.pending_operation = Some(PendingOperation::Replace);
    replaced.operation_time = 5;
    store.upsert(&replaced).unwrap();

    let pending = store.pending_rows().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].pending_operation, Some(PendingOperation::Replace));
  }

  #[test]
  fn test_persists_across_reopen() {
    let file = NamedTempFile::new().unwrap();
    {
      let store = SqliteStore::open(file.path()).unwrap();
      store.upsert(&row("p", "1", "doc", 10)).unwrap();
    }
    let store = SqliteStore::open(file.path()).unwrap();
    assert_eq!(store.query_by_key("p", "1").unwrap()[0].row.document, "doc");
  }

  #[test]
  fn test_clear() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.upsert(&row("p", "1", "doc", 10)).unwrap();
    store.clear().unwrap();
    assert_eq!(store.len().unwrap(), 0);
  }

  #[test]
  fn test_noop_store_always_misses() {
    let store = NoopStore;
    store.upsert(&row("p", "1", "doc", 10)).unwrap();
    assert!(store.query_by_key("p", "1").unwrap().is_empty());
    assert_eq!(store.len().unwrap(), 0);
  }
}
