//! Persisted cache rows and the fixed table schema.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::policy::NEVER;

/// Name of the single cache table.
pub const TABLE: &str = "cache";

/// Schema for the cache table.
pub(crate) const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache (
    partition TEXT NOT NULL,
    document_id TEXT NOT NULL,
    document TEXT NOT NULL,
    etag TEXT,
    expiration_time INTEGER NOT NULL,
    download_time INTEGER NOT NULL,
    operation_time INTEGER NOT NULL,
    pending_operation TEXT,
    PRIMARY KEY (partition, document_id)
);

CREATE INDEX IF NOT EXISTS idx_cache_pending
    ON cache(pending_operation);
"#;

/// Columns of the cache table, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
  Partition,
  DocumentId,
  Document,
  Etag,
  ExpirationTime,
  DownloadTime,
  OperationTime,
  PendingOperation,
}

impl Column {
  pub const ALL: [Column; 8] = [
    Column::Partition,
    Column::DocumentId,
    Column::Document,
    Column::Etag,
    Column::ExpirationTime,
    Column::DownloadTime,
    Column::OperationTime,
    Column::PendingOperation,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Self::Partition => "partition",
      Self::DocumentId => "document_id",
      Self::Document => "document",
      Self::Etag => "etag",
      Self::ExpirationTime => "expiration_time",
      Self::DownloadTime => "download_time",
      Self::OperationTime => "operation_time",
      Self::PendingOperation => "pending_operation",
    }
  }
}

/// Local mutation awaiting reconciliation with the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOperation {
  Create,
  Replace,
  Delete,
}

impl PendingOperation {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Create => "CREATE",
      Self::Replace => "REPLACE",
      Self::Delete => "DELETE",
    }
  }
}

impl fmt::Display for PendingOperation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PendingOperation {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "CREATE" => Ok(Self::Create),
      "REPLACE" => Ok(Self::Replace),
      "DELETE" => Ok(Self::Delete),
      other => Err(format!("unknown pending operation '{}'", other)),
    }
  }
}

/// One persisted cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRow {
  pub partition: String,
  pub document_id: String,
  /// Serialized document envelope
  pub document: String,
  pub etag: Option<String>,
  pub expiration_time: i64,
  /// When this row was last fetched or written
  pub download_time: i64,
  /// When the pending mutation was recorded
  pub operation_time: i64,
  pub pending_operation: Option<PendingOperation>,
}

impl CacheRow {
  /// Ordered `(label, value)` pairs for display.
  pub fn fields(&self) -> Vec<(&'static str, String)> {
    Column::ALL
      .iter()
      .map(|column| (column.name(), self.display_value(*column)))
      .collect()
  }

  fn display_value(&self, column: Column) -> String {
    match column {
      Column::Partition => self.partition.clone(),
      Column::DocumentId => self.document_id.clone(),
      Column::Document => self.document.clone(),
      Column::Etag => self.etag.clone().unwrap_or_default(),
      Column::ExpirationTime => format_millis(self.expiration_time),
      Column::DownloadTime => format_millis(self.download_time),
      Column::OperationTime => format_millis(self.operation_time),
      Column::PendingOperation => self
        .pending_operation
        .map(|op| op.to_string())
        .unwrap_or_default(),
    }
  }
}

/// A row together with its backend row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
  pub row_id: i64,
  pub row: CacheRow,
}

fn format_millis(millis: i64) -> String {
  if millis == NEVER {
    return "never".to_string();
  }
  DateTime::<Utc>::from_timestamp_millis(millis)
    .map(|dt| dt.to_rfc3339())
    .unwrap_or_else(|| millis.to_string())
}
