//! Offline-first document cache.
//!
//! This module provides a local cache in front of a remote document store that:
//! - Upserts documents keyed by `(partition, id)` into a single SQLite table
//! - Expires entries by a per-call device time-to-live, with `INFINITE` and
//!   `NO_CACHE` sentinels
//! - Refreshes entries on every successful read (sliding expiration)
//! - Deletes expired entries when a read discovers them
//! - Tags every write with a pending operation for a later sync pass

mod document;
mod engine;
mod error;
mod locks;
mod options;
pub mod policy;
mod row;
mod storage;

pub use document::Document;
pub use engine::LocalDocumentCache;
pub use error::{CacheError, StorageError};
pub use options::{
  BaseOptions, ReadOptions, WriteOptions, DEFAULT_ONE_HOUR, INFINITE, NO_CACHE,
};
pub use policy::{Clock, ManualClock, SystemClock};
pub use row::{CacheRow, Column, PendingOperation, StoredRow, TABLE};
pub use storage::{DocumentStore, NoopStore, SqliteStore};
