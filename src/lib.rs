//! Offline-first local document cache.
//!
//! [`LocalDocumentCache`] sits in front of a remote document store: it serves
//! reads from a local SQLite table while entries are fresh, re-stamps them on
//! every successful read, and marks each local write with a pending operation
//! that a sync layer later reconciles with the remote service.
//!
//! ```no_run
//! use doccache::{Document, LocalDocumentCache, ReadOptions, SqliteStore, WriteOptions};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = LocalDocumentCache::new(SqliteStore::open_default()?);
//! cache.write(&Document::new("hello".to_string(), "notes", "1"), WriteOptions::new(3600)?)?;
//!
//! let doc: Document<String> = cache.read("notes", "1", ReadOptions::new(3600)?);
//! assert!(doc.is_from_cache());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;

pub use cache::{
  CacheError, CacheRow, Document, DocumentStore, LocalDocumentCache, NoopStore, PendingOperation,
  ReadOptions, SqliteStore, StorageError, WriteOptions,
};
