//! The document envelope returned to callers.

use serde::{Deserialize, Serialize};

use super::error::CacheError;

/// A document identified by `(partition, id)`.
///
/// A document either holds a value or an error, never both.
#[derive(Debug)]
pub struct Document<T> {
  value: Option<T>,
  partition: String,
  id: String,
  etag: Option<String>,
  from_cache: bool,
  error: Option<CacheError>,
}

impl<T> Document<T> {
  pub fn new(value: T, partition: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      value: Some(value),
      partition: partition.into(),
      id: id.into(),
      etag: None,
      from_cache: false,
      error: None,
    }
  }

  /// A failed document for `(partition, id)`.
  pub fn failed(partition: impl Into<String>, id: impl Into<String>, error: CacheError) -> Self {
    Self {
      value: None,
      partition: partition.into(),
      id: id.into(),
      etag: None,
      from_cache: false,
      error: Some(error),
    }
  }

  pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
    self.etag = Some(etag.into());
    self
  }

  pub fn value(&self) -> Option<&T> {
    self.value.as_ref()
  }

  pub fn partition(&self) -> &str {
    &self.partition
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn etag(&self) -> Option<&str> {
    self.etag.as_deref()
  }

  pub fn is_from_cache(&self) -> bool {
    self.from_cache
  }

  pub(crate) fn set_from_cache(&mut self, from_cache: bool) {
    self.from_cache = from_cache;
  }

  pub fn error(&self) -> Option<&CacheError> {
    self.error.as_ref()
  }

  pub fn has_failed(&self) -> bool {
    self.error.is_some()
  }

  /// Split into a plain `Result`.
  pub fn into_result(self) -> Result<T, CacheError> {
    match (self.value, self.error) {
      (_, Some(error)) => Err(error),
      (Some(value), None) => Ok(value),
      (None, None) => Err(CacheError::FailedDocument),
    }
  }
}

/// On-disk form of a document: the payload together with its identity.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredDocument<T> {
  pub document: T,
  pub partition: String,
  pub id: String,
  pub etag: Option<String>,
}

impl<T> From<StoredDocument<T>> for Document<T> {
  fn from(stored: StoredDocument<T>) -> Self {
    Self {
      value: Some(stored.document),
      partition: stored.partition,
      id: stored.id,
      etag: stored.etag,
      from_cache: false,
      error: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_value_and_error_are_exclusive() {
    let ok = Document::new(7, "p", "1");
    assert_eq!(ok.value(), Some(&7));
    assert!(ok.error().is_none());
    assert!(!ok.has_failed());

    let failed: Document<i32> = Document::failed("p", "1", CacheError::Miss);
    assert!(failed.value().is_none());
    assert!(failed.has_failed());
    assert_eq!(failed.partition(), "p");
  }

  #[test]
  fn test_into_result() {
    let ok = Document::new("v".to_string(), "p", "1").with_etag("e1");
    assert_eq!(ok.etag(), Some("e1"));
    assert_eq!(ok.into_result().unwrap(), "v");

    let failed: Document<String> = Document::failed("p", "1", CacheError::Expired);
    assert!(matches!(failed.into_result(), Err(CacheError::Expired)));
  }
}
