//! Read/write options carrying a device time-to-live.

use serde::{Deserialize, Serialize};

use super::error::CacheError;
use super::policy;

/// Never expire.
pub const INFINITE: i32 = -1;

/// Do not retain; the entry is stale as soon as it is written.
pub const NO_CACHE: i32 = 0;

/// Default time-to-live of one hour.
pub const DEFAULT_ONE_HOUR: i32 = 60 * 60;

/// Shared shape of [`ReadOptions`] and [`WriteOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct BaseOptions {
  device_time_to_live: i32,
}

impl BaseOptions {
  /// Validate and wrap a time-to-live in seconds.
  ///
  /// Anything below [`INFINITE`] is rejected here rather than at use.
  pub fn new(device_time_to_live: i32) -> Result<Self, CacheError> {
    if device_time_to_live < INFINITE {
      return Err(CacheError::InvalidTimeToLive(device_time_to_live));
    }
    Ok(Self {
      device_time_to_live,
    })
  }

  pub fn device_time_to_live(&self) -> i32 {
    self.device_time_to_live
  }

  /// Whether an entry stamped with `expires_at` is expired at `now`.
  pub fn is_expired(&self, expires_at: i64, now: i64) -> bool {
    policy::is_expired(expires_at, now)
  }

  /// Absolute expiration for an entry written at `now`.
  pub fn expires_at(&self, now: i64) -> i64 {
    policy::expiration_timestamp(now, self.device_time_to_live)
  }
}

impl Default for BaseOptions {
  fn default() -> Self {
    Self {
      device_time_to_live: DEFAULT_ONE_HOUR,
    }
  }
}

impl TryFrom<i32> for BaseOptions {
  type Error = CacheError;

  fn try_from(value: i32) -> Result<Self, Self::Error> {
    Self::new(value)
  }
}

impl From<BaseOptions> for i32 {
  fn from(options: BaseOptions) -> Self {
    options.device_time_to_live
  }
}

macro_rules! options_type {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct $name(BaseOptions);

    impl $name {
      /// Options with a time-to-live of `seconds`, or one of the sentinels.
      pub fn new(seconds: i32) -> Result<Self, CacheError> {
        BaseOptions::new(seconds).map(Self)
      }

      pub fn create_infinite_cache_option() -> Self {
        Self(BaseOptions {
          device_time_to_live: INFINITE,
        })
      }

      pub fn create_no_cache_option() -> Self {
        Self(BaseOptions {
          device_time_to_live: NO_CACHE,
        })
      }

      pub fn device_time_to_live(&self) -> i32 {
        self.0.device_time_to_live()
      }

      pub fn is_expired(&self, expires_at: i64, now: i64) -> bool {
        self.0.is_expired(expires_at, now)
      }

      pub fn expires_at(&self, now: i64) -> i64 {
        self.0.expires_at(now)
      }
    }

    impl From<BaseOptions> for $name {
      fn from(base: BaseOptions) -> Self {
        Self(base)
      }
    }
  };
}

options_type!(
  /// Options for [`LocalDocumentCache::read`](super::engine::LocalDocumentCache::read).
  ReadOptions
);

options_type!(
  /// Options for [`LocalDocumentCache::write`](super::engine::LocalDocumentCache::write).
  WriteOptions
);

/// The read-through refresh re-stamps an entry with the reader's TTL.
impl From<ReadOptions> for WriteOptions {
  fn from(options: ReadOptions) -> Self {
    Self(options.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sentinel_constructors() {
    assert_eq!(
      ReadOptions::create_infinite_cache_option().device_time_to_live(),
      INFINITE
    );
    assert_eq!(
      ReadOptions::create_no_cache_option().device_time_to_live(),
      NO_CACHE
    );
    assert_eq!(
      WriteOptions::create_infinite_cache_option().device_time_to_live(),
      INFINITE
    );
    assert_eq!(
      WriteOptions::create_no_cache_option().device_time_to_live(),
      NO_CACHE
    );
  }

  #[test]
  fn test_negative_ttl_rejected() {
    let err = ReadOptions::new(-100).unwrap_err();
    assert!(matches!(err, CacheError::InvalidTimeToLive(-100)));
    assert!(WriteOptions::new(-2).is_err());
  }

  #[test]
  fn test_sentinels_accepted_by_new() {
    assert_eq!(ReadOptions::new(-1).unwrap().device_time_to_live(), INFINITE);
    assert_eq!(ReadOptions::new(0).unwrap().device_time_to_live(), NO_CACHE);
  }

  #[test]
  fn test_default_is_one_hour() {
    assert_eq!(ReadOptions::default().device_time_to_live(), DEFAULT_ONE_HOUR);
    assert_eq!(WriteOptions::default().device_time_to_live(), DEFAULT_ONE_HOUR);
  }

  #[test]
  fn test_past_timestamp_is_expired() {
    let options = ReadOptions::new(1).unwrap();
    assert!(options.is_expired(-1, 0));
  }

  #[test]
  fn test_read_options_convert_to_write_options() {
    let read = ReadOptions::new(60).unwrap();
    let write = WriteOptions::from(read);
    assert_eq!(write.device_time_to_live(), 60);
  }

  #[test]
  fn test_deserialize_validates() {
    let ok: BaseOptions = serde_yaml::from_str("120").unwrap();
    assert_eq!(ok.device_time_to_live(), 120);
    assert!(serde_yaml::from_str::<BaseOptions>("-5").is_err());
  }
}
