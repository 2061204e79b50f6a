//! Time-based cache policy.
//!
//! All timestamps are epoch milliseconds.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

use super::options::{INFINITE, NO_CACHE};

/// Expiration timestamp used for entries that never expire.
pub const NEVER: i64 = i64::MAX;

/// Translate a time-to-live in seconds into an absolute expiration timestamp.
pub fn expiration_timestamp(now: i64, ttl_seconds: i32) -> i64 {
  match ttl_seconds {
    NO_CACHE => now,
    INFINITE => NEVER,
    ttl => now.saturating_add(i64::from(ttl).saturating_mul(1000)),
  }
}

/// An entry is expired strictly after its expiration timestamp.
pub fn is_expired(expires_at: i64, now: i64) -> bool {
  expires_at < now
}

/// Whether a stored entry must not be served at `now`.
///
/// Entries whose expiration does not lie past their download time were
/// written with [`NO_CACHE`] and are stale from the instant they land.
pub fn is_stale(expires_at: i64, downloaded_at: i64, now: i64) -> bool {
  is_expired(expires_at, now) || expires_at <= downloaded_at
}

/// Source of the current time.
pub trait Clock: Send + Sync {
  fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_millis(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
  now: AtomicI64,
}

impl ManualClock {
  pub fn new(now: i64) -> Self {
    Self {
      now: AtomicI64::new(now),
    }
  }

  pub fn set(&self, now: i64) {
    self.now.store(now, Ordering::SeqCst);
  }

  pub fn advance_secs(&self, seconds: i64) {
    self.now.fetch_add(seconds * 1000, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_millis(&self) -> i64 {
    self.now.load(Ordering::SeqCst)
  }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
  fn now_millis(&self) -> i64 {
    (**self).now_millis()
  }
}
