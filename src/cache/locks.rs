//! Key-scoped mutual exclusion.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

const STRIPES: usize = 64;

/// Fixed set of mutexes; each `(partition, id)` maps onto one stripe.
///
/// Two keys may share a stripe, which only costs contention.
pub struct KeyLocks {
  stripes: Vec<Mutex<()>>,
}

impl KeyLocks {
  pub fn new() -> Self {
    Self {
      stripes: (0..STRIPES).map(|_| Mutex::new(())).collect(),
    }
  }

  /// Hold the stripe for `(partition, id)` until the guard drops.
  pub fn lock(&self, partition: &str, id: &str) -> MutexGuard<'_, ()> {
    let stripe = &self.stripes[Self::stripe(partition, id)];
    // The guarded value is (), so a poisoned stripe carries no broken state.
    stripe.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn stripe(partition: &str, id: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    partition.hash(&mut hasher);
    id.hash(&mut hasher);
    (hasher.finish() as usize) % STRIPES
  }
}

impl Default for KeyLocks {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{mpsc, Arc};
  use std::thread;
  use std::time::Duration;

  #[test]
  fn test_same_key_same_stripe() {
    assert_eq!(KeyLocks::stripe("p", "1"), KeyLocks::stripe("p", "1"));
  }

  #[test]
  fn test_same_key_has_one_holder_at_a_time() {
    let locks = Arc::new(KeyLocks::new());
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
      .map(|_| {
        let locks = Arc::clone(&locks);
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        thread::spawn(move || {
          for _ in 0..10 {
            let _guard = locks.lock("p", "1");
            let holders = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_active.fetch_max(holders, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            active.fetch_sub(1, Ordering::SeqCst);
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_lock_waits_for_held_guard() {
    let locks = Arc::new(KeyLocks::new());
    let guard = locks.lock("p", "1");

    let (tx, rx) = mpsc::channel();
    let waiter = {
      let locks = Arc::clone(&locks);
      thread::spawn(move || {
        let _guard = locks.lock("p", "1");
        tx.send(()).unwrap();
      })
    };

    // Still blocked while the first guard lives
    assert_eq!(
      rx.recv_timeout(Duration::from_millis(100)),
      Err(mpsc::RecvTimeoutError::Timeout)
    );

    drop(guard);
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    waiter.join().unwrap();
  }
}
