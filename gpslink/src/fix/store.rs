//! Shared latest-fix slot.
//!
//! One writer (the daemon poller), many readers (client queries and the
//! evaluation loop). Critical sections are a clone or an assignment; no
//! blocking call ever happens under the lock.

use std::sync::RwLock;

use super::Fix;

/// Thread-safe holder for the most recent fix.
///
/// The slot is overwritten wholesale on each daemon read. Readers get a
/// cloned snapshot, so a reader can never observe a half-written fix.
#[derive(Debug, Default)]
pub struct FixStore {
    inner: RwLock<Option<Fix>>,
}

impl FixStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored fix with a new sample.
    pub fn replace(&self, fix: Fix) {
        *self.inner.write().unwrap() = Some(fix);
    }

    /// Snapshot the stored fix, valid or not.
    pub fn snapshot(&self) -> Option<Fix> {
        self.inner.read().unwrap().clone()
    }

    /// Snapshot the stored fix only if it is publishable (2D or better).
    ///
    /// A fix below 2D is indistinguishable from no fix at all as far as
    /// clients are concerned.
    pub fn valid_snapshot(&self) -> Option<Fix> {
        self.inner.read().unwrap().as_ref().filter(|f| f.is_valid()).cloned()
    }

    /// Whether any sample has ever been stored.
    pub fn has_sample(&self) -> bool {
        self.inner.read().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::FixMode;

    fn fix_2d(lat: f64, lon: f64) -> Fix {
        Fix {
            mode: FixMode::TwoDimensional,
            latitude: Some(lat),
            longitude: Some(lon),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_store() {
        let store = FixStore::new();
        assert!(!store.has_sample());
        assert!(store.snapshot().is_none());
        assert!(store.valid_snapshot().is_none());
    }

    #[test]
    fn test_replace_and_snapshot() {
        let store = FixStore::new();
        store.replace(fix_2d(53.5, 10.0));

        let snap = store.valid_snapshot().expect("valid fix stored");
        assert_eq!(snap.position(), Some((53.5, 10.0)));
    }

    #[test]
    fn test_replace_is_wholesale() {
        let store = FixStore::new();

        let mut first = fix_2d(53.5, 10.0);
        first.speed = Some(12.0);
        store.replace(first);

        // Second sample without speed - the old speed must not survive
        store.replace(fix_2d(53.6, 10.1));

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.position(), Some((53.6, 10.1)));
        assert!(snap.speed.is_none());
    }

    #[test]
    fn test_invalid_fix_not_published() {
        let store = FixStore::new();
        store.replace(Fix::default());

        assert!(store.has_sample());
        assert!(store.snapshot().is_some());
        assert!(store.valid_snapshot().is_none());
    }
}
