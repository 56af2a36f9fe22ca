//! Shared registry of active subscriptions.
//!
//! The registry is an owned collection keyed by canonical name - at most
//! one subscription per (kind, threshold) exists at any time, and repeat
//! requests reuse the existing entry. A single mutex guards the collection;
//! critical sections are scans and element mutation only. Publishing
//! happens outside the lock, so the evaluation loop works in three steps:
//! collect firing decisions under the lock, publish unlocked, then re-enter
//! the lock to apply outcomes and evictions.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{canonical_name, Subscription, SubscriptionKind};
use crate::fix::Fix;
use crate::notify::NotificationHub;

/// Error type for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The threshold is not in the kind's fixed value set.
    #[error("unsupported {kind} value {value} (allowed: {allowed:?})")]
    InvalidThreshold {
        kind: SubscriptionKind,
        value: u32,
        allowed: &'static [u32],
    },
}

/// Summary of one registry entry, safe to hand out across the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    /// Canonical channel name.
    pub name: String,
    /// Condition family.
    pub kind: SubscriptionKind,
    /// Threshold value.
    pub threshold: u32,
    /// Exempt from idle eviction.
    pub protected: bool,
}

/// Ordered collection of active subscriptions.
///
/// Also owns the cached highest requested frequency, recomputed whenever
/// the set of frequency subscriptions changes. The evaluation loop reads
/// the cache on every pass to pick its cadence, so it is an atomic rather
/// than another trip through the mutex.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<Vec<Subscription>>,
    highest_frequency: AtomicU32,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription, or reuse the existing one with the same
    /// canonical name.
    ///
    /// Validates the threshold and creates the notification channel before
    /// taking the registry lock; only the lookup/insert happens under it.
    /// Returns the canonical channel name.
    pub fn add(
        &self,
        kind: SubscriptionKind,
        value: u32,
        protected: bool,
        hub: &dyn NotificationHub,
    ) -> Result<String, RegistryError> {
        if !kind.accepts(value) {
            return Err(RegistryError::InvalidThreshold {
                kind,
                value,
                allowed: kind.allowed_values(),
            });
        }

        let name = canonical_name(kind, value);
        hub.create_channel(&name);

        let mut entries = self.entries.lock().unwrap();
        if entries.iter().any(|s| s.name() == name) {
            debug!(channel = %name, "Reusing existing subscription");
            return Ok(name);
        }

        entries.push(Subscription::new(kind, value, protected));
        info!(channel = %name, "Registered subscription");

        if kind == SubscriptionKind::Frequency {
            self.recompute_highest_frequency(&entries);
        }
        Ok(name)
    }

    /// Look up a subscription by (kind, threshold).
    pub fn find(&self, kind: SubscriptionKind, value: u32) -> Option<SubscriptionInfo> {
        let name = canonical_name(kind, value);
        let entries = self.entries.lock().unwrap();
        entries.iter().find(|s| s.name() == name).map(|s| SubscriptionInfo {
            name: s.name().to_string(),
            kind: s.kind(),
            threshold: s.threshold(),
            protected: s.is_protected(),
        })
    }

    /// Remove a subscription by canonical name.
    ///
    /// Refuses to remove a protected entry. Returns whether an entry was
    /// removed.
    pub fn remove(&self, name: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let Some(index) = entries.iter().position(|s| s.name() == name) else {
            return false;
        };

        if entries[index].is_protected() {
            warn!(channel = name, "Refusing to remove protected subscription");
            return false;
        }

        let removed = entries.remove(index);
        info!(channel = name, "Removed subscription");
        if removed.kind() == SubscriptionKind::Frequency {
            self.recompute_highest_frequency(&entries);
        }
        true
    }

    /// Highest requested frequency in Hz across all frequency-kind
    /// subscriptions, 0 when there are none.
    pub fn highest_frequency(&self) -> u32 {
        self.highest_frequency.load(Ordering::Relaxed)
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate every entry against a fix and collect the channels that
    /// should be published to now.
    ///
    /// Outcome-independent trigger state advances here, under the lock;
    /// the caller publishes without the lock and then feeds the results to
    /// [`apply_outcomes`](Self::apply_outcomes).
    pub fn collect_firings(&self, fix: &Fix, now: Instant) -> Vec<String> {
        let mut entries = self.entries.lock().unwrap();
        entries
            .iter_mut()
            .filter_map(|s| s.should_fire(fix, now).then(|| s.name().to_string()))
            .collect()
    }

    /// Apply publish outcomes and evict entries that have been idle too
    /// long.
    ///
    /// Entries whose idle count reaches `idle_limit` are removed unless
    /// protected. Returns the canonical names of evicted entries so the
    /// caller can tear down their channels.
    pub fn apply_outcomes(
        &self,
        outcomes: &[(String, bool)],
        fix: &Fix,
        idle_limit: u32,
    ) -> Vec<String> {
        let mut entries = self.entries.lock().unwrap();

        for (name, delivered) in outcomes {
            if let Some(sub) = entries.iter_mut().find(|s| s.name() == *name) {
                sub.note_outcome(*delivered, fix);
            }
        }

        let mut evicted = Vec::new();
        entries.retain(|s| {
            if s.idle_count() >= idle_limit && !s.is_protected() {
                evicted.push(s.name().to_string());
                false
            } else {
                true
            }
        });

        if !evicted.is_empty() {
            self.recompute_highest_frequency(&entries);
        }
        evicted
    }

    fn recompute_highest_frequency(&self, entries: &[Subscription]) {
        let highest = entries
            .iter()
            .filter(|s| s.kind() == SubscriptionKind::Frequency)
            .map(Subscription::threshold)
            .max()
            .unwrap_or(0);
        self.highest_frequency.store(highest, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::FixMode;
    use crate::notify::BroadcastHub;

    fn fix_at(lat: f64, lon: f64) -> Fix {
        Fix {
            mode: FixMode::TwoDimensional,
            latitude: Some(lat),
            longitude: Some(lon),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_validates_threshold() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();

        let result = registry.add(SubscriptionKind::Frequency, 7, false, &hub);
        assert!(matches!(
            result,
            Err(RegistryError::InvalidThreshold { value: 7, .. })
        ));
        assert!(registry.is_empty());
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_add_creates_channel_and_entry() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();

        let name = registry
            .add(SubscriptionKind::Frequency, 10, false, &hub)
            .expect("10Hz is a supported value");

        assert_eq!(name, "frequency_10hz");
        assert_eq!(registry.len(), 1);
        assert_eq!(hub.channel_count(), 1);
        assert_eq!(registry.highest_frequency(), 10);
    }

    #[test]
    fn test_duplicate_add_reuses_entry() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();

        let first = registry
            .add(SubscriptionKind::Movement, 100, false, &hub)
            .unwrap();
        let second = registry
            .add(SubscriptionKind::Movement, 100, false, &hub)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(hub.channel_count(), 1);
    }

    #[test]
    fn test_every_supported_value_registers_once() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();
        let kinds = [
            SubscriptionKind::Frequency,
            SubscriptionKind::Movement,
            SubscriptionKind::MaxSpeed,
        ];

        let mut expected = 0;
        for kind in kinds {
            for &value in kind.allowed_values() {
                registry.add(kind, value, false, &hub).expect("supported value");
                registry.add(kind, value, false, &hub).expect("reuse");
                expected += 1;
                assert_eq!(registry.len(), expected);
            }
        }
    }

    #[test]
    fn test_find() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();

        registry.add(SubscriptionKind::MaxSpeed, 90, false, &hub).unwrap();

        let info = registry.find(SubscriptionKind::MaxSpeed, 90).expect("present");
        assert_eq!(info.name, "max_speed_90kmh");
        assert_eq!(info.threshold, 90);
        assert!(!info.protected);

        assert!(registry.find(SubscriptionKind::MaxSpeed, 110).is_none());
    }

    #[test]
    fn test_remove_refuses_protected() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();

        registry.add(SubscriptionKind::Frequency, 10, true, &hub).unwrap();

        assert!(!registry.remove("frequency_10hz"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_recomputes_highest_frequency() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();

        registry.add(SubscriptionKind::Frequency, 10, false, &hub).unwrap();
        registry.add(SubscriptionKind::Frequency, 50, false, &hub).unwrap();
        assert_eq!(registry.highest_frequency(), 50);

        assert!(registry.remove("frequency_50hz"));
        assert_eq!(registry.highest_frequency(), 10);

        assert!(registry.remove("frequency_10hz"));
        assert_eq!(registry.highest_frequency(), 0);
    }

    #[test]
    fn test_highest_frequency_ignores_other_kinds() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();

        assert_eq!(registry.highest_frequency(), 0);

        registry.add(SubscriptionKind::Movement, 1000, false, &hub).unwrap();
        registry.add(SubscriptionKind::MaxSpeed, 130, false, &hub).unwrap();

        assert_eq!(registry.highest_frequency(), 0);
    }

    #[test]
    fn test_collect_firings_and_apply_outcomes() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();
        let fix = fix_at(53.5, 10.0);

        registry.add(SubscriptionKind::Frequency, 1, false, &hub).unwrap();
        registry.add(SubscriptionKind::Movement, 100, false, &hub).unwrap();

        let firing = registry.collect_firings(&fix, Instant::now());
        assert_eq!(firing.len(), 2, "Both conditions fire on the first pass");

        // Both deliveries failed
        let outcomes: Vec<(String, bool)> =
            firing.into_iter().map(|name| (name, false)).collect();
        let evicted = registry.apply_outcomes(&outcomes, &fix, 5);
        assert!(evicted.is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_idle_eviction_after_limit() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();
        let fix = fix_at(53.5, 10.0);

        registry.add(SubscriptionKind::Frequency, 10, false, &hub).unwrap();

        let outcomes = vec![("frequency_10hz".to_string(), false)];
        for pass in 1..5 {
            let evicted = registry.apply_outcomes(&outcomes, &fix, 5);
            assert!(evicted.is_empty(), "Not yet evicted on pass {}", pass);
        }

        let evicted = registry.apply_outcomes(&outcomes, &fix, 5);
        assert_eq!(evicted, vec!["frequency_10hz".to_string()]);
        assert!(registry.is_empty());
        assert_eq!(registry.highest_frequency(), 0);
    }

    #[test]
    fn test_protected_subscription_survives_idle_limit() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();
        let fix = fix_at(53.5, 10.0);

        registry.add(SubscriptionKind::Frequency, 10, true, &hub).unwrap();

        let outcomes = vec![("frequency_10hz".to_string(), false)];
        for _ in 0..10 {
            let evicted = registry.apply_outcomes(&outcomes, &fix, 5);
            assert!(evicted.is_empty());
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_delivery_resets_idle_progress() {
        let registry = SubscriptionRegistry::new();
        let hub = BroadcastHub::new();
        let fix = fix_at(53.5, 10.0);

        registry.add(SubscriptionKind::Movement, 100, false, &hub).unwrap();

        let failed = vec![("movement_100m".to_string(), false)];
        let ok = vec![("movement_100m".to_string(), true)];

        for _ in 0..4 {
            registry.apply_outcomes(&failed, &fix, 5);
        }
        registry.apply_outcomes(&ok, &fix, 5);

        // Four more failures still should not reach the limit
        for _ in 0..4 {
            let evicted = registry.apply_outcomes(&failed, &fix, 5);
            assert!(evicted.is_empty());
        }
        assert_eq!(registry.len(), 1);
    }
}
