//! Condition-keyed notification subscriptions.
//!
//! A subscription stands for one condition a client wants to be told
//! about: "every N Hz", "every N meters of movement", or "speed crossed
//! N km/h". Each condition maps to a canonical channel name that doubles
//! as the registry dedup key, so two clients asking for the same condition
//! share one subscription and one channel.
//!
//! # Components
//!
//! - [`SubscriptionKind`] - The three condition families and their fixed
//!   threshold sets
//! - [`Subscription`] - One standing condition with its trigger memory
//! - [`registry`] - `SubscriptionRegistry`, the shared ordered collection

pub mod registry;

pub use registry::{RegistryError, SubscriptionRegistry};

use std::time::{Duration, Instant};

use crate::fix::Fix;
use crate::geo::distance_meters;

/// Condition family of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Periodic notification at a fixed rate (threshold in Hz).
    Frequency,
    /// Notification after moving a given distance (threshold in meters).
    Movement,
    /// Notification on exceeding a speed limit (threshold in km/h).
    MaxSpeed,
}

impl SubscriptionKind {
    /// Threshold values accepted for this kind. Anything else is rejected.
    pub fn allowed_values(&self) -> &'static [u32] {
        match self {
            Self::Frequency => &[1, 10, 20, 50, 100],
            Self::Movement => &[1, 10, 100, 300, 500, 1000],
            Self::MaxSpeed => &[20, 30, 50, 90, 110, 130],
        }
    }

    /// Whether `value` is a member of this kind's fixed threshold set.
    pub fn accepts(&self, value: u32) -> bool {
        self.allowed_values().contains(&value)
    }

    /// Unit suffix used in canonical names.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Frequency => "hz",
            Self::Movement => "m",
            Self::MaxSpeed => "kmh",
        }
    }

    /// Token used in canonical names and request strings.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Frequency => "frequency",
            Self::Movement => "movement",
            Self::MaxSpeed => "max_speed",
        }
    }

    /// Parse a client-supplied condition kind.
    pub fn from_request(condition_kind: &str) -> Option<Self> {
        match condition_kind {
            "frequency" => Some(Self::Frequency),
            "movement" => Some(Self::Movement),
            "max_speed" => Some(Self::MaxSpeed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Deterministic channel name for a (kind, threshold) pair.
///
/// This is both the externally visible notification channel name and the
/// registry's dedup key.
///
/// # Example
///
/// ```
/// use gpslink::subscription::{canonical_name, SubscriptionKind};
///
/// assert_eq!(canonical_name(SubscriptionKind::Frequency, 10), "frequency_10hz");
/// assert_eq!(canonical_name(SubscriptionKind::Movement, 100), "movement_100m");
/// assert_eq!(canonical_name(SubscriptionKind::MaxSpeed, 90), "max_speed_90kmh");
/// ```
pub fn canonical_name(kind: SubscriptionKind, value: u32) -> String {
    format!("{}_{}{}", kind.token(), value, kind.unit())
}

/// Per-kind trigger memory.
///
/// Holds whatever the condition needs to detect its edge: the last send
/// time for periodic triggers, the reference point for movement triggers,
/// the last above/below state for speed triggers.
#[derive(Debug, Clone)]
enum TriggerState {
    Frequency { last_sent: Option<Instant> },
    Movement { reference: (f64, f64) },
    MaxSpeed { above: bool },
}

impl TriggerState {
    fn initial(kind: SubscriptionKind) -> Self {
        match kind {
            SubscriptionKind::Frequency => Self::Frequency { last_sent: None },
            SubscriptionKind::Movement => Self::Movement {
                reference: (0.0, 0.0),
            },
            SubscriptionKind::MaxSpeed => Self::MaxSpeed { above: false },
        }
    }
}

/// One standing condition-triggered subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    kind: SubscriptionKind,
    threshold: u32,
    name: String,
    protected: bool,
    idle_count: u32,
    trigger: TriggerState,
}

impl Subscription {
    /// Create a subscription. The threshold must already be validated
    /// against the kind's fixed set (the registry does this).
    pub(crate) fn new(kind: SubscriptionKind, threshold: u32, protected: bool) -> Self {
        Self {
            kind,
            threshold,
            name: canonical_name(kind, threshold),
            protected,
            idle_count: 0,
            trigger: TriggerState::initial(kind),
        }
    }

    /// Condition family.
    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    /// Threshold value (Hz, meters, or km/h by kind).
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Canonical channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this subscription is exempt from idle eviction.
    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// Consecutive delivery attempts that found no subscriber.
    pub fn idle_count(&self) -> u32 {
        self.idle_count
    }

    /// Evaluate the trigger predicate against a fix.
    ///
    /// Returns true when a notification should be published now. State
    /// updates that do not depend on the publish outcome happen here: the
    /// frequency timer resets on fire (even if the send later fails, so
    /// the rate never inflates), and the speed above/below flag updates on
    /// every evaluation.
    pub fn should_fire(&mut self, fix: &Fix, now: Instant) -> bool {
        match &mut self.trigger {
            TriggerState::Frequency { last_sent } => {
                let period = Duration::from_secs_f64(1.0 / f64::from(self.threshold));
                let due = match last_sent {
                    None => true,
                    Some(sent) => now.saturating_duration_since(*sent) >= period,
                };
                if due {
                    *last_sent = Some(now);
                }
                due
            }
            TriggerState::Movement { reference } => match fix.position() {
                Some(current) => {
                    distance_meters(*reference, current) > f64::from(self.threshold)
                }
                None => false,
            },
            TriggerState::MaxSpeed { above } => match fix.speed_kmh() {
                Some(kmh) => {
                    let was_above = *above;
                    *above = kmh > f64::from(self.threshold);
                    *above && !was_above
                }
                None => false,
            },
        }
    }

    /// Record the outcome of a publish that this subscription fired.
    ///
    /// An undelivered notification (no current subscriber) bumps the idle
    /// counter; a delivered one resets it. The movement reference point
    /// advances only on failed delivery - while someone is listening the
    /// distance keeps accumulating from the original reference, so the
    /// condition re-fires each pass until delivery fails.
    pub fn note_outcome(&mut self, delivered: bool, fix: &Fix) {
        if delivered {
            self.idle_count = 0;
            return;
        }

        self.idle_count += 1;
        if let TriggerState::Movement { reference } = &mut self.trigger {
            if let Some(current) = fix.position() {
                *reference = current;
            }
        }
    }
}
