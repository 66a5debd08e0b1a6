//! Inbound actions and the keys used to deduplicate them.
//!
//! A logical user action is identified by:
//! - the actor (who pressed the control)
//! - the action identifier or payload (which control)
//! - the originating context (which message or screen instance)
//!
//! Two presses of the same control on different contexts are independent
//! actions. Two presses on the same context collapse into one.

use std::borrow::Borrow;
use std::fmt;
use std::time::{Duration, Instant};

/// Identifier of a logical user action for suppression purposes.
///
/// Rendered as `actor:action:context`.
///
/// # Example
/// ```
/// use escrow_gate::DedupKey;
///
/// let key = DedupKey::new(42, "like", 100);
/// assert_eq!(key.as_str(), "42:like:100");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey(String);

impl DedupKey {
    /// Derive a key from actor, action and originating context.
    pub fn new(
        actor: impl fmt::Display,
        action: impl fmt::Display,
        context: impl fmt::Display,
    ) -> Self {
        DedupKey(format!("{}:{}:{}", actor, action, context))
    }

    /// Use an already derived string as the key.
    pub fn raw(key: impl Into<String>) -> Self {
        DedupKey(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DedupKey {
    fn from(key: &str) -> Self {
        DedupKey::raw(key)
    }
}

impl From<String> for DedupKey {
    fn from(key: String) -> Self {
        DedupKey(key)
    }
}

impl Borrow<str> for DedupKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// An interactive action delivered by the bot transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundAction {
    /// Who triggered the action
    pub actor_id: i64,
    /// Control identifier or callback payload
    pub action: String,
    /// Source message or screen instance the control belongs to
    pub context_id: i64,
}

impl InboundAction {
    /// Create an inbound action.
    pub fn new(actor_id: i64, action: impl Into<String>, context_id: i64) -> Self {
        Self {
            actor_id,
            action: action.into(),
            context_id,
        }
    }

    /// Key under which repeats of this action are suppressed.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.actor_id, &self.action, self.context_id)
    }
}

/// Admission record for a dedup key.
///
/// The entry suppresses repeats only while `now - inserted_at < ttl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupEntry {
    /// When the key was admitted
    pub inserted_at: Instant,
}

impl DedupEntry {
    /// Create an entry admitted at `now`.
    pub fn new(now: Instant) -> Self {
        Self { inserted_at: now }
    }

    /// Whether the entry still suppresses repeats at `now`.
    ///
    /// An instant earlier than `inserted_at` counts as zero elapsed time.
    pub fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_actions_produce_same_key() {
        let a = InboundAction::new(42, "confirm_deal", 7001);
        let b = InboundAction::new(42, "confirm_deal", 7001);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_different_context_produces_different_key() {
        let a = InboundAction::new(42, "confirm_deal", 7001);
        let b = InboundAction::new(42, "confirm_deal", 7002);
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_different_actor_produces_different_key() {
        let a = InboundAction::new(42, "like", 100);
        let b = InboundAction::new(43, "like", 100);
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_key_format() {
        let action = InboundAction::new(42, "like", 100);
        assert_eq!(action.dedup_key().to_string(), "42:like:100");
        assert_eq!(action.dedup_key(), DedupKey::from("42:like:100"));
    }

    #[test]
    fn test_entry_liveness_boundary() {
        let start = Instant::now();
        let ttl = Duration::from_millis(3_000);
        let entry = DedupEntry::new(start);

        assert!(entry.is_live(start, ttl));
        assert!(entry.is_live(start + Duration::from_millis(2_999), ttl));
        assert!(!entry.is_live(start + ttl, ttl));
    }

    #[test]
    fn test_entry_live_under_clock_regression() {
        let start = Instant::now() + Duration::from_secs(60);
        let entry = DedupEntry::new(start);
        assert!(entry.is_live(start - Duration::from_secs(30), Duration::from_secs(1)));
    }

    #[test]
    fn test_raw_key_borrows_as_str() {
        let key = DedupKey::raw(String::from("custom"));
        let borrowed: &str = key.borrow();
        assert_eq!(borrowed, "custom");
    }
}
