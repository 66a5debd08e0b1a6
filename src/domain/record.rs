//! Once-per-actor records.
//!
//! A record says "this actor has already been counted for this subject".
//! The store enforces at most one record per `(subject, actor)` pair, and a
//! subject's count is the number of records that reference it.

use std::fmt;
use std::time::SystemTime;

/// Identifier of the counted thing (a blog post, a partner page, a deal).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(String);

impl SubjectId {
    /// Create a subject identifier.
    pub fn new(id: impl Into<String>) -> Self {
        SubjectId(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        SubjectId::new(id)
    }
}

impl From<u64> for SubjectId {
    fn from(id: u64) -> Self {
        SubjectId(id.to_string())
    }
}

/// Identifier of the counted visitor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(String);

impl ActorId {
    /// Create an actor identifier.
    pub fn new(id: impl Into<String>) -> Self {
        ActorId(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        ActorId::new(id)
    }
}

impl From<i64> for ActorId {
    fn from(id: i64) -> Self {
        ActorId(id.to_string())
    }
}

/// A persisted "counted once" marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueActionRecord {
    /// What was counted
    pub subject_id: SubjectId,
    /// Who was counted
    pub actor_id: ActorId,
    /// Wall-clock time of the first occurrence
    pub recorded_at: SystemTime,
}

impl UniqueActionRecord {
    /// Create a record stamped with the current wall-clock time.
    pub fn new(subject_id: SubjectId, actor_id: ActorId) -> Self {
        Self {
            subject_id,
            actor_id,
            recorded_at: SystemTime::now(),
        }
    }
}

/// Result of a once-per-actor recording attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// True if this call created the record
    pub recorded: bool,
    /// Number of records for the subject after the attempt
    pub count: u64,
}

impl RecordOutcome {
    /// Outcome of a first-time record.
    pub fn first(count: u64) -> Self {
        Self {
            recorded: true,
            count,
        }
    }

    /// Outcome when the pair was already recorded.
    pub fn already_recorded(count: u64) -> Self {
        Self {
            recorded: false,
            count,
        }
    }
}
