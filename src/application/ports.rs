//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::record::{SubjectId, UniqueActionRecord};
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Instant;

/// Port for obtaining current time.
///
/// Implementations must be monotonic. The limiter and the deduplicator read
/// time only through this trait, so tests can substitute a controllable clock.
/// Infrastructure provides `SystemClock`, `TokioClock` and `MockClock`.
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Error reported by a `UniqueActionStore`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The `(subject, actor)` pair is already recorded.
    ///
    /// This is the expected outcome of a repeat and is never surfaced to
    /// callers of `UniqueActionGuard::record_once`.
    #[error("record already exists for this subject and actor")]
    Conflict,
    /// Any other failure of the storage backend.
    #[error("record store backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap a backend error.
    pub fn backend(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(error))
    }

    /// Check whether this is a uniqueness conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict)
    }
}

/// Port for durable once-per-actor records.
///
/// The store, not the caller, is responsible for atomicity: `insert` must
/// fail with `StoreError::Conflict` for every attempt after the first one
/// for the same pair, including concurrent attempts and attempts made after
/// a process restart.
#[async_trait]
pub trait UniqueActionStore: Send + Sync + Debug {
    /// Persist a record, failing with `Conflict` if the pair already exists.
    async fn insert(&self, record: UniqueActionRecord) -> Result<(), StoreError>;

    /// Count the records that reference a subject.
    async fn count(&self, subject: &SubjectId) -> Result<u64, StoreError>;
}

#[async_trait]
impl<T> UniqueActionStore for std::sync::Arc<T>
where
    T: UniqueActionStore + ?Sized,
{
    async fn insert(&self, record: UniqueActionRecord) -> Result<(), StoreError> {
        (**self).insert(record).await
    }

    async fn count(&self, subject: &SubjectId) -> Result<u64, StoreError> {
        (**self).count(subject).await
    }
}
