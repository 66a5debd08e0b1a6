//! Durable once-per-actor accounting.
//!
//! Counters like "how many distinct visitors opened this page" must survive
//! restarts and concurrent deliveries. `UniqueActionGuard` delegates
//! atomicity to the store's uniqueness constraint and never keeps an
//! incrementing counter of its own: the count is always recomputed from the
//! stored records, so it cannot drift from them.

use crate::application::ports::{StoreError, UniqueActionStore};
use crate::domain::record::{ActorId, RecordOutcome, SubjectId, UniqueActionRecord};
use std::future::Future;
use tracing::debug;

/// Records an action at most once per `(subject, actor)` pair.
///
/// # Example
/// ```
/// use escrow_gate::{InMemoryRecordStore, UniqueActionGuard};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), escrow_gate::StoreError> {
/// let guard = UniqueActionGuard::new(InMemoryRecordStore::new());
///
/// let first = guard.record_once("post-1".into(), 42_i64.into()).await?;
/// assert!(first.recorded);
/// assert_eq!(first.count, 1);
///
/// let again = guard.record_once("post-1".into(), 42_i64.into()).await?;
/// assert!(!again.recorded);
/// assert_eq!(again.count, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct UniqueActionGuard<S> {
    store: S,
}

impl<S> UniqueActionGuard<S>
where
    S: UniqueActionStore,
{
    /// Create a guard over a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record that `actor` acted on `subject`, once.
    ///
    /// A uniqueness conflict is not an error: it yields
    /// `recorded: false` with the current count.
    ///
    /// # Errors
    /// Any store failure other than a conflict is returned unchanged.
    pub async fn record_once(
        &self,
        subject: SubjectId,
        actor: ActorId,
    ) -> Result<RecordOutcome, StoreError> {
        let record = UniqueActionRecord::new(subject.clone(), actor);
        let actor = record.actor_id.clone();

        match self.store.insert(record).await {
            Ok(()) => {
                let count = self.store.count(&subject).await?;
                debug!(subject = %subject, actor = %actor, count, "first occurrence recorded");
                Ok(RecordOutcome::first(count))
            }
            Err(StoreError::Conflict) => {
                let count = self.store.count(&subject).await?;
                Ok(RecordOutcome::already_recorded(count))
            }
            Err(error) => Err(error),
        }
    }

    /// Like `record_once`, and runs `effect` with the new count only when
    /// this call created the record.
    ///
    /// # Errors
    /// Same as `record_once`. `effect` does not run on error.
    pub async fn record_once_then<F, Fut>(
        &self,
        subject: SubjectId,
        actor: ActorId,
        effect: F,
    ) -> Result<RecordOutcome, StoreError>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        let outcome = self.record_once(subject, actor).await?;
        if outcome.recorded {
            effect(outcome.count).await;
        }
        Ok(outcome)
    }

    /// Current number of distinct actors recorded for `subject`.
    ///
    /// # Errors
    /// Returns the store's error if the count cannot be read.
    pub async fn count(&self, subject: &SubjectId) -> Result<u64, StoreError> {
        self.store.count(subject).await
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::FailingStore;
    use crate::infrastructure::record_store::InMemoryRecordStore;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_then_already_recorded() {
        let guard = UniqueActionGuard::new(InMemoryRecordStore::new());

        let first = guard.record_once("S".into(), "A".into()).await.unwrap();
        assert_eq!(first, RecordOutcome::first(1));

        let second = guard.record_once("S".into(), "A".into()).await.unwrap();
        assert_eq!(second, RecordOutcome::already_recorded(1));
    }

    #[tokio::test]
    async fn test_count_reflects_distinct_actors() {
        let guard = UniqueActionGuard::new(InMemoryRecordStore::new());

        for actor in ["a", "b", "c", "a", "b"] {
            guard.record_once("page".into(), actor.into()).await.unwrap();
        }
        guard.record_once("other".into(), "a".into()).await.unwrap();

        assert_eq!(guard.count(&"page".into()).await.unwrap(), 3);
        assert_eq!(guard.count(&"other".into()).await.unwrap(), 1);
        assert_eq!(guard.count(&"never".into()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_effect_runs_only_first_time() {
        let guard = UniqueActionGuard::new(InMemoryRecordStore::new());
        let notified = Arc::new(AtomicU64::new(0));

        for _ in 0..3 {
            let notified = Arc::clone(&notified);
            guard
                .record_once_then("deal-9".into(), 7_i64.into(), |count| async move {
                    notified.store(count, Ordering::SeqCst);
                })
                .await
                .unwrap();
        }

        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_insert_failure_propagates() {
        let guard = UniqueActionGuard::new(FailingStore::new());

        let error = guard.record_once("S".into(), "A".into()).await.unwrap_err();
        assert!(!error.is_conflict());
        assert!(error.to_string().contains("record store unavailable"));
    }

    #[tokio::test]
    async fn test_count_failure_propagates() {
        let guard = UniqueActionGuard::new(FailingStore::failing_count());

        let error = guard.record_once("S".into(), "A".into()).await.unwrap_err();
        assert!(error.to_string().contains("timed out"));
        assert_eq!(guard.store().accepted_inserts(), 1);
    }

    #[tokio::test]
    async fn test_effect_skipped_on_error() {
        let guard = UniqueActionGuard::new(FailingStore::new());
        let ran = Arc::new(AtomicU64::new(0));
        let flag = Arc::clone(&ran);

        let result = guard
            .record_once_then("S".into(), "A".into(), |_| async move {
                flag.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert!(result.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
