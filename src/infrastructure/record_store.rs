//! In-process record store.
//!
//! Holds records for the life of the process only. Useful for tests and for
//! single-instance deployments that rebuild counts on start.

use crate::application::ports::{StoreError, UniqueActionStore};
use crate::domain::record::{ActorId, SubjectId, UniqueActionRecord};
use ahash::{HashSet, RandomState};
use async_trait::async_trait;
use dashmap::DashMap;

/// Record store backed by a DashMap of per-subject actor sets.
///
/// Membership is checked and updated under the subject's shard lock, so
/// concurrent inserts of the same pair see exactly one success.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    subjects: DashMap<SubjectId, HashSet<ActorId>, RandomState>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            subjects: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Number of subjects with at least one record.
    pub fn subjects(&self) -> usize {
        self.subjects.len()
    }

    /// Whether `actor` is recorded for `subject`.
    pub fn contains(&self, subject: &SubjectId, actor: &ActorId) -> bool {
        self.subjects
            .get(subject)
            .is_some_and(|actors| actors.contains(actor))
    }
}

#[async_trait]
impl UniqueActionStore for InMemoryRecordStore {
    async fn insert(&self, record: UniqueActionRecord) -> Result<(), StoreError> {
        let mut actors = self.subjects.entry(record.subject_id).or_default();

        if actors.insert(record.actor_id) {
            Ok(())
        } else {
            Err(StoreError::Conflict)
        }
    }

    async fn count(&self, subject: &SubjectId) -> Result<u64, StoreError> {
        Ok(self
            .subjects
            .get(subject)
            .map_or(0, |actors| actors.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_pair_conflicts() {
        let store = InMemoryRecordStore::new();
        let record = UniqueActionRecord::new("S".into(), "A".into());

        store.insert(record.clone()).await.unwrap();
        let error = store.insert(record).await.unwrap_err();
        assert!(error.is_conflict());
        assert_eq!(store.count(&"S".into()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subjects_are_independent() {
        let store = InMemoryRecordStore::new();
        store
            .insert(UniqueActionRecord::new("S1".into(), "A".into()))
            .await
            .unwrap();
        store
            .insert(UniqueActionRecord::new("S2".into(), "A".into()))
            .await
            .unwrap();

        assert_eq!(store.subjects(), 2);
        assert!(store.contains(&"S1".into(), &"A".into()));
        assert!(!store.contains(&"S1".into(), &"B".into()));
    }
}
