//! Record store that fails on demand.

use crate::application::ports::{StoreError, UniqueActionStore};
use crate::domain::record::{SubjectId, UniqueActionRecord};
use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Store whose backend is "down": operations fail with `StoreError::Backend`.
///
/// Failures can be switched per operation so tests can check that the guard
/// propagates backend errors from both the insert and the count step.
#[derive(Debug, Default)]
pub struct FailingStore {
    fail_insert: AtomicBool,
    fail_count: AtomicBool,
    inserts: AtomicU64,
}

impl FailingStore {
    /// Store that fails every operation.
    pub fn new() -> Self {
        Self {
            fail_insert: AtomicBool::new(true),
            fail_count: AtomicBool::new(true),
            inserts: AtomicU64::new(0),
        }
    }

    /// Store whose inserts succeed but whose counts fail.
    pub fn failing_count() -> Self {
        let store = Self::new();
        store.fail_insert.store(false, Ordering::SeqCst);
        store
    }

    /// Number of inserts that were accepted.
    pub fn accepted_inserts(&self) -> u64 {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UniqueActionStore for FailingStore {
    async fn insert(&self, _record: UniqueActionRecord) -> Result<(), StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::backend(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "record store unavailable",
            )));
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn count(&self, _subject: &SubjectId) -> Result<u64, StoreError> {
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(StoreError::backend(io::Error::new(
                io::ErrorKind::TimedOut,
                "count query timed out",
            )));
        }
        Ok(self.inserts.load(Ordering::SeqCst))
    }
}
