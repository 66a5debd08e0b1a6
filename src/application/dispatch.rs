//! Entry point for interactive actions.
//!
//! Every inbound action goes through `ActionDispatcher::dispatch`. Duplicates
//! are acknowledged to the transport so the client stops retrying, but their
//! handler never runs.

use crate::application::dedup::ActionDeduplicator;
use crate::domain::action::InboundAction;
use std::future::Future;
use std::sync::Arc;

/// What `dispatch` did with an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched<T> {
    /// The handler ran and produced a value
    Executed(T),
    /// The action repeated one still inside its window; only acknowledged
    Duplicate,
}

impl<T> Dispatched<T> {
    /// Whether the handler ran.
    pub fn is_executed(&self) -> bool {
        matches!(self, Dispatched::Executed(_))
    }

    /// The handler's value, if it ran.
    pub fn into_executed(self) -> Option<T> {
        match self {
            Dispatched::Executed(value) => Some(value),
            Dispatched::Duplicate => None,
        }
    }
}

/// Routes inbound actions through a shared deduplicator.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    dedup: Arc<ActionDeduplicator>,
}

impl ActionDispatcher {
    /// Create a dispatcher over a deduplicator.
    pub fn new(dedup: Arc<ActionDeduplicator>) -> Self {
        Self { dedup }
    }

    /// Run `handler` for the first delivery of `action` in its window.
    ///
    /// For a duplicate, `acknowledge` is awaited instead and the handler is
    /// dropped unrun. On admission the handler is responsible for
    /// acknowledging the transport itself.
    pub async fn dispatch<A, AFut, H, HFut, T>(
        &self,
        action: &InboundAction,
        acknowledge: A,
        handler: H,
    ) -> Dispatched<T>
    where
        A: FnOnce() -> AFut,
        AFut: Future<Output = ()>,
        H: FnOnce() -> HFut,
        HFut: Future<Output = T>,
    {
        if self.dedup.admit(action.dedup_key()) {
            Dispatched::Executed(handler().await)
        } else {
            acknowledge().await;
            Dispatched::Duplicate
        }
    }

    /// Get a reference to the deduplicator.
    pub fn deduplicator(&self) -> &Arc<ActionDeduplicator> {
        &self.dedup
    }
}
