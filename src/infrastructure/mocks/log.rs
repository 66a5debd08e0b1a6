//! Log capture layer for testing.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::field::{Field, Visit};
use tracing::Level;
use tracing_subscriber::Layer;

/// Layer that records every event emitted by the gates.
///
/// # Examples
///
/// ```ignore
/// use escrow_gate::infrastructure::mocks::CaptureLayer;
/// use tracing::debug;
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let capture = CaptureLayer::new();
/// let subscriber = tracing_subscriber::registry().with(capture.clone());
///
/// tracing::subscriber::with_default(subscriber, || {
///     debug!(key = "42:like:100", "duplicate action suppressed");
/// });
///
/// assert_eq!(capture.count(), 1);
/// assert_eq!(capture.events()[0].field("key"), Some("42:like:100"));
/// ```
#[derive(Clone, Default)]
pub struct CaptureLayer {
    captured: Arc<Mutex<Vec<CapturedEvent>>>,
}

/// Captured event information.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    /// Value of a structured field, if the event carried it.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

impl CaptureLayer {
    /// Create a new capture layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured events.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock().clone()
    }

    /// Get the count of captured events.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Captured events whose message contains `needle`.
    pub fn matching(&self, needle: &str) -> Vec<CapturedEvent> {
        self.lock()
            .iter()
            .filter(|event| event.message.contains(needle))
            .cloned()
            .collect()
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        self.captured
            .lock()
            .expect("CaptureLayer mutex poisoned - a test thread panicked while holding the lock")
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        self.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.insert(field.name().to_string(), rendered);
        }
    }
}
