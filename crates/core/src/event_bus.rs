//! Unified event bus — trait for handing analytics events to an external sink.
//!
//! The tracker flushes batches through an `Arc<dyn EventSink>`; the
//! personalization resolver emits custom notifications through the same
//! trait. Sinks are best-effort: callers log failures and move on.

use crate::error::{ShowcaseError, ShowcaseResult};
use crate::types::TrackedEvent;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Everything a sink can receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkEvent {
    /// Tracker flush of the pending queue.
    Batch {
        session_id: String,
        events: Vec<TrackedEvent>,
    },
    /// Fire-and-forget notification, e.g. a personalization goal.
    Custom {
        name: String,
        data: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    },
}

/// Trait for emitting analytics events to an external collaborator.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SinkEvent) -> ShowcaseResult<()>;
}

/// No-op sink for tests and modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: SinkEvent) -> ShowcaseResult<()> {
        Ok(())
    }
}

/// Sink that only logs what it receives.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SinkEvent) -> ShowcaseResult<()> {
        match &event {
            SinkEvent::Batch { session_id, events } => {
                info!(session_id = %session_id, count = events.len(), "analytics batch");
            }
            SinkEvent::Custom { name, .. } => {
                info!(name = %name, "analytics custom event");
            }
        }
        Ok(())
    }
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<SinkEvent>>,
    fail: Mutex<bool>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Total tracked events across all captured batches.
    pub fn batched_event_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .map(|e| match e {
                SinkEvent::Batch { events, .. } => events.len(),
                SinkEvent::Custom { .. } => 0,
            })
            .sum()
    }

    /// Names of captured custom events, in emission order.
    pub fn custom_names(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Custom { name, .. } => Some(name.clone()),
                SinkEvent::Batch { .. } => None,
            })
            .collect()
    }

    /// Make subsequent `emit` calls fail without capturing.
    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock() = failing;
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: SinkEvent) -> ShowcaseResult<()> {
        if *self.fail.lock() {
            return Err(ShowcaseError::Sink("capture sink set to fail".into()));
        }
        self.events.lock().push(event);
        Ok(())
    }
}

/// Convenience: create a no-op event bus for modules that don't need it.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
