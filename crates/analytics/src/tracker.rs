//! Session/event tracker — records content views, interactions and
//! personalization outcomes against the per-tab session, persists the
//! session after every mutation, and periodically hands the pending queue
//! to an [`EventSink`].
//!
//! All state sits behind one mutex; every `track_*` call is a short append.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use showcase_core::config::TrackerConfig;
use showcase_core::event_bus::{EventSink, SinkEvent};
use showcase_core::storage::KeyValueStore;
use showcase_core::types::{Session, SessionStats, TrackedEvent};

/// Element tag recorded for call-to-action clicks.
pub const CTA_ELEMENT: &str = "cta_button";
/// Element tag recorded for site searches.
pub const SEARCH_ELEMENT: &str = "search";

struct TrackerState {
    /// Created on first access.
    session: Option<Session>,
    queue: Vec<TrackedEvent>,
}

struct TrackerInner {
    state: Mutex<TrackerState>,
    store: Arc<dyn KeyValueStore>,
    sink: Arc<dyn EventSink>,
    session_key: String,
}

impl TrackerInner {
    fn restore_or_create(&self) -> Session {
        let restored = match self.store.get(&self.session_key) {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(
                        key = %self.session_key,
                        error = %e,
                        "stored session is corrupt, starting fresh"
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %self.session_key, error = %e, "failed to read stored session");
                None
            }
        };

        match restored {
            Some(session) => {
                info!(
                    session_id = %session.session_id,
                    events = session.events.len(),
                    "session restored"
                );
                session
            }
            None => {
                let session = Session::new(Utc::now());
                info!(session_id = %session.session_id, "session created");
                self.persist(&session);
                session
            }
        }
    }

    fn persist(&self, session: &Session) {
        let raw = match serde_json::to_string(session) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to serialize session");
                return;
            }
        };
        if let Err(e) = self.store.set(&self.session_key, &raw) {
            warn!(key = %self.session_key, error = %e, "failed to persist session");
        }
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut Session, &mut Vec<TrackedEvent>) -> R) -> R {
        let mut state = self.state.lock();
        let TrackerState { session, queue } = &mut *state;
        let session = session.get_or_insert_with(|| self.restore_or_create());
        f(session, queue)
    }

    fn record(&self, counts_as_view: bool, build: impl FnOnce(DateTime<Utc>) -> TrackedEvent) {
        self.with_session(|session, queue| {
            // Keep timestamps non-decreasing even if the wall clock steps back.
            let now = Utc::now();
            let timestamp = session.last_event_at().map_or(now, |last| last.max(now));
            let event = build(timestamp);

            if counts_as_view {
                session.page_views += 1;
            }
            debug!(
                session_id = %session.session_id,
                kind = event.kind(),
                total = session.events.len() + 1,
                "event tracked"
            );
            session.events.push(event.clone());
            queue.push(event);
            self.persist(session);
        });
        metrics::counter!("tracker.events").increment(1);
    }

    fn flush(&self) -> usize {
        // An empty queue never touches the session or the store.
        let (session_id, events) = {
            let mut state = self.state.lock();
            if state.queue.is_empty() {
                return 0;
            }
            let session_id = state
                .session
                .as_ref()
                .map(|s| s.session_id.clone())
                .unwrap_or_default();
            (session_id, std::mem::take(&mut state.queue))
        };

        let count = events.len();
        match self.sink.emit(SinkEvent::Batch {
            session_id: session_id.clone(),
            events,
        }) {
            Ok(()) => {
                metrics::counter!("tracker.flushed").increment(count as u64);
                debug!(session_id = %session_id, count, "event queue flushed");
            }
            Err(e) => {
                // Best-effort: the batch is dropped, not retried.
                metrics::counter!("tracker.flush_errors").increment(1);
                warn!(session_id = %session_id, count, error = %e, "failed to flush event queue");
            }
        }
        count
    }
}

/// Records session events and flushes them to a sink on an interval.
///
/// One instance per running application. Call [`SessionTracker::destroy`]
/// on teardown to stop the flush worker and deliver the remaining queue.
pub struct SessionTracker {
    inner: Arc<TrackerInner>,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl SessionTracker {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        sink: Arc<dyn EventSink>,
        session_key: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                state: Mutex::new(TrackerState {
                    session: None,
                    queue: Vec::new(),
                }),
                store,
                sink,
                session_key: session_key.into(),
            }),
            shutdown: CancellationToken::new(),
            worker: None,
        }
    }

    /// Build a tracker and start its flush worker from config.
    pub fn from_config(
        config: &TrackerConfig,
        store: Arc<dyn KeyValueStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let mut tracker = Self::new(store, sink, config.session_key.clone());
        tracker.start(Duration::from_secs(config.flush_interval_secs));
        tracker
    }

    /// Spawn the background flush worker. The first flush happens one
    /// `period` after this call. Must be called inside a tokio runtime.
    pub fn start(&mut self, period: Duration) {
        if self.worker.is_some() {
            warn!("flush worker already running");
            return;
        }
        let period = period.max(Duration::from_millis(1));
        let inner = Arc::clone(&self.inner);
        let shutdown = self.shutdown.clone();

        self.worker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        inner.flush();
                    }
                }
            }
            debug!("flush worker stopped");
        }));
        info!(period_ms = period.as_millis() as u64, "flush worker started");
    }

    pub fn track_content_view(
        &self,
        content_type: &str,
        entry_id: &str,
        title: &str,
        variant: Option<&str>,
    ) {
        self.inner.record(true, |timestamp| TrackedEvent::ContentView {
            content_type: content_type.to_string(),
            entry_id: entry_id.to_string(),
            title: title.to_string(),
            variant: variant.map(str::to_string),
            timestamp,
        });
    }

    pub fn track_interaction(
        &self,
        action: &str,
        element: &str,
        content_id: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) {
        self.inner.record(false, |timestamp| TrackedEvent::Interaction {
            action: action.to_string(),
            element: element.to_string(),
            content_id: content_id.map(str::to_string),
            metadata,
            timestamp,
        });
    }

    /// `converted = false` records an impression, `true` a conversion.
    pub fn track_personalization(&self, experience_id: &str, variant_id: &str, converted: bool) {
        self.inner.record(false, |timestamp| TrackedEvent::Personalization {
            experience_id: experience_id.to_string(),
            variant_id: variant_id.to_string(),
            converted,
            timestamp,
        });
    }

    pub fn track_cta_click(&self, cta_text: &str, destination: &str, content_id: Option<&str>) {
        let metadata = object(json!({ "text": cta_text, "destination": destination }));
        self.track_interaction("click", CTA_ELEMENT, content_id, metadata);
    }

    pub fn track_search(&self, query: &str, results_count: usize) {
        let metadata = object(json!({ "query": query, "results_count": results_count }));
        self.track_interaction("search", SEARCH_ELEMENT, None, metadata);
    }

    pub fn session_stats(&self) -> SessionStats {
        self.inner.with_session(|session, _| session.stats(Utc::now()))
    }

    /// Snapshot of the current session record.
    pub fn session(&self) -> Session {
        self.inner.with_session(|session, _| session.clone())
    }

    /// Events recorded since the last flush.
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Hand the pending queue to the sink now. Returns the number of events
    /// taken off the queue.
    pub fn flush(&self) -> usize {
        self.inner.flush()
    }

    /// Stop the flush worker and deliver whatever is still queued.
    pub async fn destroy(mut self) -> usize {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "flush worker ended abnormally");
            }
        }
        let flushed = self.inner.flush();
        info!(flushed, "session tracker destroyed");
        flushed
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
