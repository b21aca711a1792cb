//! Automation log — bounded, most-recent-first record of workflow runs.
//! Every change notifies subscribers with the full current list.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Default number of entries retained.
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Running,
    Success,
    Failed,
}

/// A stored log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub workflow: String,
    pub status: LogStatus,
    pub message: String,
    pub duration_ms: Option<u64>,
}

/// Caller-supplied fields; id and timestamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub workflow: String,
    pub status: LogStatus,
    pub message: String,
    pub duration_ms: Option<u64>,
}

impl NewLogEntry {
    pub fn new(workflow: impl Into<String>, status: LogStatus, message: impl Into<String>) -> Self {
        Self {
            workflow: workflow.into(),
            status,
            message: message.into(),
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

type Listener = Arc<dyn Fn(&[AutomationLogEntry]) + Send + Sync>;

struct LogInner {
    capacity: usize,
    entries: Mutex<VecDeque<AutomationLogEntry>>,
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_listener: AtomicU64,
}

impl LogInner {
    // Locks are released before callbacks run so a listener may read the log.
    fn notify(&self) {
        let snapshot: Vec<AutomationLogEntry> = self.entries.lock().iter().cloned().collect();
        let listeners: Vec<Listener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

/// Shared handle to the automation log. Clones refer to the same log.
#[derive(Clone)]
pub struct AutomationLog {
    inner: Arc<LogInner>,
}

impl Default for AutomationLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AutomationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(LogInner {
                capacity: capacity.max(1),
                entries: Mutex::new(VecDeque::with_capacity(capacity.max(1) + 1)),
                listeners: Mutex::new(BTreeMap::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Prepend an entry, dropping the oldest beyond capacity.
    pub fn add_log(&self, entry: NewLogEntry) -> AutomationLogEntry {
        let stored = AutomationLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            workflow: entry.workflow,
            status: entry.status,
            message: entry.message,
            duration_ms: entry.duration_ms,
        };
        {
            let mut entries = self.inner.entries.lock();
            entries.push_front(stored.clone());
            entries.truncate(self.inner.capacity);
        }
        debug!(workflow = %stored.workflow, status = ?stored.status, "automation log entry added");
        self.inner.notify();
        stored
    }

    /// Snapshot, most recent first.
    pub fn logs(&self) -> Vec<AutomationLogEntry> {
        self.inner.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn clear_logs(&self) {
        self.inner.entries.lock().clear();
        self.inner.notify();
    }

    /// Register a callback invoked with the full list after every change.
    /// The callback stays registered until the returned [`Subscription`]
    /// is dropped or unsubscribed.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[AutomationLogEntry]) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().insert(id, Arc::new(callback));
        Subscription {
            log: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

/// Disposer returned by [`AutomationLog::subscribe`].
pub struct Subscription {
    log: Weak<LogInner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(log) = self.log.upgrade() {
            log.listeners.lock().remove(&self.id);
        }
    }
}
