//! Application context — one instance of every store, constructed once and
//! passed by reference to whatever drives the page.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use showcase_analytics::SessionTracker;
use showcase_automation::{AutomationLog, Workflow, WorkflowOutcome, WorkflowRunner};
use showcase_core::config::AppConfig;
use showcase_core::event_bus::EventSink;
use showcase_core::storage::{FileStore, KeyValueStore, MemoryStore};
use showcase_core::types::SessionStats;
use showcase_delivery::{fetch, DeliveryClient, Entry};
use showcase_personalization::{AttributeDetector, ClientEnvironment, PersonalizationResolver};

/// Inputs for one simulated page visit.
#[derive(Debug, Clone)]
pub struct Visit {
    pub content_type: String,
    pub experience: String,
    pub environment: ClientEnvironment,
    pub workflow: Workflow,
}

/// What a visit did, printed by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct VisitReport {
    pub variant: String,
    pub entries_loaded: usize,
    pub fetch_error: Option<String>,
    pub workflow: String,
    pub automation_log_len: usize,
    pub stats: SessionStats,
}

pub struct Showcase {
    pub tracker: SessionTracker,
    pub resolver: PersonalizationResolver,
    pub detector: AttributeDetector,
    pub automation_log: AutomationLog,
    pub delivery: Arc<DeliveryClient>,
    pub shutdown: CancellationToken,
}

impl Showcase {
    /// Wire every store from config. Starts the tracker's flush worker, so
    /// this must run inside a tokio runtime.
    pub fn build(config: &AppConfig, sink: Arc<dyn EventSink>) -> anyhow::Result<Self> {
        let (tab_store, browser_store) = open_stores(config.storage.dir.as_deref())?;

        let tracker = SessionTracker::from_config(&config.tracker, tab_store, sink.clone());
        let resolver =
            PersonalizationResolver::from_config(&config.personalization).with_event_sink(sink);
        let detector = AttributeDetector::from_config(&config.visitor, browser_store);
        let automation_log = AutomationLog::new(config.automation.log_capacity);
        let delivery = Arc::new(DeliveryClient::new(config.delivery.clone()));

        info!(
            environment = %config.delivery.environment,
            personalization = resolver.is_initialized(),
            "showcase assembled"
        );

        Ok(Self {
            tracker,
            resolver,
            detector,
            automation_log,
            delivery,
            shutdown: CancellationToken::new(),
        })
    }

    pub async fn run_visit(&self, visit: &Visit) -> VisitReport {
        let attributes = self.detector.detect(&visit.environment);
        self.resolver.set_user_attributes(attributes);

        let variant = self.resolver.get_variant(&visit.experience);
        self.tracker.track_personalization(&visit.experience, &variant, false);

        let hook = fetch::entries::<Entry>(
            Arc::clone(&self.delivery),
            visit.content_type.as_str(),
            &self.shutdown,
        );
        let state = hook.settled().await;
        if let Some(error) = &state.error {
            warn!(content_type = %visit.content_type, error = %error, "content unavailable");
        }
        for entry in &state.data {
            self.tracker
                .track_content_view(&visit.content_type, &entry.uid, &entry.title, Some(&variant));
        }

        self.tracker.track_cta_click("Request a demo", "/demo", None);
        self.tracker.track_personalization(&visit.experience, &variant, true);
        self.resolver.trigger_event(
            "demo_requested",
            Some(json!({ "experience": visit.experience, "variant": variant })),
        );

        let runner = WorkflowRunner::new(self.automation_log.clone());
        let outcome = runner.run(&visit.workflow, &self.shutdown.child_token()).await;

        VisitReport {
            variant,
            entries_loaded: state.data.len(),
            fetch_error: state.error,
            workflow: describe(&outcome),
            automation_log_len: self.automation_log.len(),
            stats: self.tracker.session_stats(),
        }
    }

    /// Cancel outstanding work and tear down the tracker.
    pub async fn shutdown(self) -> usize {
        self.shutdown.cancel();
        self.tracker.destroy().await
    }
}

type Stores = (Arc<dyn KeyValueStore>, Arc<dyn KeyValueStore>);

fn open_stores(dir: Option<&str>) -> anyhow::Result<Stores> {
    match dir {
        Some(dir) => {
            let root = Path::new(dir);
            let tab = FileStore::open(root.join("tab"))
                .with_context(|| format!("opening tab storage under {dir}"))?;
            let browser = FileStore::open(root.join("browser"))
                .with_context(|| format!("opening browser storage under {dir}"))?;
            Ok((Arc::new(tab), Arc::new(browser)))
        }
        None => Ok((Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))),
    }
}

fn describe(outcome: &WorkflowOutcome) -> String {
    match outcome {
        WorkflowOutcome::Completed { steps, duration_ms } => {
            format!("completed {steps} step(s) in {duration_ms}ms")
        }
        WorkflowOutcome::Failed { step, .. } => format!("failed at '{step}'"),
        WorkflowOutcome::Cancelled { completed_steps } => {
            format!("cancelled after {completed_steps} step(s)")
        }
    }
}
