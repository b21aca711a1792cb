//! Simulated workflow runner. Each step waits its configured delay and then
//! either completes or fails; progress lands in the [`AutomationLog`].

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::log::{AutomationLog, LogStatus, NewLogEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    pub delay_ms: u64,
    /// Simulate a failure at this step.
    #[serde(default)]
    pub fails: bool,
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            name: name.into(),
            delay_ms,
            fails: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fails = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    /// The publish pipeline shown on the automation page.
    pub fn content_publish() -> Self {
        Self {
            name: "content_publish".into(),
            steps: vec![
                WorkflowStep::new("validate entry", 400),
                WorkflowStep::new("localize variants", 800),
                WorkflowStep::new("publish to delivery", 600),
                WorkflowStep::new("purge edge cache", 300),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Completed { steps: usize, duration_ms: u64 },
    Failed { step: String, duration_ms: u64 },
    Cancelled { completed_steps: usize },
}

/// Executes workflows and records each run in the automation log.
pub struct WorkflowRunner {
    log: AutomationLog,
}

impl WorkflowRunner {
    pub fn new(log: AutomationLog) -> Self {
        Self { log }
    }

    pub async fn run(&self, workflow: &Workflow, cancel: &CancellationToken) -> WorkflowOutcome {
        let started = Instant::now();
        info!(workflow = %workflow.name, steps = workflow.steps.len(), "workflow started");
        self.log.add_log(NewLogEntry::new(
            &workflow.name,
            LogStatus::Running,
            format!("Started {} step(s)", workflow.steps.len()),
        ));

        for (index, step) in workflow.steps.iter().enumerate() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(workflow = %workflow.name, step = %step.name, "workflow cancelled");
                    let message = format!("Cancelled before '{}'", step.name);
                    self.log.add_log(
                        NewLogEntry::new(&workflow.name, LogStatus::Failed, message)
                            .with_duration(elapsed_ms(started)),
                    );
                    return WorkflowOutcome::Cancelled { completed_steps: index };
                }
                _ = tokio::time::sleep(Duration::from_millis(step.delay_ms)) => {}
            }

            if step.fails {
                let duration_ms = elapsed_ms(started);
                warn!(workflow = %workflow.name, step = %step.name, "workflow step failed");
                let message = format!("Step '{}' failed", step.name);
                self.log.add_log(
                    NewLogEntry::new(&workflow.name, LogStatus::Failed, message)
                        .with_duration(duration_ms),
                );
                return WorkflowOutcome::Failed {
                    step: step.name.clone(),
                    duration_ms,
                };
            }

            let message = format!("Step '{}' completed", step.name);
            self.log.add_log(
                NewLogEntry::new(&workflow.name, LogStatus::Running, message)
                    .with_duration(step.delay_ms),
            );
        }

        let duration_ms = elapsed_ms(started);
        info!(workflow = %workflow.name, duration_ms, "workflow completed");
        self.log.add_log(
            NewLogEntry::new(&workflow.name, LogStatus::Success, "Workflow completed")
                .with_duration(duration_ms),
        );
        WorkflowOutcome::Completed {
            steps: workflow.steps.len(),
            duration_ms,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
