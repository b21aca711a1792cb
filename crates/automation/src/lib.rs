//! Automation demo widgets — the bounded automation log, the simulated
//! workflow runner that feeds it, and the live-visitor counter.
//!
//! # Modules
//!
//! - [`log`] — Most-recent-first bounded run log with subscriber notification
//! - [`runner`] — Step-by-step simulated workflow execution
//! - [`visitors`] — Random-walk visitor counter

pub mod log;
pub mod runner;
pub mod visitors;

pub use log::{AutomationLog, AutomationLogEntry, LogStatus, NewLogEntry, Subscription};
pub use runner::{Workflow, WorkflowOutcome, WorkflowRunner, WorkflowStep};
pub use visitors::VisitorCounter;
