//! Client-side session and event tracking.
//!
//! - [`tracker`] — the session/event tracker with its periodic flush worker

pub mod tracker;

pub use tracker::SessionTracker;
