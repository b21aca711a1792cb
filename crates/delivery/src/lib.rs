//! Content delivery — REST client for the content delivery API and
//! cancellable fetch hooks that expose `{ data, loading, error }` state to
//! presentation code.
//!
//! # Modules
//!
//! - [`client`] — HTTP client, URL building and response envelopes
//! - [`fetch`] — Fetch hooks bound to a consumer's cancellation token
//! - [`types`] — Generic entry record

pub mod client;
pub mod fetch;
pub mod types;

pub use client::DeliveryClient;
pub use fetch::{ContentFetch, FetchState};
pub use types::Entry;
