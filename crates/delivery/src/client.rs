//! REST client for the content delivery API.
//!
//! `GET {host}/v3/content_types/{type}/entries?environment={env}` and
//! `.../entries/{uid}?environment={env}`, authenticated with the `api_key`
//! and `access_token` headers.
//!
//! Two flavours of every call: `try_*` propagates [`ShowcaseError`];
//! the plain helpers log the failure and return an empty collection or
//! `None`. No timeout and no retry.

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use url::Url;

use showcase_core::config::DeliveryConfig;
use showcase_core::{ShowcaseError, ShowcaseResult};

use crate::types::{EntriesEnvelope, EntryEnvelope};

pub struct DeliveryClient {
    http: reqwest::Client,
    config: DeliveryConfig,
}

impl DeliveryClient {
    pub fn new(config: DeliveryConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    pub fn with_http_client(config: DeliveryConfig, http: reqwest::Client) -> Self {
        if !config.has_credentials() {
            warn!("delivery api key or token missing, content requests will return empty results");
        }
        Self { http, config }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    // ─── URL building ───────────────────────────────────────────────────

    fn url(&self, segments: &[&str], query: Option<&serde_json::Value>) -> ShowcaseResult<Url> {
        let mut url = Url::parse(&self.config.base_url())
            .map_err(|e| ShowcaseError::Config(format!("invalid delivery host: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ShowcaseError::Config("delivery host cannot be a base url".into()))?
            .pop_if_empty()
            .extend(["v3", "content_types"])
            .extend(segments);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("environment", &self.config.environment);
            if let Some(query) = query {
                pairs.append_pair("query", &serde_json::to_string(query)?);
            }
        }
        Ok(url)
    }

    pub fn entries_url(
        &self,
        content_type: &str,
        query: Option<&serde_json::Value>,
    ) -> ShowcaseResult<Url> {
        self.url(&[content_type, "entries"], query)
    }

    pub fn entry_url(&self, content_type: &str, uid: &str) -> ShowcaseResult<Url> {
        self.url(&[content_type, "entries", uid], None)
    }

    // ─── Transport ──────────────────────────────────────────────────────

    async fn get_json<R: DeserializeOwned>(&self, url: Url) -> ShowcaseResult<R> {
        if !self.config.has_credentials() {
            return Err(ShowcaseError::MissingCredentials);
        }
        metrics::counter!("delivery.requests").increment(1);
        debug!(url = %url, "fetching content");

        let response = self
            .http
            .get(url.clone())
            .header("api_key", &self.config.api_key)
            .header("access_token", &self.config.delivery_token)
            .send()
            .await
            .map_err(|e| ShowcaseError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShowcaseError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ShowcaseError::Transport(e.to_string()))?;
        Ok(serde_json::from_slice(&body)?)
    }

    // ─── Propagating calls ──────────────────────────────────────────────

    pub async fn try_get_entries<T: DeserializeOwned>(
        &self,
        content_type: &str,
    ) -> ShowcaseResult<Vec<T>> {
        let url = self.entries_url(content_type, None)?;
        let envelope: EntriesEnvelope<T> = self.get_json(url).await?;
        Ok(envelope.entries)
    }

    /// Entries filtered by a query object, sent URL-encoded as `query=`.
    pub async fn try_query_entries<T: DeserializeOwned>(
        &self,
        content_type: &str,
        query: &serde_json::Value,
    ) -> ShowcaseResult<Vec<T>> {
        let url = self.entries_url(content_type, Some(query))?;
        let envelope: EntriesEnvelope<T> = self.get_json(url).await?;
        Ok(envelope.entries)
    }

    pub async fn try_get_entry<T: DeserializeOwned>(
        &self,
        content_type: &str,
        uid: &str,
    ) -> ShowcaseResult<T> {
        let url = self.entry_url(content_type, uid)?;
        let envelope: EntryEnvelope<T> = self.get_json(url).await?;
        Ok(envelope.entry)
    }

    // ─── Swallowing calls ───────────────────────────────────────────────

    pub async fn get_entries<T: DeserializeOwned>(&self, content_type: &str) -> Vec<T> {
        self.try_get_entries(content_type)
            .await
            .unwrap_or_else(|e| log_failure(content_type, &e, Vec::new()))
    }

    pub async fn query_entries<T: DeserializeOwned>(
        &self,
        content_type: &str,
        query: &serde_json::Value,
    ) -> Vec<T> {
        self.try_query_entries(content_type, query)
            .await
            .unwrap_or_else(|e| log_failure(content_type, &e, Vec::new()))
    }

    pub async fn get_entry<T: DeserializeOwned>(&self, content_type: &str, uid: &str) -> Option<T> {
        self.try_get_entry(content_type, uid)
            .await
            .map(Some)
            .unwrap_or_else(|e| log_failure(content_type, &e, None))
    }
}

fn log_failure<R>(content_type: &str, e: &ShowcaseError, fallback: R) -> R {
    metrics::counter!("delivery.errors").increment(1);
    error!(content_type = %content_type, error = %e, "content request failed");
    fallback
}
