//! Fetch hooks — `{ data, loading, error }` state for one content request,
//! bound to the lifetime of the consumer that owns it.
//!
//! Each hook holds a child of its consumer's [`CancellationToken`]. Once the
//! token is cancelled (consumer gone, or the hook dropped) an in-flight
//! response is discarded instead of written. Overlapping `refetch` calls
//! only let the most recent request write.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use showcase_core::{ShowcaseError, ShowcaseResult};

use crate::client::DeliveryClient;

/// Message prefix shown by the "failed to load" state.
pub const LOAD_FAILED: &str = "Failed to load content";

#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<D> {
    pub data: D,
    pub loading: bool,
    pub error: Option<String>,
}

impl<D: Default> Default for FetchState<D> {
    fn default() -> Self {
        Self {
            data: D::default(),
            loading: false,
            error: None,
        }
    }
}

type LoadFuture<D> = Pin<Box<dyn Future<Output = ShowcaseResult<D>> + Send>>;
type Loader<D> = Arc<dyn Fn() -> LoadFuture<D> + Send + Sync>;

/// A single content request with observable state.
pub struct ContentFetch<D> {
    state: Arc<watch::Sender<FetchState<D>>>,
    loader: Loader<D>,
    generation: Arc<AtomicU64>,
    token: CancellationToken,
    label: String,
}

impl<D> ContentFetch<D>
where
    D: Clone + Default + Send + Sync + 'static,
{
    /// Create a hook and issue its first request. Must be called inside a
    /// tokio runtime.
    pub fn new<F, Fut>(label: impl Into<String>, consumer: &CancellationToken, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ShowcaseResult<D>> + Send + 'static,
    {
        let (tx, _rx) = watch::channel(FetchState::default());
        let fetch = Self {
            state: Arc::new(tx),
            loader: Arc::new(move || Box::pin(loader()) as LoadFuture<D>),
            generation: Arc::new(AtomicU64::new(0)),
            token: consumer.child_token(),
            label: label.into(),
        };
        fetch.start();
        fetch
    }

    /// Issue the request again; the "Try Again" path.
    pub fn refetch(&self) {
        self.start();
    }

    fn start(&self) {
        if self.token.is_cancelled() {
            debug!(fetch = %self.label, "fetch consumer gone, not starting");
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| s.loading = true);

        let future = (self.loader)();
        let state = Arc::clone(&self.state);
        let current = Arc::clone(&self.generation);
        let token = self.token.clone();
        let label = self.label.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    debug!(fetch = %label, "fetch abandoned");
                    return;
                }
                result = future => result,
            };
            // Checked under the channel lock so a concurrent refetch cannot
            // slip in between the check and the write.
            let written = state.send_if_modified(|s| {
                if token.is_cancelled() || current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                match result {
                    Ok(data) => {
                        s.data = data;
                        s.error = None;
                    }
                    Err(ShowcaseError::MissingCredentials) => {
                        error!(
                            fetch = %label,
                            "delivery credentials missing, serving empty content"
                        );
                        s.data = D::default();
                        s.error = None;
                    }
                    Err(e) => {
                        error!(fetch = %label, error = %e, "content fetch failed");
                        s.error = Some(format!("{LOAD_FAILED}: {e}"));
                    }
                }
                s.loading = false;
                true
            });
            if !written {
                debug!(fetch = %label, "stale fetch result discarded");
            }
        });
    }

    pub fn state(&self) -> FetchState<D> {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<D>> {
        self.state.subscribe()
    }

    /// Wait until the current request settles or the hook is cancelled.
    pub async fn settled(&self) -> FetchState<D> {
        let mut rx = self.state.subscribe();
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = rx.wait_for(|s| !s.loading) => {}
        }
        self.state()
    }

    /// Detach from any in-flight request; later results are discarded.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<D> Drop for ContentFetch<D> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Hook over all entries of a content type.
pub fn entries<T>(
    client: Arc<DeliveryClient>,
    content_type: impl Into<String>,
    consumer: &CancellationToken,
) -> ContentFetch<Vec<T>>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let content_type = content_type.into();
    let label = format!("{content_type}/entries");
    ContentFetch::new(label, consumer, move || {
        let client = Arc::clone(&client);
        let content_type = content_type.clone();
        async move { client.try_get_entries::<T>(&content_type).await }
    })
}

/// Hook over entries matching a query object.
pub fn query<T>(
    client: Arc<DeliveryClient>,
    content_type: impl Into<String>,
    query: serde_json::Value,
    consumer: &CancellationToken,
) -> ContentFetch<Vec<T>>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let content_type = content_type.into();
    let label = format!("{content_type}/entries?query");
    ContentFetch::new(label, consumer, move || {
        let client = Arc::clone(&client);
        let content_type = content_type.clone();
        let query = query.clone();
        async move { client.try_query_entries::<T>(&content_type, &query).await }
    })
}

/// Hook over one entry by uid.
pub fn entry<T>(
    client: Arc<DeliveryClient>,
    content_type: impl Into<String>,
    uid: impl Into<String>,
    consumer: &CancellationToken,
) -> ContentFetch<Option<T>>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let content_type = content_type.into();
    let uid = uid.into();
    let label = format!("{content_type}/entries/{uid}");
    ContentFetch::new(label, consumer, move || {
        let client = Arc::clone(&client);
        let content_type = content_type.clone();
        let uid = uid.clone();
        async move { client.try_get_entry::<T>(&content_type, &uid).await.map(Some) }
    })
}
