//! End-to-end checks of the delivery client and fetch hooks against a mock
//! content delivery API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use showcase_core::config::DeliveryConfig;
use showcase_core::ShowcaseError;
use showcase_delivery::fetch::{self, LOAD_FAILED};
use showcase_delivery::{DeliveryClient, Entry};

fn config_for(server: &MockServer) -> DeliveryConfig {
    DeliveryConfig {
        api_key: "blt-api-key".into(),
        delivery_token: "cs-delivery-token".into(),
        environment: "production".into(),
        host: Some(server.uri()),
    }
}

fn client_for(server: &MockServer) -> Arc<DeliveryClient> {
    Arc::new(DeliveryClient::new(config_for(server)))
}

#[tokio::test]
async fn test_entries_hook_loads_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/content_types/blog_post/entries"))
        .and(query_param("environment", "production"))
        .and(header("api_key", "blt-api-key"))
        .and(header("access_token", "cs-delivery-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [{ "uid": "a", "title": "T" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let consumer = CancellationToken::new();
    let hook = fetch::entries::<Entry>(client_for(&server), "blog_post", &consumer);
    let mut states = hook.subscribe();
    assert!(states.borrow_and_update().loading);

    let settled = hook.settled().await;
    assert!(!settled.loading);
    assert!(settled.error.is_none());
    assert_eq!(settled.data.len(), 1);
    assert_eq!(settled.data[0].uid, "a");
    assert_eq!(settled.data[0].title, "T");
}

#[tokio::test]
async fn test_entries_hook_surfaces_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/content_types/blog_post/entries"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let consumer = CancellationToken::new();
    let hook = fetch::entries::<Entry>(client_for(&server), "blog_post", &consumer);

    let settled = hook.settled().await;
    assert!(settled.data.is_empty());
    assert!(!settled.loading);
    let error = settled.error.expect("error should be set");
    assert!(error.starts_with(LOAD_FAILED));
    assert!(error.contains("500"));
}

#[tokio::test]
async fn test_swallowing_helpers_return_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let entries: Vec<Entry> = client.get_entries("blog_post").await;
    assert!(entries.is_empty());
    let entry: Option<Entry> = client.get_entry("blog_post", "a").await;
    assert!(entry.is_none());

    let err = client.try_get_entries::<Entry>("blog_post").await.unwrap_err();
    assert!(matches!(err, ShowcaseError::HttpStatus { status: 503, .. }));
}

#[tokio::test]
async fn test_single_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/content_types/landing_page/entries/blt42"))
        .and(query_param("environment", "production"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entry": { "uid": "blt42", "title": "Home", "hero_heading": "Compose faster" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let entry: Entry = client.get_entry("landing_page", "blt42").await.unwrap();
    assert_eq!(entry.field_str("hero_heading"), Some("Compose faster"));

    let consumer = CancellationToken::new();
    let hook = fetch::entry::<Entry>(client, "landing_page", "blt42", &consumer);
    let settled = hook.settled().await;
    assert_eq!(settled.data.map(|e| e.uid), Some("blt42".to_string()));
}

#[tokio::test]
async fn test_query_parameter_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/content_types/blog_post/entries"))
        .and(query_param("query", r#"{"category":"release"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [
                { "uid": "r1", "title": "Release notes" },
                { "uid": "r2", "title": "Changelog" }
            ]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let filter = json!({ "category": "release" });
    let entries: Vec<Entry> = client.query_entries("blog_post", &filter).await;
    assert_eq!(entries.len(), 2);

    let consumer = CancellationToken::new();
    let hook = fetch::query::<Entry>(client, "blog_post", filter, &consumer);
    assert_eq!(hook.settled().await.data.len(), 2);
}

#[tokio::test]
async fn test_missing_credentials_skip_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "entries": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let client = DeliveryClient::new(DeliveryConfig {
        api_key: String::new(),
        ..config_for(&server)
    });
    let entries: Vec<Entry> = client.get_entries("blog_post").await;
    assert!(entries.is_empty());
    let err = client.try_get_entries::<Entry>("blog_post").await.unwrap_err();
    assert!(matches!(err, ShowcaseError::MissingCredentials));

    let consumer = CancellationToken::new();
    let hook = fetch::entries::<Entry>(Arc::new(client), "blog_post", &consumer);
    let settled = hook.settled().await;
    assert!(settled.data.is_empty());
    assert!(!settled.loading);
    assert!(settled.error.is_none());
}

#[tokio::test]
async fn test_dropped_consumer_never_receives_late_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/content_types/blog_post/entries"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "entries": [{ "uid": "late", "title": "Late" }] }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let consumer = CancellationToken::new();
    let hook = fetch::entries::<Entry>(client_for(&server), "blog_post", &consumer);
    let mut states = hook.subscribe();
    consumer.cancel();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!states.has_changed().unwrap());
    assert!(hook.state().data.is_empty());
}

#[tokio::test]
async fn test_try_again_after_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/content_types/blog_post/entries"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/content_types/blog_post/entries"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "entries": [{ "uid": "a" }] })),
        )
        .mount(&server)
        .await;

    let consumer = CancellationToken::new();
    let hook = fetch::entries::<Entry>(client_for(&server), "blog_post", &consumer);
    assert!(hook.settled().await.error.is_some());

    hook.refetch();
    let settled = hook.settled().await;
    assert!(settled.error.is_none());
    assert_eq!(settled.data[0].uid, "a");
    assert_eq!(settled.data[0].title, "");
}
