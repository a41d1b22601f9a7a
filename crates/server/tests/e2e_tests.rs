//! End-to-end tests with mocked providers.
//!
//! These tests run the full server stack in-process with mock providers in
//! place of real indexers.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use fanout_core::ProviderError;

use common::{fixtures, TestConfig, TestFixture};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["database"]["backend"], "sqlite");
    assert_eq!(response.body["database"]["url_configured"], false);
    assert!(response.body["database"].get("url").is_none());
    assert_eq!(response.body["timeouts"]["p95_buffer"], 0.25);
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn test_search_merges_provider_results() {
    let fixture = TestFixture::new().await;
    fixture
        .provider("yts")
        .set_results(fixtures::result_records("yts", 2))
        .await;
    fixture
        .provider("eztv")
        .set_results(fixtures::result_records("eztv", 1))
        .await;

    let response = fixture
        .post("/api/v1/search", json!({ "query": "ubuntu" }))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "completed");
    assert_eq!(response.body["admission"], "all_enabled");
    assert_eq!(response.body["results"].as_array().unwrap().len(), 3);
    assert_eq!(response.body["tasks"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_search_reports_failed_tasks() {
    let fixture = TestFixture::new().await;
    fixture
        .provider("yts")
        .set_results(fixtures::result_records("yts", 1))
        .await;
    fixture
        .provider("eztv")
        .set_error(Some(ProviderError::Http {
            status: 429,
            message: "Too Many Requests".to_string(),
        }))
        .await;

    let response = fixture
        .post("/api/v1/search", json!({ "query": "ubuntu" }))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "partial");
    let failed = response.body["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["provider"] == "eztv")
        .unwrap()
        .clone();
    assert_eq!(failed["outcome"], "rate_limit");
    assert!(failed["error"].as_str().unwrap().contains("429"));
}

#[tokio::test]
async fn test_search_with_explicit_providers_and_languages() {
    let fixture = TestFixture::new().await;
    fixture
        .provider("yts")
        .set_results(fixtures::result_records("yts", 1))
        .await;

    let response = fixture
        .post(
            "/api/v1/search",
            json!({
                "query": "ubuntu",
                "providers": ["YTS"],
                "languages": ["en", "fr"]
            }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["admission"], "explicit");
    assert_eq!(response.body["tasks"].as_array().unwrap().len(), 2);
    assert_eq!(fixture.provider("yts").call_count().await, 2);
    assert_eq!(fixture.provider("eztv").call_count().await, 0);
}

#[tokio::test]
async fn test_search_with_no_providers() {
    let fixture = TestFixture::with_config(TestConfig::without_providers()).await;

    let response = fixture
        .post("/api/v1/search", json!({ "query": "ubuntu" }))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "no_providers");
    assert!(response.body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_rejects_empty_query() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post("/api/v1/search", json!({ "query": "   " }))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_search_rejects_malformed_json() {
    let fixture = TestFixture::new().await;
    let response = fixture.post_raw("/api/v1/search", "{not json").await;
    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_concurrent_identical_searches_are_coalesced() {
    let fixture = TestFixture::new().await;
    for name in ["yts", "eztv"] {
        let provider = fixture.provider(name);
        provider
            .set_results(fixtures::result_records(name, 1))
            .await;
        provider.set_delay(Duration::from_millis(200)).await;
    }

    let body = json!({ "query": "ubuntu" });
    let (first, second) = tokio::join!(
        fixture.post("/api/v1/search", body.clone()),
        fixture.post("/api/v1/search", body),
    );

    assert_status!(first, StatusCode::OK);
    assert_status!(second, StatusCode::OK);
    assert_eq!(first.body["request_id"], second.body["request_id"]);
    assert_eq!(fixture.provider("yts").call_count().await, 1);
    assert_eq!(fixture.provider("eztv").call_count().await, 1);
}

// =============================================================================
// Providers
// =============================================================================

#[tokio::test]
async fn test_list_providers() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/providers").await;

    assert_status!(response, StatusCode::OK);
    let providers = response.body["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0]["id"], "yts");
    assert_eq!(providers[0]["class"], "http_scraping");
    assert_eq!(providers[0]["enabled"], true);
    assert_eq!(providers[0]["timeout_ms"], 8_000);
    assert_eq!(providers[0]["health"]["score"], 50.0);
    assert_eq!(providers[0]["health"]["penalized"], false);
}

#[tokio::test]
async fn test_disable_provider_excludes_it_from_search() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .put("/api/v1/providers/EZTV/enabled", json!({ "enabled": false }))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["enabled"], false);

    let response = fixture
        .post("/api/v1/search", json!({ "query": "ubuntu" }))
        .await;
    assert_eq!(response.body["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(fixture.provider("eztv").call_count().await, 0);
}

#[tokio::test]
async fn test_toggle_unknown_provider() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .put("/api/v1/providers/nope/enabled", json!({ "enabled": true }))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_lifts_penalty() {
    let fixture = TestFixture::new().await;
    fixture
        .provider("eztv")
        .set_error(Some(ProviderError::Http {
            status: 503,
            message: "Service Unavailable".to_string(),
        }))
        .await;

    fixture
        .post("/api/v1/search", json!({ "query": "ubuntu" }))
        .await;

    let response = fixture.get("/api/v1/providers").await;
    let eztv = response.body["providers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == "eztv")
        .unwrap()
        .clone();
    assert_eq!(eztv["health"]["penalized"], true);
    assert_eq!(eztv["health"]["last_error"]["kind"], "server_error");

    let response = fixture.post_empty("/api/v1/providers/eztv/reset").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["reset"], true);

    let response = fixture.get("/api/v1/providers").await;
    let eztv = response.body["providers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == "eztv")
        .unwrap()
        .clone();
    assert_eq!(eztv["health"]["penalized"], false);
}

#[tokio::test]
async fn test_reset_unknown_provider() {
    let fixture = TestFixture::new().await;
    let response = fixture.post_empty("/api/v1/providers/nope/reset").await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

// =============================================================================
// Timeouts and metrics
// =============================================================================

#[tokio::test]
async fn test_timeouts_after_search() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/timeouts").await;
    assert_status!(response, StatusCode::OK);
    assert!(response.body["decisions"].as_array().unwrap().is_empty());

    fixture
        .post("/api/v1/search", json!({ "query": "ubuntu" }))
        .await;

    let response = fixture.get("/api/v1/timeouts").await;
    let decisions = response.body["decisions"].as_array().unwrap();
    assert_eq!(decisions.len(), 2);
    assert_eq!(decisions[0]["provider"], "eztv");
    assert_eq!(decisions[0]["source"], "fallback");
    assert_eq!(decisions[0]["timeout_ms"], 8_000);
    assert_eq!(response.body["adaptive_enabled"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture
        .post("/api/v1/search", json!({ "query": "ubuntu" }))
        .await;

    let (status, body) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("fanout_searches_total"));
    assert!(body.contains("fanout_provider_calls_total"));
    assert!(body.contains("fanout_providers_registered"));
    assert!(body.contains("fanout_http_requests_total"));
}
