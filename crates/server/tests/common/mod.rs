//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock providers injected, enabling E2E testing without any real
//! upstream indexer.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use fanout_core::{
    config::{DatabaseConfig, ServerConfig},
    latency::SqliteLatencyBackend,
    provider::ProviderClassTable,
    testing::MockProvider,
    Config, LatencyBackend, Provider, ProviderId, ProviderRegistry, ScatterRuntime,
};

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use fanout_core::testing::fixtures;

/// Test fixture for E2E testing with mock providers.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_search() {
///     let fixture = TestFixture::new().await;
///     fixture.provider("yts").set_results(vec![fixtures::result_record("a")]).await;
///
///     let response = fixture.post("/api/v1/search", json!({ "query": "ubuntu" })).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Runtime behind the router
    pub runtime: Arc<ScatterRuntime>,
    /// Registered mock providers, in registration order
    pub providers: Vec<MockProvider>,
    /// Temporary directory for the latency database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture with two enabled mock providers, "YTS" and "EZTV".
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let mut config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
                ..Default::default()
            },
            ..Default::default()
        };
        config.scatter.default_providers = test_config.default_providers.clone();

        let backend: Arc<dyn LatencyBackend> = Arc::new(
            SqliteLatencyBackend::new(&db_path).expect("Failed to create latency store"),
        );

        let providers: Vec<MockProvider> = test_config
            .providers
            .iter()
            .map(|name| MockProvider::new(name))
            .collect();
        let registry = providers.iter().fold(
            ProviderRegistry::new(ProviderClassTable::new(&config.providers.class_overrides())),
            |registry, provider| registry.register(Arc::new(provider.clone()), true),
        );

        let runtime = Arc::new(ScatterRuntime::from_parts(config, backend, registry, None));

        // Create app state and router
        let state = Arc::new(fanout_server::state::AppState::new(Arc::clone(&runtime)));
        let router = fanout_server::api::create_router(state);

        Self {
            router,
            runtime,
            providers,
            temp_dir,
        }
    }

    /// Mock provider registered under `name` (matched case-insensitively).
    pub fn provider(&self, name: &str) -> &MockProvider {
        let id = ProviderId::normalize(name);
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .unwrap_or_else(|| panic!("no mock provider named {}", name))
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    #[allow(dead_code)]
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    #[allow(dead_code)]
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    #[allow(dead_code)]
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a GET request and return the raw body as text.
    #[allow(dead_code)]
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Names of the mock providers to register (all enabled)
    pub providers: Vec<String>,
    /// `scatter.default_providers`
    pub default_providers: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            providers: vec!["YTS".to_string(), "EZTV".to_string()],
            default_providers: Vec::new(),
        }
    }
}

impl TestConfig {
    /// Create config with no providers registered.
    #[allow(dead_code)]
    pub fn without_providers() -> Self {
        Self {
            providers: Vec::new(),
            default_providers: Vec::new(),
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
