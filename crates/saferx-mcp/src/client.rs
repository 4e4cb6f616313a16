//! HTTP client for the SafeRx drug safety API.

use crate::config::{API_KEY_HEADER, AdapterConfig, USER_AGENT};
use crate::error::{AdapterError, Result};
use crate::model::DrugSafetyRequest;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, header};
use serde_json::Value;
use tracing::debug;

pub const CHECK_PATH: &str = "/api/drug_safety/check";
pub const METADATA_PATH: &str = "/api/drug_safety/metadata";

/// A decoded backend reply. Non-success statuses are data here, not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: Value,
}

impl BackendResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound seam of the adapter.
///
/// Implementations make exactly one request per call and never retry.
#[async_trait]
pub trait SafetyBackend: Send + Sync {
    /// `POST /api/drug_safety/check`
    async fn check(&self, request: &DrugSafetyRequest) -> Result<BackendResponse>;

    /// `GET /api/drug_safety/metadata`
    async fn metadata(&self) -> Result<BackendResponse>;
}

pub struct SafeRxClient {
    config: AdapterConfig,
    client: Client,
}

impl SafeRxClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: AdapterConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { config, client })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.config.endpoint(path))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, USER_AGENT)
            .header(API_KEY_HEADER, self.config.api_key())
    }

    async fn send(&self, request: RequestBuilder) -> Result<BackendResponse> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        debug!(status, bytes = bytes.len(), "SafeRx response received");

        // Error replies must be JSON too; anything else is a transport-level failure.
        let body: Value =
            serde_json::from_slice(&bytes).map_err(|e| AdapterError::MalformedResponse {
                status,
                message: e.to_string(),
            })?;
        Ok(BackendResponse { status, body })
    }
}

#[async_trait]
impl SafetyBackend for SafeRxClient {
    async fn check(&self, request: &DrugSafetyRequest) -> Result<BackendResponse> {
        let body = serde_json::to_vec(request)?;
        debug!(drugs = request.drugs.len(), "POST {CHECK_PATH}");
        self.send(self.request(Method::POST, CHECK_PATH).body(body))
            .await
    }

    async fn metadata(&self) -> Result<BackendResponse> {
        debug!("GET {METADATA_PATH}");
        self.send(self.request(Method::GET, METADATA_PATH)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Lang;
    use saferx_test_support::{MockBackend, MockReply};
    use serde_json::json;

    fn client_for(mock: &MockBackend) -> SafeRxClient {
        let cfg = AdapterConfig::new(Some("test-key".to_string()), Some(mock.base_url()))
            .expect("valid config");
        SafeRxClient::new(cfg).expect("client")
    }

    #[tokio::test]
    async fn check_posts_body_with_auth_headers() {
        let mock = MockBackend::start(
            MockReply::json(200, json!({"alerts": []})),
            MockReply::json(200, json!({})),
        )
        .await
        .expect("mock backend");
        let client = client_for(&mock);

        let mut req = DrugSafetyRequest::new(vec!["Augmentin 1g".to_string()]);
        req.lang = Some(Lang::Ar);
        let resp = client.check(&req).await.expect("check");
        assert!(resp.is_success());

        let recorded = mock.requests();
        assert_eq!(recorded.len(), 1);
        let r = &recorded[0];
        assert_eq!(r.method, "POST");
        assert_eq!(r.path, CHECK_PATH);
        assert_eq!(r.header("x-saferx-api-key"), Some("test-key"));
        assert_eq!(r.header("user-agent"), Some(USER_AGENT));
        assert_eq!(r.header("content-type"), Some("application/json"));
        assert_eq!(r.body, r#"{"drugs":["Augmentin 1g"],"lang":"ar"}"#);

        mock.shutdown().await;
    }

    #[tokio::test]
    async fn metadata_is_a_bodyless_get() {
        let mock = MockBackend::start(
            MockReply::json(200, json!({})),
            MockReply::json(200, json!({"version": "2024.1"})),
        )
        .await
        .expect("mock backend");
        let client = client_for(&mock);

        let resp = client.metadata().await.expect("metadata");
        assert_eq!(resp.body, json!({"version": "2024.1"}));

        let recorded = mock.requests();
        assert_eq!(recorded[0].method, "GET");
        assert_eq!(recorded[0].path, METADATA_PATH);
        assert!(recorded[0].body.is_empty());
        assert_eq!(recorded[0].header("x-saferx-api-key"), Some("test-key"));

        mock.shutdown().await;
    }

    #[tokio::test]
    async fn error_status_is_returned_as_data() {
        let mock = MockBackend::start(
            MockReply::json(401, json!({"error": "invalid key"})),
            MockReply::json(200, json!({})),
        )
        .await
        .expect("mock backend");
        let client = client_for(&mock);

        let resp = client
            .check(&DrugSafetyRequest::new(vec!["a".to_string()]))
            .await
            .expect("status is not an error");
        assert_eq!(resp.status, 401);
        assert!(!resp.is_success());
        assert_eq!(resp.body, json!({"error": "invalid key"}));

        mock.shutdown().await;
    }

    #[tokio::test]
    async fn non_json_body_is_a_malformed_response() {
        let mock = MockBackend::start(
            MockReply::raw(502, "<html>Bad Gateway</html>"),
            MockReply::json(200, json!({})),
        )
        .await
        .expect("mock backend");
        let client = client_for(&mock);

        let err = client
            .check(&DrugSafetyRequest::new(vec!["a".to_string()]))
            .await
            .expect_err("html is not json");
        assert!(matches!(
            err,
            AdapterError::MalformedResponse { status: 502, .. }
        ));

        mock.shutdown().await;
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let cfg = AdapterConfig::new(
            Some("k".to_string()),
            Some("http://127.0.0.1:9".to_string()),
        )
        .expect("valid config");
        let client = SafeRxClient::new(cfg).expect("client");
        let err = client.metadata().await.expect_err("nothing listens on port 9");
        assert!(matches!(err, AdapterError::Transport(_)));
    }
}
