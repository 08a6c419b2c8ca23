//! Upstream forwarding to the Shopify Admin GraphQL API
//!
//! Issues the single outbound HTTP call per admitted request. The inbound
//! raw body is passed through unmodified, the decrypted shop token goes into
//! the `X-Shopify-Access-Token` header, and the upstream status and JSON
//! body come back unchanged. Upstream 4xx/5xx are relays, not errors; only
//! transport failures and non-JSON bodies surface as [`Error::Upstream`].
//!
//! No retry is attempted. Timeouts are the client defaults unless set in
//! [`UpstreamConfig`].

use crate::credential::ShopCredential;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

/// Header carrying the access token, inbound (encrypted envelope) and
/// upstream (decrypted shop token) alike
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Admin API version used when none is configured
pub const DEFAULT_API_VERSION: &str = "2024-10";

/// Result of an upstream call
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// HTTP status code, relayed verbatim
    pub status: u16,
    /// Response body as JSON, relayed verbatim
    pub body: JsonValue,
}

/// The seam the pipeline forwards through
///
/// Lets tests substitute a stub and keeps the HTTP client replaceable
/// without touching the pipeline.
#[async_trait]
pub trait Forward: Send + Sync {
    /// Forward the raw request body to the shop named by the credential
    async fn forward(
        &self,
        credential: &ShopCredential,
        raw_body: &str,
    ) -> Result<UpstreamResponse>;
}

/// Configuration for the upstream forwarder
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Fixed Admin API version path segment
    pub api_version: String,
    /// URL scheme; `https` in production, overridable for local upstreams
    pub scheme: String,
    /// Optional request timeout; client default when unset
    pub timeout: Option<Duration>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            scheme: "https".to_string(),
            timeout: None,
        }
    }
}

/// reqwest-backed implementation of [`Forward`]
pub struct UpstreamForwarder {
    config: UpstreamConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for UpstreamForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamForwarder")
            .field("config", &self.config)
            .finish()
    }
}

impl UpstreamForwarder {
    /// Create a forwarder with the given configuration
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Upstream(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Admin GraphQL endpoint for a shop domain
    fn endpoint(&self, shop_domain: &str) -> String {
        format!(
            "{}://{}/admin/api/{}/graphql.json",
            self.config.scheme, shop_domain, self.config.api_version
        )
    }
}

#[async_trait]
impl Forward for UpstreamForwarder {
    async fn forward(
        &self,
        credential: &ShopCredential,
        raw_body: &str,
    ) -> Result<UpstreamResponse> {
        let url = self.endpoint(&credential.shop_domain);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header(ACCESS_TOKEN_HEADER, &credential.shop_access_token)
            .body(raw_body.to_string())
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("upstream request failed: {e}")))?;

        let status = response.status().as_u16();

        let body_text = response
            .text()
            .await
            .map_err(|e| Error::Upstream(format!("failed to read upstream response: {e}")))?;
        let body: JsonValue = serde_json::from_str(&body_text)
            .map_err(|_| Error::Upstream("upstream returned a non-JSON body".to_string()))?;

        // Status and body only; the URL would expose the shop domain
        debug!(status, "upstream responded");

        Ok(UpstreamResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential(domain: &str) -> ShopCredential {
        ShopCredential {
            shop_domain: domain.to_string(),
            shop_access_token: "tok_abc".to_string(),
        }
    }

    fn forwarder() -> UpstreamForwarder {
        UpstreamForwarder::new(UpstreamConfig {
            scheme: "http".to_string(),
            ..UpstreamConfig::default()
        })
        .unwrap()
    }

    fn mock_domain(server: &MockServer) -> String {
        // Shop domain including port, scheme stripped
        server.uri().trim_start_matches("http://").to_string()
    }

    #[test]
    fn test_endpoint_shape() {
        let f = UpstreamForwarder::new(UpstreamConfig::default()).unwrap();
        assert_eq!(
            f.endpoint("test.myshopify.com"),
            "https://test.myshopify.com/admin/api/2024-10/graphql.json"
        );

        let f = UpstreamForwarder::new(UpstreamConfig {
            api_version: "2025-01".to_string(),
            ..UpstreamConfig::default()
        })
        .unwrap();
        assert_eq!(
            f.endpoint("x.myshopify.com"),
            "https://x.myshopify.com/admin/api/2025-01/graphql.json"
        );
    }

    #[tokio::test]
    async fn test_forward_posts_body_and_token_verbatim() {
        let server = MockServer::start().await;
        let raw_body = r#"{"query":"query { shop { name } }"}"#;

        Mock::given(method("POST"))
            .and(path("/admin/api/2024-10/graphql.json"))
            .and(header("Content-Type", "application/json"))
            .and(header(ACCESS_TOKEN_HEADER, "tok_abc"))
            .and(body_string(raw_body))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": {"shop": {"name": "Acme"}}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = forwarder()
            .forward(&credential(&mock_domain(&server)), raw_body)
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(
            response.body,
            serde_json::json!({"data": {"shop": {"name": "Acme"}}})
        );
    }

    #[tokio::test]
    async fn test_upstream_error_status_passes_through() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({"errors": "Throttled"})),
            )
            .mount(&server)
            .await;

        let response = forwarder()
            .forward(&credential(&mock_domain(&server)), "{}")
            .await
            .unwrap();

        // Upstream 4xx is a relay, not a gateway error
        assert_eq!(response.status, 429);
        assert_eq!(response.body, serde_json::json!({"errors": "Throttled"}));
    }

    #[tokio::test]
    async fn test_non_json_upstream_body_is_transport_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let err = forwarder()
            .forward(&credential(&mock_domain(&server)), "{}")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_connection_failure_is_upstream_error() {
        // Unroutable port
        let err = forwarder()
            .forward(&credential("127.0.0.1:1"), "{}")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream(_)));
    }
}
