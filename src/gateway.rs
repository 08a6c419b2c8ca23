//! Gateway builder and main orchestration

use crate::allowlist::{AllowedOperations, OperationClassifier};
use crate::credential::{CredentialCodec, EncryptionKey};
use crate::error::{Error, Result};
use crate::pipeline::GatewayPipeline;
use crate::runtime::ProxyMux;
use crate::upstream::{Forward, UpstreamConfig, UpstreamForwarder};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

/// Main Gateway struct - entry point for the library
///
/// The `Gateway` wires the credential codec, operation classifier, and
/// upstream forwarder into one request pipeline and serves it over HTTP. It
/// is created via the [`GatewayBuilder`].
///
/// # Example
///
/// ```rust,no_run
/// use shopify_token_proxy::{EncryptionKey, Gateway};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = Gateway::builder()
///     .encryption_key(EncryptionKey::from_bytes([0u8; 32]))
///     .api_version("2024-10")
///     .build()?;
///
/// gateway.serve("0.0.0.0:8080").await?;
/// # Ok(())
/// # }
/// ```
pub struct Gateway {
    mux: ProxyMux,
}

impl Gateway {
    /// Create a new gateway builder
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Convert gateway into axum router
    pub fn into_router(self) -> Router {
        self.mux.into_router()
    }

    /// Bind and serve until the process is stopped
    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "gateway listening");
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }
}

/// Builder for creating a [`Gateway`]
///
/// The encryption key is the only required piece; the allowlist defaults to
/// [`AllowedOperations::shopify_billing`] and the upstream configuration to
/// the production Admin API defaults.
pub struct GatewayBuilder {
    key: Option<EncryptionKey>,
    allowed: AllowedOperations,
    upstream: UpstreamConfig,
    forwarder: Option<Arc<dyn Forward>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            key: None,
            allowed: AllowedOperations::shopify_billing(),
            upstream: UpstreamConfig::default(),
            forwarder: None,
        }
    }

    /// Set the pre-shared symmetric key (required)
    pub fn encryption_key(mut self, key: EncryptionKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Replace the default operation allowlist
    pub fn allowed_operations(mut self, allowed: AllowedOperations) -> Self {
        self.allowed = allowed;
        self
    }

    /// Set the Admin API version path segment
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.upstream.api_version = version.into();
        self
    }

    /// Override the upstream URL scheme (the default `https` suits
    /// production; `http` suits local or mock upstreams)
    pub fn upstream_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.upstream.scheme = scheme.into();
        self
    }

    /// Set an upstream request timeout
    pub fn upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream.timeout = Some(timeout);
        self
    }

    /// Substitute the forwarder implementation behind the [`Forward`] seam
    pub fn with_forwarder(mut self, forwarder: Arc<dyn Forward>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Build the gateway
    pub fn build(self) -> Result<Gateway> {
        let key = self
            .key
            .ok_or_else(|| Error::Other(anyhow::anyhow!("an encryption key is required")))?;

        let forwarder = match self.forwarder {
            Some(forwarder) => forwarder,
            None => Arc::new(UpstreamForwarder::new(self.upstream)?),
        };

        let pipeline = GatewayPipeline::new(
            CredentialCodec::new(key),
            OperationClassifier::new(self.allowed),
            forwarder,
        );

        Ok(Gateway {
            mux: ProxyMux::new(pipeline),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
