//! Per-request gateway pipeline
//!
//! Sequences the credential, allowlist, and forwarding checks for one
//! inbound request and maps every failure mode to a response:
//!
//! ```text
//! Start ──> CredentialExtracted ──> CredentialDecrypted
//!       │                      │
//!       │ no header: 400       │ bad envelope/payload: 401
//!       v                      v
//!   OperationClassified ──> Forwarded ──> Responded (verbatim relay)
//!       │                      │
//!       │ malformed/denied:403 │ transport failure: 500
//! ```
//!
//! Each invocation is stateless; the only shared state is the read-only key,
//! allowlists, and HTTP client, so arbitrarily many requests may run
//! concurrently without locks. A failure in one request never affects
//! another.

use crate::allowlist::{GraphQlRequestBody, OperationClassifier};
use crate::credential::CredentialCodec;
use crate::error::{Error, Result};
use crate::upstream::Forward;
use axum::http::StatusCode;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};

/// Response the gateway hands back to the caller
///
/// Constructed fresh per request. Either the upstream status and body
/// relayed verbatim, or a rejection with an `{"error": ...}` body.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub body: JsonValue,
}

/// Orchestrates codec, classifier, and forwarder for each inbound request
pub struct GatewayPipeline {
    codec: CredentialCodec,
    classifier: OperationClassifier,
    forwarder: Arc<dyn Forward>,
}

impl GatewayPipeline {
    pub fn new(
        codec: CredentialCodec,
        classifier: OperationClassifier,
        forwarder: Arc<dyn Forward>,
    ) -> Self {
        Self {
            codec,
            classifier,
            forwarder,
        }
    }

    /// Handle one inbound request
    ///
    /// `credential_header` is the raw value of the `X-Shopify-Access-Token`
    /// header if present; `raw_body` is the request body text. Never fails:
    /// every pipeline error becomes a rejection response.
    pub async fn handle(&self, credential_header: Option<&str>, raw_body: &str) -> GatewayResponse {
        match self.run(credential_header, raw_body).await {
            Ok(response) => response,
            Err(err) => {
                let status = err.status_code();
                // Display text stays in the log; the caller gets the fixed
                // per-category message only
                warn!(%err, status = status.as_u16(), "request rejected");
                GatewayResponse {
                    status,
                    body: err.to_error_body(),
                }
            }
        }
    }

    async fn run(
        &self,
        credential_header: Option<&str>,
        raw_body: &str,
    ) -> Result<GatewayResponse> {
        // Start -> CredentialExtracted
        let envelope = credential_header.ok_or(Error::MissingCredential)?;

        // -> CredentialDecrypted
        let credential = self.codec.decrypt_credential(envelope)?;
        debug!("credential decrypted");

        // -> OperationClassified
        let body = GraphQlRequestBody::from_raw(raw_body)?;
        if !self.classifier.is_allowed(&body) {
            return Err(Error::OperationNotAllowed);
        }
        debug!("operation admitted");

        // -> Forwarded
        let upstream = self.forwarder.forward(&credential, raw_body).await?;

        // -> Responded: relay status and body verbatim
        let status = StatusCode::from_u16(upstream.status)
            .map_err(|_| Error::Upstream(format!("invalid upstream status {}", upstream.status)))?;
        Ok(GatewayResponse {
            status,
            body: upstream.body,
        })
    }
}
