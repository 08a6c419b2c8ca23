//! Runtime support - axum HTTP integration
//!
//! Thin HTTP layer over the [`GatewayPipeline`]: extracts the credential
//! header and raw body from the inbound request, runs the pipeline, and
//! writes its response back as JSON. The hosting transport may run
//! arbitrarily many handler invocations concurrently.

use crate::pipeline::{GatewayPipeline, GatewayResponse};
use crate::upstream::ACCESS_TOKEN_HEADER;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// ProxyMux - main gateway handler
///
/// Routes the proxy endpoint and health check. Convert into an axum router
/// with [`ProxyMux::into_router`].
pub struct ProxyMux {
    pipeline: Arc<GatewayPipeline>,
}

impl ProxyMux {
    pub fn new(pipeline: GatewayPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Convert to axum router
    pub fn into_router(self) -> Router {
        Router::new()
            .route("/graphql", post(handle_graphql_post))
            .route("/health", get(health_handler))
            .with_state(self.pipeline)
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn handle_graphql_post(
    State(pipeline): State<Arc<GatewayPipeline>>,
    headers: HeaderMap,
    body: String,
) -> GatewayResponse {
    let credential_header = headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    pipeline.handle(credential_header, &body).await
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}
