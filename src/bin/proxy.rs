//! Shopify token proxy server
//!
//! Reads its configuration from the environment:
//!
//! - `ENCRYPTION_KEY` (required): the pre-shared symmetric key, either 32
//!   raw bytes or 64 hex characters
//! - `SHOPIFY_API_VERSION` (optional): Admin API version, default `2024-10`
//! - `PORT` (optional): listen port, default 8080

use anyhow::Context;
use shopify_token_proxy::{AllowedOperations, EncryptionKey, Gateway, DEFAULT_API_VERSION};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let key_material =
        std::env::var("ENCRYPTION_KEY").context("ENCRYPTION_KEY must be set")?;
    let key = EncryptionKey::parse(&key_material).context("invalid ENCRYPTION_KEY")?;

    let api_version =
        std::env::var("SHOPIFY_API_VERSION").unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .context("PORT must be a number")?;

    let gateway = Gateway::builder()
        .encryption_key(key)
        .allowed_operations(AllowedOperations::shopify_billing())
        .api_version(api_version)
        .build()?;

    gateway.serve(&format!("0.0.0.0:{port}")).await?;
    Ok(())
}
