//! # shopify-token-proxy
//!
//! A credential-mediating reverse proxy for the Shopify Admin GraphQL API.
//! Callers never hold a real shop token: they send an encrypted credential
//! envelope in the `X-Shopify-Access-Token` header, and the proxy decrypts
//! it, checks the requested operation against a fixed allowlist, and relays
//! the upstream response verbatim.
//!
//! ## Request pipeline
//!
//! 1. **Decrypt** the envelope (AES-256-CBC, hex `iv:ciphertext` wire
//!    format) into the shop domain and real access token.
//! 2. **Classify** the GraphQL body as a named query or mutation and check
//!    it against the allowlist; anything else is rejected.
//! 3. **Forward** the untouched body to
//!    `https://{shop}/admin/api/{version}/graphql.json` and relay the
//!    upstream status and body unchanged, including upstream errors.
//!
//! ## Main Components
//!
//! - [`Gateway`]: the main entry point, created via [`GatewayBuilder`].
//! - [`CredentialCodec`]: encrypt/decrypt of the credential envelope.
//! - [`OperationClassifier`]: operation classification and admission.
//! - [`UpstreamForwarder`]: the outbound HTTP call, behind the [`Forward`]
//!   trait so it can be substituted in tests.
//! - [`GatewayPipeline`]: the per-request state machine tying them together.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shopify_token_proxy::{AllowedOperations, EncryptionKey, Gateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = EncryptionKey::parse(&std::env::var("ENCRYPTION_KEY")?)?;
//!
//!     let gateway = Gateway::builder()
//!         .encryption_key(key)
//!         .allowed_operations(AllowedOperations::shopify_billing())
//!         .build()?;
//!
//!     gateway.serve("0.0.0.0:8080").await?;
//!     Ok(())
//! }
//! ```

pub mod allowlist;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod runtime;
pub mod upstream;

pub use allowlist::{
    AllowedOperations, Classification, GraphQlRequestBody, OperationClassifier, OperationKind,
};
pub use credential::{CredentialCodec, EncryptionKey, ShopCredential, IV_LEN, KEY_LEN};
pub use error::{Error, Result};
pub use gateway::{Gateway, GatewayBuilder};
pub use pipeline::{GatewayPipeline, GatewayResponse};
pub use runtime::ProxyMux;
pub use upstream::{
    Forward, UpstreamConfig, UpstreamForwarder, UpstreamResponse, ACCESS_TOKEN_HEADER,
    DEFAULT_API_VERSION,
};
