//! Error types for the token proxy

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the proxy
///
/// Every failure mode of the request pipeline maps onto exactly one of these
/// variants, and each variant maps onto one HTTP status and one fixed client
/// message. The full `Display` text is for logs only.
#[derive(Error, Debug)]
pub enum Error {
    /// The inbound request carried no credential header
    #[error("missing credential header")]
    MissingCredential,

    /// The credential envelope could not be decrypted
    #[error("credential decryption failed: {0}")]
    Decryption(String),

    /// The decrypted credential payload is not the expected structure
    #[error("malformed credential payload: {0}")]
    MalformedCredential(String),

    /// The inbound GraphQL request body could not be parsed
    #[error("malformed request body: {0}")]
    MalformedRequest(String),

    /// The requested operation is not on the allowlist
    #[error("operation not allowed")]
    OperationNotAllowed,

    /// Upstream call failed at the transport level
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error("error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// HTTP status this error surfaces as
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingCredential => StatusCode::BAD_REQUEST,
            Error::Decryption(_) | Error::MalformedCredential(_) => StatusCode::UNAUTHORIZED,
            Error::MalformedRequest(_) | Error::OperationNotAllowed => StatusCode::FORBIDDEN,
            Error::Upstream(_) | Error::Serialization(_) | Error::Io(_) | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Fixed message returned to the caller
    ///
    /// # Security
    ///
    /// These are static per category. Decrypted tokens, shop domains, and key
    /// material must never reach the response body, so the caller-facing text
    /// carries no detail from the underlying failure.
    pub fn client_message(&self) -> &'static str {
        match self {
            Error::MissingCredential => "Missing X-Shopify-Access-Token header",
            Error::Decryption(_) | Error::MalformedCredential(_) => "Invalid shop token",
            Error::MalformedRequest(_) | Error::OperationNotAllowed => "Operation not allowed",
            Error::Upstream(_) | Error::Serialization(_) | Error::Io(_) | Error::Other(_) => {
                "Internal server error"
            }
        }
    }

    /// JSON body for an error response: `{"error": <message>}`
    pub fn to_error_body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.client_message() })
    }
}
