//! Client error types.

use thiserror::Error;

/// Errors returned by calls to the Nautobot API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("api returned status {status}")]
    Api { status: u16, body: String },

    /// Response body could not be decoded.
    #[error("decode: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    /// GraphQL returned an `errors` array.
    #[error("graphql: {0}")]
    GraphQl(String),

    /// The reconciliation was cancelled while the request was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Raw response body attached to the error, for report lines.
    pub fn response_body(&self) -> &str {
        match self {
            ClientError::Api { body, .. } | ClientError::Decode { body, .. }
                if !body.is_empty() =>
            {
                body
            }
            _ => "nil or empty body from remote",
        }
    }

    /// HTTP status code, if the API answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
