//! Error types for pdsx

use thiserror::Error;

/// Errors surfaced by record operations, identity resolution and parsing
#[derive(Debug, Error)]
pub enum PdsxError {
    /// AT-URI did not have two or three path segments
    #[error("invalid URI format: {0}")]
    InvalidUri(String),

    /// Shorthand `collection/rkey` used without a repo identity
    #[error("shorthand URI requires authentication")]
    AuthRequired,

    /// Write attempted (or credentials missing) without a session
    #[error("not authenticated: provide --handle/--password or set ATPROTO_HANDLE/ATPROTO_PASSWORD")]
    NotAuthenticated,

    /// Handle could not be resolved to a DID
    #[error("could not resolve handle: {0}")]
    HandleUnresolved(String),

    /// DID document has no PDS service endpoint
    #[error("could not find PDS for: {0}")]
    PdsNotFound(String),

    /// Malformed key=value token, JSON value or JSON Lines input
    #[error("{0}")]
    InvalidArgument(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// XRPC endpoint returned an error body
    #[error("{error} ({status}): {message}")]
    Xrpc {
        status: u16,
        error: String,
        message: String,
    },

    /// Response body could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Local I/O failed (stdin, blob file)
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl PdsxError {
    /// Whether this error came from talking to a remote service
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PdsxError::Http(_) | PdsxError::Xrpc { .. } | PdsxError::InvalidResponse(_)
        )
    }
}

/// Result type for pdsx operations
pub type Result<T> = std::result::Result<T, PdsxError>;
