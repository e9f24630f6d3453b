//! Error types for the telephony provider client.

use thiserror::Error;

/// Errors that can occur when interacting with the telephony provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from the provider API.
    #[error("provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider does not know the given call handle.
    #[error("call not found: {call_id}")]
    CallNotFound { call_id: String },

    /// Invalid response from server.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
