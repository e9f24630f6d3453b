//! Error types for the roster store client.

use thiserror::Error;

/// Errors that can occur when interacting with the roster store.
#[derive(Debug, Error)]
pub enum RosterError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from the sheet API.
    #[error("sheet API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Sheet not found in the workbook.
    #[error("sheet not found: {title}")]
    SheetNotFound { title: String },

    /// Rate limited.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited {
        /// Seconds to wait before retrying (from Retry-After header, optional).
        retry_after_secs: Option<u64>,
    },

    /// Invalid response from server.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
