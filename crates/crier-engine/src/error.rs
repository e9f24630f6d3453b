//! Error types for the scheduling core.

use thiserror::Error;

/// Errors that can occur in the scheduling core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Roster store error.
    #[error("roster error: {0}")]
    Roster(#[from] crier_roster::RosterError),

    /// Telephony provider error.
    #[error("provider error: {0}")]
    Provider(#[from] crier_telephony::ProviderError),

    /// A timezone offset that could not be parsed.
    #[error("invalid timezone offset: {0}")]
    InvalidZone(String),

    /// A persisted timestamp cell that could not be parsed.
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// A status cell holding an unknown value.
    #[error("unknown call status: '{0}'")]
    InvalidStatus(String),

    /// An attempts cell holding a non-numeric value.
    #[error("invalid attempts count: '{0}'")]
    InvalidAttempts(String),

    /// A roster row missing a required field.
    #[error("row {row} is missing required field {field}")]
    MissingField { row: u32, field: &'static str },

    /// The media library file could not be read.
    #[error("failed to read media library {path}: {source}")]
    MediaLibraryIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The media library file is not valid JSON.
    #[error("failed to parse media library {path}: {source}")]
    MediaLibraryParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
