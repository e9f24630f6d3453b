//! Call scheduling core for crier.
//!
//! This crate owns the per-recipient call lifecycle:
//! - Typed [`CallRecord`]s decoded from roster rows
//! - The pure call state machine ([`decide`] and its outcome appliers)
//! - The time/retry policy ([`RetryPolicy`], [`ReferenceZone`])
//! - The [`Driver`] that runs one pass over the day's roster

mod driver;
mod error;
mod machine;
mod media;
mod policy;
mod record;

pub use driver::{Driver, PassSummary};
pub use error::EngineError;
pub use machine::{Action, apply_placement_failure, apply_placement_success, apply_poll, decide};
pub use media::MediaLibrary;
pub use policy::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_REFERENCE_OFFSET, DEFAULT_RETRY_DELAY_MINUTES, ReferenceZone,
    RetryPolicy,
};
pub use record::{CallRecord, CallStatus, FieldUpdates};
