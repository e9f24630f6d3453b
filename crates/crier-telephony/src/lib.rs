//! Telephony provider client for crier.
//!
//! Wraps the provider's REST API behind two capabilities: place an outbound
//! call that plays an audio bulletin, and fetch the current status of a
//! previously placed call.

mod client;
mod error;
mod types;

pub use client::VoiceClient;
pub use error::ProviderError;
pub use types::ProviderStatus;
