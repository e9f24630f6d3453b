//! Spreadsheet row-store client for crier's daily roster.
//!
//! This crate provides a client for the sheet API that persists call records,
//! plus provisioning of each day's roster sheet from the template sheet.
//!
//! ## Features
//!
//! - **HTTP Client**: ranged reads, single-cell writes, sheet management
//! - **Provisioning**: find-or-create of the daily sheet from the template
//! - **Layout**: column constants and timestamp formats shared with the engine

mod client;
mod error;
mod layout;
mod provision;
mod types;

pub use client::RosterClient;
pub use error::RosterError;
pub use layout::*;
pub use provision::{daily_sheet_title, ensure_daily_sheet};
pub use types::{Row, SheetProperties, ValueRange};
