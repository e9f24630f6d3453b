//! Sheet layout constants and range helpers.
//!
//! Column indices are 1-based to match the write-back API. Columns 1-8 carry
//! identity, scheduling, and call state; column 9 persists the attempt
//! counter.

/// Recipient display name.
pub const COL_NAME: u32 = 1;

/// Recipient phone number in E.164 form.
pub const COL_PHONE_NUMBER: u32 = 2;

/// Recipient location, the key into the media library.
pub const COL_LOCATION: u32 = 3;

/// Scheduled call instant (daily sheets) or time-of-day (template sheet).
pub const COL_CALL_TIME: u32 = 4;

/// Persisted call status.
pub const COL_CALL_STATUS: u32 = 5;

/// Instant of the most recent placement attempt.
pub const COL_LAST_CALLED: u32 = 6;

/// Instant the next retry is due.
pub const COL_RETRY_AT: u32 = 7;

/// Opaque call handle from the telephony provider.
pub const COL_CALL_SID: u32 = 8;

/// Count of placement attempts so far.
pub const COL_ATTEMPTS: u32 = 9;

/// Header row written when a daily sheet is provisioned.
pub const HEADER: [&str; 9] = [
    "Name",
    "PhoneNumber",
    "Location",
    "CallTime",
    "CallStatus",
    "LastCalled",
    "RetryAt",
    "CallSid",
    "Attempts",
];

/// Data range below the header row, covering all columns.
pub const DATA_RANGE: &str = "A2:I";

/// Format for persisted instants, interpreted under the reference timezone.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the time-of-day cell in the template sheet.
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S";

/// Format of a daily sheet title.
pub const SHEET_TITLE_FORMAT: &str = "%d%m%Y";

/// The column letter for a 1-based column index.
///
/// The layout never exceeds column Z, so a single letter suffices.
pub fn column_letter(column: u32) -> char {
    debug_assert!((1..=26).contains(&column));
    (b'A' + (column - 1) as u8) as char
}

/// A1 range addressing a single cell, with the sheet title quoted so that
/// all-digit daily titles parse as titles rather than row numbers.
pub fn cell_range(sheet: &str, row: u32, column: u32) -> String {
    format!("'{}'!{}{}", sheet, column_letter(column), row)
}

/// A1 range addressing the data rows of a sheet.
pub fn data_range(sheet: &str) -> String {
    format!("'{}'!{}", sheet, DATA_RANGE)
}
