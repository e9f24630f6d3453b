//! Typed call records and their roster-row codec.

use chrono::{DateTime, Utc};

use crier_roster::{
    COL_ATTEMPTS, COL_CALL_SID, COL_CALL_STATUS, COL_CALL_TIME, COL_LAST_CALLED, COL_LOCATION,
    COL_NAME, COL_PHONE_NUMBER, COL_RETRY_AT, Row,
};

use crate::error::EngineError;
use crate::policy::ReferenceZone;

/// Persisted lifecycle status of a recipient's call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallStatus {
    /// No call placed yet; the empty status cell.
    #[default]
    Unscheduled,
    /// A call is out with the provider and awaiting a final status.
    Initiated,
    /// A retry is scheduled; due at the record's `retry_at`.
    RetryScheduled,
    /// The call was delivered. Terminal.
    Delivered,
    /// The recipient could not be reached. Terminal.
    Failed,
}

impl CallStatus {
    /// The status cell string for this status.
    pub fn as_cell(&self) -> &'static str {
        match self {
            Self::Unscheduled => "",
            Self::Initiated => "Initiated",
            Self::RetryScheduled => "Retry Scheduled",
            Self::Delivered => "Delivered",
            Self::Failed => "Failed",
        }
    }

    /// Parse a status cell. An absent cell is Unscheduled.
    pub fn parse_cell(cell: Option<&str>) -> Result<Self, EngineError> {
        match cell {
            None | Some("") => Ok(Self::Unscheduled),
            Some("Initiated") => Ok(Self::Initiated),
            Some("Retry Scheduled") => Ok(Self::RetryScheduled),
            Some("Delivered") => Ok(Self::Delivered),
            Some("Failed") => Ok(Self::Failed),
            Some(other) => Err(EngineError::InvalidStatus(other.to_string())),
        }
    }

    /// Whether this status permits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unscheduled => write!(f, "Unscheduled"),
            other => write!(f, "{}", other.as_cell()),
        }
    }
}

/// One recipient's call record for the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// 1-based sheet row this record was read from.
    pub row: u32,
    /// Recipient display name.
    pub name: String,
    /// Recipient phone number.
    pub phone_number: String,
    /// Location key into the media library.
    pub location: String,
    /// When the first call attempt is due.
    pub scheduled_at: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: CallStatus,
    /// Instant of the most recent placement attempt.
    pub last_called_at: Option<DateTime<Utc>>,
    /// When the next retry is due. Set iff status is RetryScheduled.
    pub retry_at: Option<DateTime<Utc>>,
    /// Provider call handle. Unset until a call is placed successfully.
    pub call_id: Option<String>,
    /// Placed-call attempts so far.
    pub attempts: u32,
}

impl CallRecord {
    /// Decode a roster row into a typed record.
    ///
    /// Identity fields and the scheduled call time are required; everything
    /// else decodes absent cells into `None`/zero.
    pub fn from_row(row: &Row, zone: &ReferenceZone) -> Result<Self, EngineError> {
        let required = |column: u32, field: &'static str| {
            row.cell(column)
                .map(str::to_string)
                .ok_or(EngineError::MissingField {
                    row: row.index,
                    field,
                })
        };

        let scheduled_at = zone.parse_timestamp(&required(COL_CALL_TIME, "CallTime")?)?;
        let last_called_at = row
            .cell(COL_LAST_CALLED)
            .map(|s| zone.parse_timestamp(s))
            .transpose()?;
        let retry_at = row
            .cell(COL_RETRY_AT)
            .map(|s| zone.parse_timestamp(s))
            .transpose()?;
        let attempts = row
            .cell(COL_ATTEMPTS)
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| EngineError::InvalidAttempts(s.to_string()))
            })
            .transpose()?
            .unwrap_or(0);

        Ok(Self {
            row: row.index,
            name: required(COL_NAME, "Name")?,
            phone_number: required(COL_PHONE_NUMBER, "PhoneNumber")?,
            location: required(COL_LOCATION, "Location")?,
            scheduled_at,
            status: CallStatus::parse_cell(row.cell(COL_CALL_STATUS))?,
            last_called_at,
            retry_at,
            call_id: row.cell(COL_CALL_SID).map(str::to_string),
            attempts,
        })
    }
}

/// Field mutations produced by a state-machine transition.
///
/// `None` means "leave the field alone"; for `retry_at`, `Some(None)` writes
/// the cell empty so the retry-due instant never outlives RetryScheduled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdates {
    pub status: Option<CallStatus>,
    pub last_called_at: Option<DateTime<Utc>>,
    pub retry_at: Option<Option<DateTime<Utc>>>,
    pub call_id: Option<String>,
    pub attempts: Option<u32>,
}

impl FieldUpdates {
    /// Whether this transition changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The cell writes realizing this transition, as (column, value) pairs.
    pub fn cells(&self, zone: &ReferenceZone) -> Vec<(u32, String)> {
        let mut cells = Vec::new();
        if let Some(status) = self.status {
            cells.push((COL_CALL_STATUS, status.as_cell().to_string()));
        }
        if let Some(at) = self.last_called_at {
            cells.push((COL_LAST_CALLED, zone.format(at)));
        }
        if let Some(retry_at) = &self.retry_at {
            let value = retry_at.map(|at| zone.format(at)).unwrap_or_default();
            cells.push((COL_RETRY_AT, value));
        }
        if let Some(call_id) = &self.call_id {
            cells.push((COL_CALL_SID, call_id.clone()));
        }
        if let Some(attempts) = self.attempts {
            cells.push((COL_ATTEMPTS, attempts.to_string()));
        }
        cells
    }

    /// Apply this transition to an in-memory record.
    pub fn apply(&self, record: &mut CallRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(at) = self.last_called_at {
            record.last_called_at = Some(at);
        }
        if let Some(retry_at) = self.retry_at {
            record.retry_at = retry_at;
        }
        if let Some(call_id) = &self.call_id {
            record.call_id = Some(call_id.clone());
        }
        if let Some(attempts) = self.attempts {
            record.attempts = attempts;
        }
    }
}
