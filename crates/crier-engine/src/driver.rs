//! The scheduling driver: one pass over the day's roster.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crier_roster::{Row, RosterClient};
use crier_telephony::VoiceClient;

use crate::error::EngineError;
use crate::machine::{
    Action, apply_placement_failure, apply_placement_success, apply_poll, decide,
};
use crate::media::MediaLibrary;
use crate::policy::{ReferenceZone, RetryPolicy};
use crate::record::{CallRecord, CallStatus, FieldUpdates};

/// What one pass did, for the end-of-pass log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Status polls issued.
    pub polled: usize,
    /// Calls handed to the provider.
    pub placed: usize,
    /// Records finalized as Delivered.
    pub delivered: usize,
    /// Retries scheduled (poll-driven or placement-failure).
    pub retries_scheduled: usize,
    /// Records finalized as Failed.
    pub failed: usize,
    /// Due records skipped for want of a media mapping.
    pub skipped_no_media: usize,
    /// Row-level failures observed during the pass. A row can contribute
    /// more than once (e.g. unparseable in both phases).
    pub row_errors: usize,
}

/// Drives the day's roster through one state-machine pass per invocation.
///
/// Holds the collaborators and policy it was constructed with; nothing here
/// is ambient or global.
pub struct Driver {
    roster: RosterClient,
    provider: VoiceClient,
    media: MediaLibrary,
    policy: RetryPolicy,
    zone: ReferenceZone,
}

impl Driver {
    /// Create a driver over the given collaborators.
    pub fn new(
        roster: RosterClient,
        provider: VoiceClient,
        media: MediaLibrary,
        policy: RetryPolicy,
        zone: ReferenceZone,
    ) -> Self {
        Self {
            roster,
            provider,
            media,
            policy,
            zone,
        }
    }

    /// The roster client this driver commits through.
    pub fn roster(&self) -> &RosterClient {
        &self.roster
    }

    /// The reference timezone persisted instants are formatted in.
    pub fn zone(&self) -> &ReferenceZone {
        &self.zone
    }

    /// Run one pass over the given daily sheet.
    ///
    /// The pass is two-phased: outstanding polls and poll-driven retries are
    /// resolved and committed first, then the sheet is re-read and new
    /// placements resolved. The re-read matters — a record the poll phase
    /// just finalized or pushed into a future retry must not also look
    /// placeable in the same pass. Per-row failures are isolated; only a
    /// failure to read the sheet aborts the pass.
    pub async fn run_once(
        &self,
        sheet: &str,
        now: DateTime<Utc>,
    ) -> Result<PassSummary, EngineError> {
        let mut summary = PassSummary::default();

        // Phase 1: resolve what the provider already knows.
        let rows = self.roster.rows(sheet).await?;
        debug!(sheet, rows = rows.len(), "poll phase");
        for row in &rows {
            let Some(record) = self.parse_row(row, &mut summary) else {
                continue;
            };
            if let Action::PollStatus { call_id } = decide(&record, now, &self.media) {
                self.poll_one(sheet, &record, &call_id, now, &mut summary)
                    .await;
            }
        }

        // Phase 2: place calls that are due, against fresh rows.
        let rows = self.roster.rows(sheet).await?;
        debug!(sheet, rows = rows.len(), "placement phase");
        for row in &rows {
            let Some(record) = self.parse_row(row, &mut summary) else {
                continue;
            };
            match decide(&record, now, &self.media) {
                Action::PlaceCall { media_url } => {
                    self.place_one(sheet, &record, &media_url, now, &mut summary)
                        .await;
                }
                Action::SkipNoMedia => {
                    warn!(
                        row = record.row,
                        location = %record.location,
                        "no media mapping for location, leaving row pending"
                    );
                    summary.skipped_no_media += 1;
                }
                // Polls were phase 1's job; never poll the same row twice.
                Action::PollStatus { .. } | Action::None => {}
            }
        }

        info!(
            sheet,
            polled = summary.polled,
            placed = summary.placed,
            delivered = summary.delivered,
            retries_scheduled = summary.retries_scheduled,
            failed = summary.failed,
            skipped_no_media = summary.skipped_no_media,
            row_errors = summary.row_errors,
            "pass complete"
        );
        Ok(summary)
    }

    fn parse_row(&self, row: &Row, summary: &mut PassSummary) -> Option<CallRecord> {
        match CallRecord::from_row(row, &self.zone) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(row = row.index, error = %e, "skipping unparseable row");
                summary.row_errors += 1;
                None
            }
        }
    }

    async fn poll_one(
        &self,
        sheet: &str,
        record: &CallRecord,
        call_id: &str,
        now: DateTime<Utc>,
        summary: &mut PassSummary,
    ) {
        summary.polled += 1;

        let status = match self.provider.fetch_status(call_id).await {
            Ok(status) => status,
            Err(e) => {
                // Indeterminate, not failed: the next pass asks again.
                warn!(
                    row = record.row,
                    call_id,
                    error = %e,
                    "status fetch failed, leaving record unchanged"
                );
                summary.row_errors += 1;
                return;
            }
        };

        let updates = apply_poll(record, &status, now, &self.policy);
        if updates.is_empty() {
            debug!(row = record.row, status = %status, "call still in progress");
            return;
        }

        info!(
            row = record.row,
            phone = %record.phone_number,
            provider_status = %status,
            new_status = %updates.status.unwrap_or(record.status),
            "poll resolved"
        );
        self.count_outcome(&updates, summary);
        self.commit(sheet, record, &updates, summary).await;
    }

    async fn place_one(
        &self,
        sheet: &str,
        record: &CallRecord,
        media_url: &str,
        now: DateTime<Utc>,
        summary: &mut PassSummary,
    ) {
        info!(
            row = record.row,
            phone = %record.phone_number,
            attempt = record.attempts + 1,
            "placing call"
        );

        let updates = match self.provider.place_call(&record.phone_number, media_url).await {
            Ok(call_id) => {
                summary.placed += 1;
                apply_placement_success(record, call_id, now)
            }
            Err(e) => {
                warn!(
                    row = record.row,
                    phone = %record.phone_number,
                    error = %e,
                    "placement failed"
                );
                let updates = apply_placement_failure(record, now, &self.policy);
                self.count_outcome(&updates, summary);
                updates
            }
        };

        self.commit(sheet, record, &updates, summary).await;
    }

    fn count_outcome(&self, updates: &FieldUpdates, summary: &mut PassSummary) {
        match updates.status {
            Some(CallStatus::Delivered) => summary.delivered += 1,
            Some(CallStatus::Failed) => summary.failed += 1,
            Some(CallStatus::RetryScheduled) => summary.retries_scheduled += 1,
            _ => {}
        }
    }

    /// Write a transition's cells back to the sheet.
    ///
    /// A write failure is isolated like any other per-row failure; the
    /// record simply re-converges on a later pass.
    async fn commit(
        &self,
        sheet: &str,
        record: &CallRecord,
        updates: &FieldUpdates,
        summary: &mut PassSummary,
    ) {
        for (column, value) in updates.cells(&self.zone) {
            if let Err(e) = self
                .roster
                .update_cell(sheet, record.row, column, &value)
                .await
            {
                warn!(
                    row = record.row,
                    column,
                    error = %e,
                    "failed to write cell, continuing"
                );
                summary.row_errors += 1;
            }
        }
    }
}
