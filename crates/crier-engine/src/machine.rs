//! The per-recipient call state machine.
//!
//! [`decide`] maps a record and the current instant to the next action; the
//! `apply_*` functions map an action's outcome to the field mutations to
//! persist. All of it is pure — the driver owns every side effect.

use chrono::{DateTime, Utc};

use crier_telephony::ProviderStatus;

use crate::media::MediaLibrary;
use crate::policy::RetryPolicy;
use crate::record::{CallRecord, CallStatus, FieldUpdates};

/// The next action for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do: not due yet, awaiting a final status, or terminal.
    None,
    /// Place a call playing the given audio.
    PlaceCall { media_url: String },
    /// Poll the provider for the call's current status.
    PollStatus { call_id: String },
    /// Due, but the location has no media mapping. The row stays pending so
    /// it is picked up again once the library is fixed.
    SkipNoMedia,
}

/// Decide the next action for a record at the given instant.
pub fn decide(record: &CallRecord, now: DateTime<Utc>, media: &MediaLibrary) -> Action {
    match record.status {
        CallStatus::Delivered | CallStatus::Failed => Action::None,

        CallStatus::Unscheduled => {
            if record.scheduled_at > now {
                return Action::None;
            }
            place_or_skip(record, media)
        }

        CallStatus::RetryScheduled => {
            // A missing retry_at gates nothing: the retry is considered due.
            if record.retry_at.is_some_and(|at| at > now) {
                return Action::None;
            }
            match &record.call_id {
                Some(call_id) => Action::PollStatus {
                    call_id: call_id.clone(),
                },
                // Placement failed last time; there is no call to poll.
                None => place_or_skip(record, media),
            }
        }

        CallStatus::Initiated => match &record.call_id {
            Some(call_id) => Action::PollStatus {
                call_id: call_id.clone(),
            },
            // Status says a call went out but no handle was persisted.
            // Re-placing is bounded by the attempts cap.
            None => place_or_skip(record, media),
        },
    }
}

fn place_or_skip(record: &CallRecord, media: &MediaLibrary) -> Action {
    match media.resolve(&record.location) {
        Some(url) => Action::PlaceCall {
            media_url: url.to_string(),
        },
        None => Action::SkipNoMedia,
    }
}

/// Field updates after the provider accepted a placement.
pub fn apply_placement_success(
    record: &CallRecord,
    call_id: String,
    now: DateTime<Utc>,
) -> FieldUpdates {
    FieldUpdates {
        status: Some(CallStatus::Initiated),
        last_called_at: Some(now),
        retry_at: record.retry_at.is_some().then_some(None),
        call_id: Some(call_id),
        attempts: Some(record.attempts + 1),
    }
}

/// Field updates after the provider rejected a placement.
///
/// The recipient is not silently dropped: the row becomes a bounded
/// placement retry (RetryScheduled without a call handle) until the attempts
/// cap finalizes it as Failed.
pub fn apply_placement_failure(
    record: &CallRecord,
    now: DateTime<Utc>,
    policy: &RetryPolicy,
) -> FieldUpdates {
    let attempts = record.attempts + 1;
    if policy.attempts_exhausted(attempts) {
        FieldUpdates {
            status: Some(CallStatus::Failed),
            last_called_at: Some(now),
            retry_at: record.retry_at.is_some().then_some(None),
            call_id: None,
            attempts: Some(attempts),
        }
    } else {
        FieldUpdates {
            status: Some(CallStatus::RetryScheduled),
            last_called_at: Some(now),
            retry_at: Some(Some(policy.next_retry_at(now))),
            call_id: None,
            attempts: Some(attempts),
        }
    }
}

/// Field updates after a status poll.
///
/// In-progress statuses change nothing. `completed` delivers. `busy` and
/// `no-answer` schedule a retry until the attempts cap is reached. A
/// provider-reported `failed` (or `canceled`) is terminal; a fetch *error*
/// never reaches this function — the driver treats it as indeterminate.
pub fn apply_poll(
    record: &CallRecord,
    status: &ProviderStatus,
    now: DateTime<Utc>,
    policy: &RetryPolicy,
) -> FieldUpdates {
    let clear_retry = record.retry_at.is_some().then_some(None);

    match status {
        ProviderStatus::Completed => FieldUpdates {
            status: Some(CallStatus::Delivered),
            retry_at: clear_retry,
            ..Default::default()
        },

        ProviderStatus::Busy | ProviderStatus::NoAnswer => {
            if policy.attempts_exhausted(record.attempts) {
                FieldUpdates {
                    status: Some(CallStatus::Failed),
                    retry_at: clear_retry,
                    ..Default::default()
                }
            } else {
                FieldUpdates {
                    status: Some(CallStatus::RetryScheduled),
                    retry_at: Some(Some(policy.next_retry_at(now))),
                    ..Default::default()
                }
            }
        }

        ProviderStatus::Failed | ProviderStatus::Canceled => FieldUpdates {
            status: Some(CallStatus::Failed),
            retry_at: clear_retry,
            ..Default::default()
        },

        ProviderStatus::Queued
        | ProviderStatus::Ringing
        | ProviderStatus::InProgress
        | ProviderStatus::Other(_) => FieldUpdates::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap()
    }

    fn media() -> MediaLibrary {
        [(
            "North".to_string(),
            "https://cdn.example.com/north.wav".to_string(),
        )]
        .into_iter()
        .collect()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(30, 4)
    }

    fn record(status: CallStatus) -> CallRecord {
        CallRecord {
            row: 2,
            name: "Asha".into(),
            phone_number: "+911234567890".into(),
            location: "North".into(),
            scheduled_at: now() - Duration::minutes(5),
            status,
            last_called_at: None,
            retry_at: None,
            call_id: None,
            attempts: 0,
        }
    }

    // === Unit Tests ===

    #[test]
    fn test_unscheduled_before_due_time() {
        let mut r = record(CallStatus::Unscheduled);
        r.scheduled_at = now() + Duration::minutes(5);
        assert_eq!(decide(&r, now(), &media()), Action::None);
    }

    #[test]
    fn test_unscheduled_due_places_call() {
        let r = record(CallStatus::Unscheduled);
        assert_eq!(
            decide(&r, now(), &media()),
            Action::PlaceCall {
                media_url: "https://cdn.example.com/north.wav".into()
            }
        );
    }

    #[test]
    fn test_unscheduled_due_at_exact_instant() {
        let mut r = record(CallStatus::Unscheduled);
        r.scheduled_at = now();
        assert!(matches!(
            decide(&r, now(), &media()),
            Action::PlaceCall { .. }
        ));
    }

    #[test]
    fn test_unscheduled_unmapped_location_skips() {
        let mut r = record(CallStatus::Unscheduled);
        r.location = "Atlantis".into();
        assert_eq!(decide(&r, now(), &media()), Action::SkipNoMedia);
    }

    #[test]
    fn test_initiated_polls() {
        let mut r = record(CallStatus::Initiated);
        r.call_id = Some("CA0001".into());
        assert_eq!(
            decide(&r, now(), &media()),
            Action::PollStatus {
                call_id: "CA0001".into()
            }
        );
    }

    #[test]
    fn test_retry_not_yet_due() {
        let mut r = record(CallStatus::RetryScheduled);
        r.call_id = Some("CA0001".into());
        r.retry_at = Some(now() + Duration::minutes(1));
        assert_eq!(decide(&r, now(), &media()), Action::None);
    }

    #[test]
    fn test_retry_due_polls() {
        let mut r = record(CallStatus::RetryScheduled);
        r.call_id = Some("CA0001".into());
        r.retry_at = Some(now() - Duration::minutes(1));
        assert!(matches!(
            decide(&r, now(), &media()),
            Action::PollStatus { .. }
        ));
    }

    #[test]
    fn test_retry_without_handle_replaces() {
        let mut r = record(CallStatus::RetryScheduled);
        r.retry_at = Some(now() - Duration::minutes(1));
        r.attempts = 1;
        assert!(matches!(
            decide(&r, now(), &media()),
            Action::PlaceCall { .. }
        ));
    }

    #[test]
    fn test_retry_missing_due_time_is_due() {
        let mut r = record(CallStatus::RetryScheduled);
        r.call_id = Some("CA0001".into());
        assert!(matches!(
            decide(&r, now(), &media()),
            Action::PollStatus { .. }
        ));
    }

    #[test]
    fn test_terminal_records_never_act() {
        for status in [CallStatus::Delivered, CallStatus::Failed] {
            let mut r = record(status);
            r.call_id = Some("CA0001".into());
            assert_eq!(decide(&r, now(), &media()), Action::None);
        }
    }

    #[test]
    fn test_placement_success_updates() {
        let r = record(CallStatus::Unscheduled);
        let updates = apply_placement_success(&r, "CA0001".into(), now());

        assert_eq!(updates.status, Some(CallStatus::Initiated));
        assert_eq!(updates.last_called_at, Some(now()));
        assert_eq!(updates.call_id.as_deref(), Some("CA0001"));
        assert_eq!(updates.attempts, Some(1));
        // Nothing to clear on a first placement
        assert_eq!(updates.retry_at, None);
    }

    #[test]
    fn test_replacement_success_clears_retry() {
        let mut r = record(CallStatus::RetryScheduled);
        r.retry_at = Some(now() - Duration::minutes(1));
        r.attempts = 1;

        let updates = apply_placement_success(&r, "CA0002".into(), now());
        assert_eq!(updates.retry_at, Some(None));
        assert_eq!(updates.attempts, Some(2));
    }

    #[test]
    fn test_placement_failure_schedules_bounded_retry() {
        let r = record(CallStatus::Unscheduled);
        let updates = apply_placement_failure(&r, now(), &policy());

        assert_eq!(updates.status, Some(CallStatus::RetryScheduled));
        assert_eq!(updates.retry_at, Some(Some(now() + Duration::minutes(30))));
        assert_eq!(updates.call_id, None);
        assert_eq!(updates.attempts, Some(1));
    }

    #[test]
    fn test_placement_failure_on_last_attempt_finalizes() {
        let mut r = record(CallStatus::RetryScheduled);
        r.attempts = 3;
        let updates = apply_placement_failure(&r, now(), &policy());

        assert_eq!(updates.status, Some(CallStatus::Failed));
        assert_eq!(updates.attempts, Some(4));
    }

    #[test]
    fn test_poll_completed_delivers() {
        let mut r = record(CallStatus::Initiated);
        r.call_id = Some("CA0001".into());
        r.attempts = 1;

        let updates = apply_poll(&r, &ProviderStatus::Completed, now(), &policy());
        assert_eq!(updates.status, Some(CallStatus::Delivered));
    }

    #[test]
    fn test_poll_no_answer_schedules_retry() {
        let mut r = record(CallStatus::Initiated);
        r.call_id = Some("CA0001".into());
        r.attempts = 1;

        let updates = apply_poll(&r, &ProviderStatus::NoAnswer, now(), &policy());
        assert_eq!(updates.status, Some(CallStatus::RetryScheduled));
        assert_eq!(updates.retry_at, Some(Some(now() + Duration::minutes(30))));
        // The retry places a fresh call; attempts count placements only
        assert_eq!(updates.attempts, None);
    }

    #[test]
    fn test_poll_busy_at_cap_finalizes() {
        let mut r = record(CallStatus::Initiated);
        r.call_id = Some("CA0004".into());
        r.attempts = 4;

        let updates = apply_poll(&r, &ProviderStatus::Busy, now(), &policy());
        assert_eq!(updates.status, Some(CallStatus::Failed));
    }

    #[test]
    fn test_poll_failed_is_terminal() {
        let mut r = record(CallStatus::Initiated);
        r.call_id = Some("CA0001".into());
        r.attempts = 1;

        let updates = apply_poll(&r, &ProviderStatus::Failed, now(), &policy());
        assert_eq!(updates.status, Some(CallStatus::Failed));
    }

    #[test]
    fn test_poll_in_progress_changes_nothing() {
        let mut r = record(CallStatus::Initiated);
        r.call_id = Some("CA0001".into());

        for status in [
            ProviderStatus::Queued,
            ProviderStatus::Ringing,
            ProviderStatus::InProgress,
            ProviderStatus::Other("answering-machine".into()),
        ] {
            let updates = apply_poll(&r, &status, now(), &policy());
            assert!(updates.is_empty(), "{status}");
        }
    }

    #[test]
    fn test_poll_clears_retry_on_delivery() {
        let mut r = record(CallStatus::RetryScheduled);
        r.call_id = Some("CA0001".into());
        r.retry_at = Some(now() - Duration::minutes(1));
        r.attempts = 2;

        let updates = apply_poll(&r, &ProviderStatus::Completed, now(), &policy());
        assert_eq!(updates.retry_at, Some(None));
    }

    // === Property-Based Tests ===

    fn any_status() -> impl Strategy<Value = CallStatus> {
        prop_oneof![
            Just(CallStatus::Unscheduled),
            Just(CallStatus::Initiated),
            Just(CallStatus::RetryScheduled),
            Just(CallStatus::Delivered),
            Just(CallStatus::Failed),
        ]
    }

    fn any_provider_status() -> impl Strategy<Value = ProviderStatus> {
        prop_oneof![
            Just(ProviderStatus::Queued),
            Just(ProviderStatus::Ringing),
            Just(ProviderStatus::InProgress),
            Just(ProviderStatus::Completed),
            Just(ProviderStatus::Busy),
            Just(ProviderStatus::NoAnswer),
            Just(ProviderStatus::Failed),
            Just(ProviderStatus::Canceled),
            "[a-z-]{1,20}".prop_map(ProviderStatus::Other),
        ]
    }

    proptest! {
        // Terminal records never act, whatever the clock says
        #[test]
        fn terminal_records_are_inert(
            offset_minutes in -10_000i64..10_000,
            delivered in proptest::bool::ANY,
        ) {
            let mut r = record(if delivered {
                CallStatus::Delivered
            } else {
                CallStatus::Failed
            });
            r.call_id = Some("CA0001".into());
            let at = now() + Duration::minutes(offset_minutes);

            prop_assert_eq!(decide(&r, at, &media()), Action::None);
        }

        // A record that is not due never triggers provider traffic
        #[test]
        fn future_records_never_act(lead_minutes in 1i64..10_000) {
            let mut r = record(CallStatus::Unscheduled);
            r.scheduled_at = now() + Duration::minutes(lead_minutes);

            prop_assert_eq!(decide(&r, now(), &media()), Action::None);
        }

        // A pending retry never fires early
        #[test]
        fn pending_retry_never_fires_early(lead_minutes in 1i64..10_000) {
            let mut r = record(CallStatus::RetryScheduled);
            r.call_id = Some("CA0001".into());
            r.retry_at = Some(now() + Duration::minutes(lead_minutes));

            prop_assert_eq!(decide(&r, now(), &media()), Action::None);
        }

        // decide never mutates its input; it only names the next action
        #[test]
        fn decide_is_pure(status in any_status(), offset_minutes in -10_000i64..10_000) {
            let mut r = record(status);
            r.call_id = Some("CA0001".into());
            let before = r.clone();
            let at = now() + Duration::minutes(offset_minutes);

            let first = decide(&r, at, &media());
            let second = decide(&r, at, &media());

            prop_assert_eq!(&r, &before);
            prop_assert_eq!(first, second);
        }

        // Poll outcomes never resurrect a cleared handle or rewrite identity
        #[test]
        fn poll_never_touches_placement_fields(status in any_provider_status()) {
            let mut r = record(CallStatus::Initiated);
            r.call_id = Some("CA0001".into());
            r.attempts = 1;

            let updates = apply_poll(&r, &status, now(), &policy());

            prop_assert_eq!(updates.call_id, None);
            prop_assert_eq!(updates.last_called_at, None);
        }

        // However many attempts have happened, a poll outcome lands in a
        // legal follow-up state
        #[test]
        fn poll_outcomes_stay_in_lifecycle(
            status in any_provider_status(),
            attempts in 0u32..10,
        ) {
            let mut r = record(CallStatus::Initiated);
            r.call_id = Some("CA0001".into());
            r.attempts = attempts;

            let updates = apply_poll(&r, &status, now(), &policy());

            match updates.status {
                None => prop_assert!(updates.is_empty()),
                Some(CallStatus::RetryScheduled) => {
                    prop_assert!(matches!(updates.retry_at, Some(Some(_))));
                    prop_assert!(!policy().attempts_exhausted(attempts));
                }
                Some(CallStatus::Delivered) | Some(CallStatus::Failed) => {
                    prop_assert!(updates.retry_at.unwrap_or(None).is_none());
                }
                Some(other) => prop_assert!(false, "illegal poll outcome: {}", other),
            }
        }

        // Placement outcomes always count the attempt
        #[test]
        fn placement_always_counts_attempt(attempts in 0u32..10, succeeded in proptest::bool::ANY) {
            let mut r = record(CallStatus::Unscheduled);
            r.attempts = attempts;

            let updates = if succeeded {
                apply_placement_success(&r, "CA0001".into(), now())
            } else {
                apply_placement_failure(&r, now(), &policy())
            };

            prop_assert_eq!(updates.attempts, Some(attempts + 1));
            prop_assert_eq!(updates.last_called_at, Some(now()));
        }
    }

    // === Metamorphic Tests ===

    // Dueness flips exactly at the scheduled instant: one second early is
    // inert, the instant itself acts.
    #[test]
    fn metamorphic_dueness_around_scheduled_instant() {
        let r = record(CallStatus::Unscheduled);

        let just_before = r.scheduled_at - Duration::seconds(1);
        let at = r.scheduled_at;

        assert_eq!(decide(&r, just_before, &media()), Action::None);
        assert!(matches!(decide(&r, at, &media()), Action::PlaceCall { .. }));
    }

    // Raising the cap by one converts exactly the boundary outcome from
    // Failed back to RetryScheduled.
    #[test]
    fn metamorphic_cap_boundary() {
        let mut r = record(CallStatus::Initiated);
        r.call_id = Some("CA0001".into());
        r.attempts = 4;

        let strict = apply_poll(&r, &ProviderStatus::Busy, now(), &RetryPolicy::new(30, 4));
        let relaxed = apply_poll(&r, &ProviderStatus::Busy, now(), &RetryPolicy::new(30, 5));

        assert_eq!(strict.status, Some(CallStatus::Failed));
        assert_eq!(relaxed.status, Some(CallStatus::RetryScheduled));
    }

    // The scheduled retry lands exactly retry_delay after the decision
    // instant, not after the last placement.
    #[test]
    fn metamorphic_retry_counts_from_now() {
        let mut r = record(CallStatus::Initiated);
        r.call_id = Some("CA0001".into());
        r.attempts = 1;
        r.last_called_at = Some(now() - Duration::minutes(90));

        let updates = apply_poll(&r, &ProviderStatus::Busy, now(), &policy());
        assert_eq!(updates.retry_at, Some(Some(now() + Duration::minutes(30))));
    }
}
