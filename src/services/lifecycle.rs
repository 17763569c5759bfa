use std::fmt;

use chrono::{Duration, NaiveDateTime};

use crate::db::queries;
use crate::models::{BookingStatus, CourtStatus, EngineEvent, Occurrence, OccurrenceStatus};
use crate::state::AppState;

#[derive(Debug)]
pub enum LifecycleError {
    NotFound,
    AlreadyCheckedIn,
    NotCheckedIn,
    InvalidState(OccurrenceStatus),
    HoldUnpaid,
    BookingCancelled,
    NotWithinWindow {
        opens_at: NaiveDateTime,
        closes_at: NaiveDateTime,
    },
    Internal(anyhow::Error),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::NotFound => write!(f, "occurrence not found"),
            LifecycleError::AlreadyCheckedIn => write!(f, "occurrence is already checked in"),
            LifecycleError::NotCheckedIn => write!(f, "occurrence is not checked in"),
            LifecycleError::InvalidState(s) => {
                write!(f, "occurrence is {} and cannot change", s.as_str())
            }
            LifecycleError::HoldUnpaid => {
                write!(f, "booking payment is still pending, cannot check in")
            }
            LifecycleError::BookingCancelled => write!(f, "booking is cancelled"),
            LifecycleError::NotWithinWindow { opens_at, closes_at } => write!(
                f,
                "check-in is open from {} to {}",
                opens_at.format("%Y-%m-%d %H:%M"),
                closes_at.format("%Y-%m-%d %H:%M")
            ),
            LifecycleError::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl From<anyhow::Error> for LifecycleError {
    fn from(e: anyhow::Error) -> Self {
        LifecycleError::Internal(e)
    }
}

impl From<rusqlite::Error> for LifecycleError {
    fn from(e: rusqlite::Error) -> Self {
        LifecycleError::Internal(e.into())
    }
}

/// Front-desk check-in. The slot must belong to a paid (Active) booking and
/// the venue clock must sit inside `[start - lead, end]`.
pub fn check_in(state: &AppState, occurrence_id: &str) -> Result<Occurrence, LifecycleError> {
    let now = state.now_utc();
    let now_local = state.now_local();
    let lead = state.config.checkin_lead_minutes;

    let updated = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;

        let occ = queries::get_occurrence(&tx, occurrence_id)?.ok_or(LifecycleError::NotFound)?;
        if occ.status == OccurrenceStatus::CheckedIn {
            return Err(LifecycleError::AlreadyCheckedIn);
        }
        if occ.status.is_terminal() {
            return Err(LifecycleError::InvalidState(occ.status));
        }

        let booking =
            queries::get_booking(&tx, &occ.booking_id)?.ok_or(LifecycleError::NotFound)?;
        match booking.status {
            BookingStatus::PendingPayment => return Err(LifecycleError::HoldUnpaid),
            BookingStatus::Cancelled => return Err(LifecycleError::BookingCancelled),
            BookingStatus::Active => {}
        }

        let opens_at = NaiveDateTime::new(occ.date, occ.start_time) - Duration::minutes(lead);
        let closes_at = NaiveDateTime::new(occ.date, occ.end_time);
        if now_local < opens_at || now_local > closes_at {
            return Err(LifecycleError::NotWithinWindow { opens_at, closes_at });
        }

        let moved = queries::update_occurrence_status_if(
            &tx,
            occurrence_id,
            OccurrenceStatus::Active,
            OccurrenceStatus::CheckedIn,
            &now,
        )?;
        if !moved {
            return Err(LifecycleError::AlreadyCheckedIn);
        }
        queries::set_court_status(&tx, &occ.court_id, CourtStatus::InUse)?;

        let updated =
            queries::get_occurrence(&tx, occurrence_id)?.ok_or(LifecycleError::NotFound)?;
        tx.commit()?;
        updated
    };

    state.publish(EngineEvent::occurrence_updated(occurrence_id));
    tracing::info!(occurrence_id, court_id = %updated.court_id, "checked in");
    Ok(updated)
}

/// Plain check-out with no billing: Completed, court released. Settling the
/// session's bill is checkout's job.
pub fn check_out(
    state: &AppState,
    occurrence_id: &str,
    note: Option<&str>,
) -> Result<Occurrence, LifecycleError> {
    let now = state.now_utc();

    let updated = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;

        let occ = queries::get_occurrence(&tx, occurrence_id)?.ok_or(LifecycleError::NotFound)?;
        if occ.status != OccurrenceStatus::CheckedIn {
            return Err(LifecycleError::NotCheckedIn);
        }

        let moved = queries::update_occurrence_status_if(
            &tx,
            occurrence_id,
            OccurrenceStatus::CheckedIn,
            OccurrenceStatus::Completed,
            &now,
        )?;
        if !moved {
            return Err(LifecycleError::NotCheckedIn);
        }
        if let Some(note) = note {
            queries::set_occurrence_note(&tx, occurrence_id, note, &now)?;
        }
        queries::set_court_status_if(&tx, &occ.court_id, CourtStatus::InUse, CourtStatus::Active)?;

        let updated =
            queries::get_occurrence(&tx, occurrence_id)?.ok_or(LifecycleError::NotFound)?;
        tx.commit()?;
        updated
    };

    state.publish(EngineEvent::occurrence_updated(occurrence_id));
    tracing::info!(occurrence_id, "checked out");
    Ok(updated)
}

/// Cancels a single slot. Terminal slots are left as they are and returned
/// unchanged; a running session has to check out instead.
pub fn cancel_occurrence(
    state: &AppState,
    occurrence_id: &str,
    note: Option<&str>,
) -> Result<Occurrence, LifecycleError> {
    transition_from_active(state, occurrence_id, OccurrenceStatus::Cancelled, note)
}

/// Flags a slot the customer never showed up for.
pub fn mark_no_show(state: &AppState, occurrence_id: &str) -> Result<Occurrence, LifecycleError> {
    transition_from_active(state, occurrence_id, OccurrenceStatus::NoShow, None)
}

fn transition_from_active(
    state: &AppState,
    occurrence_id: &str,
    to: OccurrenceStatus,
    note: Option<&str>,
) -> Result<Occurrence, LifecycleError> {
    let now = state.now_utc();

    let updated = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;

        let occ = queries::get_occurrence(&tx, occurrence_id)?.ok_or(LifecycleError::NotFound)?;
        if occ.status.is_terminal() {
            // Re-cancelling a dead slot changes nothing.
            return Ok(occ);
        }
        if occ.status == OccurrenceStatus::CheckedIn {
            return Err(LifecycleError::AlreadyCheckedIn);
        }

        queries::update_occurrence_status_if(
            &tx,
            occurrence_id,
            OccurrenceStatus::Active,
            to,
            &now,
        )?;
        if let Some(note) = note {
            queries::set_occurrence_note(&tx, occurrence_id, note, &now)?;
        }

        let updated =
            queries::get_occurrence(&tx, occurrence_id)?.ok_or(LifecycleError::NotFound)?;
        tx.commit()?;
        updated
    };

    state.publish(EngineEvent::occurrence_updated(occurrence_id));
    tracing::info!(occurrence_id, status = to.as_str(), "occurrence closed");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::{Court, PaymentMethod};
    use crate::services::booking::{self, NewBooking};
    use crate::services::clock::Clock;
    use crate::services::notify::{Notification, NotificationDispatcher};
    use crate::services::vouchers::SqliteVoucherStore;
    use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
    use std::sync::{Arc, Mutex};

    struct FixedClock(NaiveDateTime);
    impl Clock for FixedClock {
        fn now_utc(&self) -> DateTime<Utc> {
            self.0.and_utc()
        }
    }

    struct NullNotifier;
    #[async_trait::async_trait]
    impl NotificationDispatcher for NullNotifier {
        async fn dispatch(&self, _notification: &Notification) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn test_state(now: &str) -> AppState {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        db::migrations::run_migrations(&conn).unwrap();
        let (events_tx, _) = tokio::sync::broadcast::channel(16);
        let config = AppConfig {
            tz_offset_minutes: 0,
            ..AppConfig::default()
        };
        AppState {
            db: Arc::new(Mutex::new(conn)),
            config,
            clock: Box::new(FixedClock(dt(now))),
            notifier: Box::new(NullNotifier),
            vouchers: Box::new(SqliteVoucherStore),
            events_tx,
        }
    }

    /// One cash booking on court-1, 2025-06-16 10:00-11:00. Returns the
    /// occurrence id.
    fn seed_session(state: &AppState, method: PaymentMethod) -> String {
        {
            let db = state.db.lock().unwrap();
            let now = dt("2025-06-01 00:00:00");
            queries::insert_court(
                &db,
                &Court {
                    id: "court-1".to_string(),
                    name: "Court 1".to_string(),
                    status: CourtStatus::Active,
                    created_at: now,
                },
            )
            .unwrap();
            queries::insert_customer(&db, "Lan", None, Some("0900000001"), &now).unwrap();
            queries::insert_pricing_rule(
                &db,
                &crate::models::PricingRule {
                    id: 0,
                    court_id: "court-1".to_string(),
                    days_of_week: vec![2, 3, 4, 5, 6, 7, 8],
                    start_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                    price_per_hour: 100_000,
                    rule_order: 1,
                },
            )
            .unwrap();
        }
        let created = booking::create_booking(
            state,
            NewBooking {
                customer_id: 1,
                court_id: "court-1".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
                days_of_week: vec![],
                start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                payment_method: method,
                voucher_id: None,
                note: None,
            },
        )
        .unwrap();
        created.occurrences[0].id.clone()
    }

    #[test]
    fn check_in_inside_window_marks_court_in_use() {
        let state = test_state("2025-06-16 09:55:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);

        let occ = check_in(&state, &occ_id).unwrap();
        assert_eq!(occ.status, OccurrenceStatus::CheckedIn);

        let db = state.db.lock().unwrap();
        let court = queries::get_court(&db, "court-1").unwrap().unwrap();
        assert_eq!(court.status, CourtStatus::InUse);
    }

    #[test]
    fn check_in_too_early_or_too_late_is_rejected() {
        let state = test_state("2025-06-16 09:40:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);
        assert!(matches!(
            check_in(&state, &occ_id).unwrap_err(),
            LifecycleError::NotWithinWindow { .. }
        ));

        let state = test_state("2025-06-16 11:05:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);
        assert!(matches!(
            check_in(&state, &occ_id).unwrap_err(),
            LifecycleError::NotWithinWindow { .. }
        ));
    }

    #[test]
    fn check_in_window_edges_are_inclusive() {
        let state = test_state("2025-06-16 09:50:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);
        assert!(check_in(&state, &occ_id).is_ok());

        let state = test_state("2025-06-16 11:00:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);
        assert!(check_in(&state, &occ_id).is_ok());
    }

    #[test]
    fn unpaid_hold_cannot_check_in() {
        let state = test_state("2025-06-16 10:00:00");
        let occ_id = seed_session(&state, PaymentMethod::BankTransfer);
        assert!(matches!(
            check_in(&state, &occ_id).unwrap_err(),
            LifecycleError::HoldUnpaid
        ));
    }

    #[test]
    fn double_check_in_is_rejected() {
        let state = test_state("2025-06-16 10:00:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);
        check_in(&state, &occ_id).unwrap();
        assert!(matches!(
            check_in(&state, &occ_id).unwrap_err(),
            LifecycleError::AlreadyCheckedIn
        ));
    }

    #[test]
    fn check_out_completes_and_releases_court() {
        let state = test_state("2025-06-16 10:00:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);
        check_in(&state, &occ_id).unwrap();

        let occ = check_out(&state, &occ_id, Some("rackets returned")).unwrap();
        assert_eq!(occ.status, OccurrenceStatus::Completed);
        assert_eq!(occ.note.as_deref(), Some("rackets returned"));

        let db = state.db.lock().unwrap();
        let court = queries::get_court(&db, "court-1").unwrap().unwrap();
        assert_eq!(court.status, CourtStatus::Active);
    }

    #[test]
    fn check_out_requires_checked_in() {
        let state = test_state("2025-06-16 10:00:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);
        assert!(matches!(
            check_out(&state, &occ_id, None).unwrap_err(),
            LifecycleError::NotCheckedIn
        ));
    }

    #[test]
    fn cancel_is_idempotent_but_blocked_mid_session() {
        let state = test_state("2025-06-16 09:00:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);

        let occ = cancel_occurrence(&state, &occ_id, Some("rain")).unwrap();
        assert_eq!(occ.status, OccurrenceStatus::Cancelled);

        // Second cancel: no-op, still cancelled.
        let occ = cancel_occurrence(&state, &occ_id, None).unwrap();
        assert_eq!(occ.status, OccurrenceStatus::Cancelled);

        let state = test_state("2025-06-16 10:00:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);
        check_in(&state, &occ_id).unwrap();
        assert!(cancel_occurrence(&state, &occ_id, None).is_err());
    }

    #[test]
    fn no_show_flags_active_slot() {
        let state = test_state("2025-06-16 11:30:00");
        let occ_id = seed_session(&state, PaymentMethod::Cash);

        let occ = mark_no_show(&state, &occ_id).unwrap();
        assert_eq!(occ.status, OccurrenceStatus::NoShow);

        // Repeating is a no-op.
        let occ = mark_no_show(&state, &occ_id).unwrap();
        assert_eq!(occ.status, OccurrenceStatus::NoShow);
    }
}
