use std::fmt;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::db::queries;
use crate::models::{
    Booking, BookingStatus, CourtStatus, EngineEvent, Occurrence, OccurrenceStatus, Payment,
    PaymentMethod, PaymentStatus,
};
use crate::services::conflicts::{self, SlotConflict};
use crate::services::expansion::{self, ExpansionError};
use crate::services::payments;
use crate::services::pricing::{self, PricingError};
use crate::services::vouchers::VoucherCheck;
use crate::state::AppState;

pub struct NewBooking {
    pub customer_id: i64,
    pub court_id: String,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub days_of_week: Vec<u8>,
    pub start_time: chrono::NaiveTime,
    pub end_time: chrono::NaiveTime,
    pub payment_method: PaymentMethod,
    pub voucher_id: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub occurrences: Vec<Occurrence>,
    pub payment: Payment,
    pub qr_url: Option<String>,
}

#[derive(Debug)]
pub enum BookingError {
    CourtNotFound,
    CourtInactive,
    CustomerNotFound,
    Schedule(ExpansionError),
    Pricing(PricingError),
    Conflicts(Vec<SlotConflict>),
    Voucher(String),
    NotFound,
    Internal(anyhow::Error),
}

impl fmt::Display for BookingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingError::CourtNotFound => write!(f, "court not found"),
            BookingError::CourtInactive => write!(f, "court is not open for booking"),
            BookingError::CustomerNotFound => write!(f, "customer not found"),
            BookingError::Schedule(e) => write!(f, "{e}"),
            BookingError::Pricing(e) => write!(f, "{e}"),
            BookingError::Conflicts(slots) => {
                write!(f, "{} slot(s) already taken", slots.len())?;
                if let Some(first) = slots.first() {
                    write!(f, ", first: {first}")?;
                }
                Ok(())
            }
            BookingError::Voucher(msg) => write!(f, "voucher rejected: {msg}"),
            BookingError::NotFound => write!(f, "booking not found"),
            BookingError::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl From<anyhow::Error> for BookingError {
    fn from(e: anyhow::Error) -> Self {
        BookingError::Internal(e)
    }
}

impl From<rusqlite::Error> for BookingError {
    fn from(e: rusqlite::Error) -> Self {
        BookingError::Internal(e.into())
    }
}

/// Creates a booking with its expanded occurrences and the payment that
/// settles it. Cash settles on the spot; bank transfer leaves the whole
/// chain pending until the webhook confirms it.
pub fn create_booking(state: &AppState, req: NewBooking) -> Result<CreatedBooking, BookingError> {
    let now = state.now_utc();
    let today = state.now_local().date();

    let days = expansion::normalize_days(&req.days_of_week).map_err(BookingError::Schedule)?;
    let dates = expansion::expand_dates(
        req.start_date,
        req.end_date,
        &days,
        req.start_time,
        req.end_time,
        today,
    )
    .map_err(BookingError::Schedule)?;

    let db = state.db.lock().unwrap();
    let tx = db.unchecked_transaction()?;

    let court = queries::get_court(&tx, &req.court_id)?.ok_or(BookingError::CourtNotFound)?;
    if court.status == CourtStatus::Inactive {
        return Err(BookingError::CourtInactive);
    }
    queries::get_customer(&tx, req.customer_id)?.ok_or(BookingError::CustomerNotFound)?;

    let rules = queries::list_pricing_rules(&tx, &court.id)?;
    let mut base_total = 0i64;
    for date in &dates {
        let rate = pricing::resolve_rate(&rules, *date, req.start_time, req.end_time)
            .map_err(BookingError::Pricing)?;
        base_total += pricing::window_amount(rate, req.start_time, req.end_time);
    }

    let conflicts = conflicts::find_conflicts(&tx, &court.id, &dates, req.start_time, req.end_time)?;
    if !conflicts.is_empty() {
        return Err(BookingError::Conflicts(conflicts));
    }

    let mut discount = 0i64;
    if let Some(voucher_id) = req.voucher_id {
        // Validity is judged at the first slot, in venue time.
        let first_slot = NaiveDateTime::new(dates[0], req.start_time);
        let decision = state.vouchers.validate(
            &tx,
            &VoucherCheck {
                voucher_id,
                customer_id: req.customer_id,
                order_total: base_total,
                at: first_slot,
            },
        )?;
        if !decision.is_valid {
            let msg = decision
                .error_message
                .unwrap_or_else(|| "voucher is not usable".to_string());
            return Err(BookingError::Voucher(msg));
        }
        discount = decision.discount_amount;
    }
    let amount_due = (base_total - discount).max(0);

    let booking_status = match req.payment_method {
        PaymentMethod::Cash => BookingStatus::Active,
        PaymentMethod::BankTransfer => BookingStatus::PendingPayment,
    };
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        customer_id: req.customer_id,
        court_id: court.id.clone(),
        start_date: req.start_date,
        end_date: req.end_date,
        days_of_week: days.clone(),
        start_time: req.start_time,
        end_time: req.end_time,
        status: booking_status,
        voucher_id: req.voucher_id,
        discount_amount: discount,
        note: req.note,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(&tx, &booking)?;

    let mut occurrences = Vec::with_capacity(dates.len());
    for date in &dates {
        let occ = Occurrence {
            id: Uuid::new_v4().to_string(),
            booking_id: booking.id.clone(),
            court_id: court.id.clone(),
            date: *date,
            start_time: req.start_time,
            end_time: req.end_time,
            status: OccurrenceStatus::Active,
            note: None,
            created_at: now,
            updated_at: now,
        };
        queries::insert_occurrence(&tx, &occ)?;
        occurrences.push(occ);
    }

    let payment_status = match req.payment_method {
        PaymentMethod::Cash => PaymentStatus::Paid,
        PaymentMethod::BankTransfer => PaymentStatus::PendingPayment,
    };
    let payment = Payment {
        id: payments::next_payment_id(&tx, today)?,
        booking_id: Some(booking.id.clone()),
        order_id: None,
        membership_id: None,
        customer_id: Some(req.customer_id),
        amount: amount_due,
        status: payment_status,
        note: None,
        payment_created_at: now,
        updated_at: now,
    };
    queries::insert_payment(&tx, &payment)?;

    // Cash use of a voucher is final right away. A bank-transfer booking
    // records the usage only once the transfer lands.
    if req.payment_method == PaymentMethod::Cash {
        if let Some(voucher_id) = req.voucher_id {
            state
                .vouchers
                .record_usage(&tx, voucher_id, req.customer_id, &booking.id, discount, &now)?;
        }
    }

    tx.commit()?;
    drop(db);

    state.publish(EngineEvent::booking_updated(&booking.id));

    let qr_url = match req.payment_method {
        PaymentMethod::BankTransfer => {
            payments::transfer_qr_url(&state.config, &payment.id, amount_due)
        }
        PaymentMethod::Cash => None,
    };

    tracing::info!(
        booking_id = %booking.id,
        court_id = %booking.court_id,
        occurrences = occurrences.len(),
        amount = amount_due,
        method = req.payment_method.as_str(),
        "booking created"
    );

    Ok(CreatedBooking {
        booking,
        occurrences,
        payment,
        qr_url,
    })
}

/// Cancels a whole booking: the booking row, every occurrence that has not
/// already finished, and any payment still waiting on a transfer. Calling it
/// again on a cancelled booking is a no-op.
pub fn cancel_booking(state: &AppState, booking_id: &str) -> Result<Booking, BookingError> {
    let now = state.now_utc();

    let db = state.db.lock().unwrap();
    let tx = db.unchecked_transaction()?;

    let booking = queries::get_booking(&tx, booking_id)?.ok_or(BookingError::NotFound)?;
    if booking.status == BookingStatus::Cancelled {
        return Ok(booking);
    }

    queries::update_booking_status(&tx, booking_id, BookingStatus::Cancelled, &now)?;
    let dropped = queries::cancel_booking_occurrences(&tx, booking_id, &now)?;
    queries::cancel_pending_booking_payments(&tx, booking_id, &now)?;

    let updated = queries::get_booking(&tx, booking_id)?.ok_or(BookingError::NotFound)?;
    tx.commit()?;
    drop(db);

    state.publish(EngineEvent::booking_updated(booking_id));

    tracing::info!(booking_id, occurrences_dropped = dropped, "booking cancelled");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::{Court, EngineEvent, PricingRule};
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

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap()
    }

    fn test_state(now: &str) -> AppState {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        db::migrations::run_migrations(&conn).unwrap();
        let (events_tx, _) = tokio::sync::broadcast::channel::<EngineEvent>(16);
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

    fn seed_court(state: &AppState) {
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
            &PricingRule {
                id: 0,
                court_id: "court-1".to_string(),
                days_of_week: vec![2, 3, 4, 5, 6, 7, 8],
                start_time: t("06:00:00"),
                end_time: t("22:00:00"),
                price_per_hour: 100_000,
                rule_order: 1,
            },
        )
        .unwrap();
    }

    fn base_request() -> NewBooking {
        NewBooking {
            customer_id: 1,
            court_id: "court-1".to_string(),
            start_date: d("2025-06-16"),
            end_date: d("2025-06-16"),
            days_of_week: vec![2],
            start_time: t("10:00:00"),
            end_time: t("11:00:00"),
            payment_method: PaymentMethod::Cash,
            voucher_id: None,
            note: None,
        }
    }

    #[test]
    fn cash_booking_is_active_and_paid() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);

        let created = create_booking(&state, base_request()).unwrap();
        assert_eq!(created.booking.status, BookingStatus::Active);
        assert_eq!(created.payment.status, PaymentStatus::Paid);
        assert_eq!(created.payment.amount, 100_000);
        assert_eq!(created.occurrences.len(), 1);
        assert!(created.qr_url.is_none());
    }

    #[test]
    fn bank_booking_holds_everything_pending() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);

        let mut req = base_request();
        req.payment_method = PaymentMethod::BankTransfer;
        let created = create_booking(&state, req).unwrap();
        assert_eq!(created.booking.status, BookingStatus::PendingPayment);
        assert_eq!(created.payment.status, PaymentStatus::PendingPayment);
        // Occurrences hold the slot even while payment is pending.
        assert!(created
            .occurrences
            .iter()
            .all(|o| o.status == OccurrenceStatus::Active));
    }

    #[test]
    fn recurring_booking_expands_and_prices_each_slot() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);

        let mut req = base_request();
        req.start_date = d("2025-06-16");
        req.end_date = d("2025-06-22");
        req.days_of_week = vec![2, 4, 6]; // Mon, Wed, Fri
        let created = create_booking(&state, req).unwrap();
        assert_eq!(created.occurrences.len(), 3);
        assert_eq!(created.payment.amount, 300_000);
    }

    #[test]
    fn overlapping_slot_is_rejected() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);
        create_booking(&state, base_request()).unwrap();

        let mut req = base_request();
        req.start_time = t("10:30:00");
        req.end_time = t("11:30:00");
        let err = create_booking(&state, req).unwrap_err();
        assert!(matches!(err, BookingError::Conflicts(ref c) if c.len() == 1));
    }

    #[test]
    fn back_to_back_slots_coexist() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);
        create_booking(&state, base_request()).unwrap();

        let mut req = base_request();
        req.start_time = t("11:00:00");
        req.end_time = t("12:00:00");
        assert!(create_booking(&state, req).is_ok());
    }

    #[test]
    fn pending_hold_still_blocks_the_slot() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);

        let mut hold = base_request();
        hold.payment_method = PaymentMethod::BankTransfer;
        create_booking(&state, hold).unwrap();

        let err = create_booking(&state, base_request()).unwrap_err();
        assert!(matches!(err, BookingError::Conflicts(_)));
    }

    #[test]
    fn inactive_court_is_rejected() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);
        {
            let db = state.db.lock().unwrap();
            queries::set_court_status(&db, "court-1", CourtStatus::Inactive).unwrap();
        }
        let err = create_booking(&state, base_request()).unwrap_err();
        assert!(matches!(err, BookingError::CourtInactive));
    }

    #[test]
    fn unknown_court_and_customer_are_rejected() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);

        let mut req = base_request();
        req.court_id = "court-9".to_string();
        assert!(matches!(
            create_booking(&state, req).unwrap_err(),
            BookingError::CourtNotFound
        ));

        let mut req = base_request();
        req.customer_id = 99;
        assert!(matches!(
            create_booking(&state, req).unwrap_err(),
            BookingError::CustomerNotFound
        ));
    }

    #[test]
    fn cancel_drops_occurrences_and_pending_payment() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);
        let mut req = base_request();
        req.payment_method = PaymentMethod::BankTransfer;
        let created = create_booking(&state, req).unwrap();

        let cancelled = cancel_booking(&state, &created.booking.id).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let db = state.db.lock().unwrap();
        let occ = queries::get_occurrence(&db, &created.occurrences[0].id)
            .unwrap()
            .unwrap();
        assert_eq!(occ.status, OccurrenceStatus::Cancelled);
        let payment = queries::get_payment(&db, &created.payment.id).unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Cancelled);
    }

    #[test]
    fn cancel_is_idempotent() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);
        let created = create_booking(&state, base_request()).unwrap();

        cancel_booking(&state, &created.booking.id).unwrap();
        let again = cancel_booking(&state, &created.booking.id).unwrap();
        assert_eq!(again.status, BookingStatus::Cancelled);
    }

    #[test]
    fn payment_ids_follow_the_daily_sequence() {
        let state = test_state("2025-06-10 08:00:00");
        seed_court(&state);

        let first = create_booking(&state, base_request()).unwrap();
        let mut req = base_request();
        req.start_time = t("12:00:00");
        req.end_time = t("13:00:00");
        let second = create_booking(&state, req).unwrap();

        assert_eq!(first.payment.id, "PM-10062025-000001");
        assert_eq!(second.payment.id, "PM-10062025-000002");
    }
}
