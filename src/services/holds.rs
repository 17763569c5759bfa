use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::db::queries;
use crate::models::{BookingStatus, EngineEvent, OccurrenceStatus, OrderStatus, PaymentStatus};
use crate::services::notify::Notification;
use crate::state::AppState;

/// What one sweep pass changed.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub expired_bookings: Vec<String>,
    pub expired_orders: Vec<String>,
    pub no_shows: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_bookings.is_empty()
            && self.expired_orders.is_empty()
            && self.no_shows.is_empty()
    }
}

/// One pass of the background janitor: drop bank-transfer holds whose
/// window lapsed (bookings and orders) and flag sessions nobody showed up
/// for. Every write is conditional, so racing the webhook is safe; whoever
/// moves the row first wins and the loser's pass skips it.
pub fn sweep_once(state: &AppState) -> anyhow::Result<SweepReport> {
    let now = state.now_utc();
    let now_local = state.now_local();
    let cutoff = now - Duration::minutes(state.config.hold_minutes);

    let mut report = SweepReport::default();
    let db = state.db.lock().unwrap();

    for payment in queries::list_expired_booking_holds(&db, &cutoff)? {
        let tx = db.unchecked_transaction()?;
        let won = queries::update_payment_status_if(
            &tx,
            &payment.id,
            PaymentStatus::PendingPayment,
            PaymentStatus::Cancelled,
            &now,
        )?;
        if !won {
            continue;
        }
        if let Some(booking_id) = &payment.booking_id {
            queries::update_booking_status_if(
                &tx,
                booking_id,
                BookingStatus::PendingPayment,
                BookingStatus::Cancelled,
                &now,
            )?;
            queries::cancel_booking_occurrences(&tx, booking_id, &now)?;
            report.expired_bookings.push(booking_id.clone());
        }
        tx.commit()?;
    }

    for payment in queries::list_expired_order_holds(&db, &cutoff)? {
        let tx = db.unchecked_transaction()?;
        let won = queries::update_payment_status_if(
            &tx,
            &payment.id,
            PaymentStatus::PendingPayment,
            PaymentStatus::Cancelled,
            &now,
        )?;
        if !won {
            continue;
        }
        if let Some(order_id) = &payment.order_id {
            queries::update_order_status_if(
                &tx,
                order_id,
                OrderStatus::Pending,
                OrderStatus::Cancelled,
                &now,
            )?;
            report.expired_orders.push(order_id.clone());
        }
        tx.commit()?;
    }

    let overdue =
        queries::list_overdue_occurrences(&db, &now_local.date(), &now_local.time())?;
    for occ in overdue {
        let won = queries::update_occurrence_status_if(
            &db,
            &occ.id,
            OccurrenceStatus::Active,
            OccurrenceStatus::NoShow,
            &now,
        )?;
        if won {
            report.no_shows.push(occ.id.clone());
        }
    }

    Ok(report)
}

/// Long-running sweeper task. Fans out events and hold-expiry notifications
/// after the db lock is released.
pub async fn run_sweeper(state: Arc<AppState>) {
    let mut ticker =
        tokio::time::interval(StdDuration::from_secs(state.config.sweep_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let report = match sweep_once(&state) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "sweep failed");
                continue;
            }
        };
        if report.is_empty() {
            continue;
        }

        tracing::info!(
            expired_bookings = report.expired_bookings.len(),
            expired_orders = report.expired_orders.len(),
            no_shows = report.no_shows.len(),
            "sweep pass"
        );

        for booking_id in &report.expired_bookings {
            state.publish(EngineEvent::booking_updated(booking_id));

            let notification = Notification {
                event: "hold_expired".to_string(),
                recipient: String::new(),
                detail: serde_json::json!({ "booking_id": booking_id }),
            };
            if let Err(e) = state.notifier.dispatch(&notification).await {
                tracing::warn!(error = %e, "hold-expiry notification failed");
            }
        }
        for order_id in &report.expired_orders {
            state.publish(EngineEvent::order_updated(order_id));
        }
        for occurrence_id in &report.no_shows {
            state.publish(EngineEvent::occurrence_updated(occurrence_id));
        }
    }
}
