use std::fmt;

use crate::db::queries;
use crate::models::{BookingStatus, EngineEvent, OrderStatus, PaymentStatus};
use crate::services::notify::Notification;
use crate::state::AppState;

/// Pulls the transfer reference out of a free-text bank narrative. Banks
/// strip separators and glue their own codes around the reference, so both
/// the canonical `PM-DDMMYYYY-NNNNNN` and the compact `PMDDMMYYYYNNNNNN`
/// must be recognized; the compact form is normalized to canonical.
pub fn parse_payment_reference(text: &str) -> Option<String> {
    for raw in text.split_whitespace() {
        let token = raw.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
        if let Some(reference) = parse_reference_token(token) {
            return Some(reference);
        }
    }
    None
}

fn parse_reference_token(token: &str) -> Option<String> {
    let rest = token.strip_prefix("PM")?;

    if let Some(dashed) = rest.strip_prefix('-') {
        let mut parts = dashed.splitn(2, '-');
        let day = parts.next()?;
        let seq = parts.next()?;
        if day.len() == 8
            && seq.len() == 6
            && day.bytes().all(|b| b.is_ascii_digit())
            && seq.bytes().all(|b| b.is_ascii_digit())
        {
            return Some(format!("PM-{day}-{seq}"));
        }
        return None;
    }

    // Compact legacy form: at least 14 digits straight after PM.
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 14 {
        return Some(format!("PM-{}-{}", &digits[..8], &digits[8..14]));
    }
    None
}

#[derive(Debug, PartialEq)]
pub enum ReconcileOutcome {
    /// The transfer settled a pending payment.
    Confirmed {
        payment_id: String,
        booking_id: Option<String>,
        order_id: Option<String>,
    },
    /// Replay of a transfer that already settled; nothing changed.
    AlreadyPaid { payment_id: String },
    /// Outbound or short transfer; acknowledged but not applied.
    Ignored { reason: &'static str },
}

#[derive(Debug)]
pub enum ReconcileError {
    PaymentNotFound,
    Internal(anyhow::Error),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::PaymentNotFound => write!(f, "no payment matches the reference"),
            ReconcileError::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl From<anyhow::Error> for ReconcileError {
    fn from(e: anyhow::Error) -> Self {
        ReconcileError::Internal(e)
    }
}

impl From<rusqlite::Error> for ReconcileError {
    fn from(e: rusqlite::Error) -> Self {
        ReconcileError::Internal(e.into())
    }
}

/// Applies one incoming bank transfer to the payment it references,
/// cascading to the booking or order it settles. Safe to replay: a second
/// delivery of the same transfer is a no-op.
pub async fn apply_transfer(
    state: &AppState,
    reference: &str,
    direction: &str,
    amount: i64,
) -> Result<ReconcileOutcome, ReconcileError> {
    let now = state.now_utc();

    let (payment, confirmed_booking, confirmed_order) = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;

        let payment =
            queries::get_payment(&tx, reference)?.ok_or(ReconcileError::PaymentNotFound)?;

        if direction != "in" {
            return Ok(ReconcileOutcome::Ignored {
                reason: "outbound transfer",
            });
        }
        if amount < payment.amount {
            return Ok(ReconcileOutcome::Ignored {
                reason: "amount below expected",
            });
        }

        let marked = queries::mark_payment_paid(&tx, &payment.id, &now)?;
        if !marked {
            return Ok(ReconcileOutcome::AlreadyPaid {
                payment_id: payment.id,
            });
        }
        if payment.status == PaymentStatus::Cancelled {
            // Money landed after the payment was cancelled. Keep it booked
            // as paid but flag it; the desk sorts out refund vs reinstate.
            queries::append_payment_note(&tx, &payment.id, "paid after cancellation", &now)?;
        }

        let mut confirmed_booking = None;
        if let Some(booking_id) = payment.booking_id.clone() {
            let moved = queries::update_booking_status_if(
                &tx,
                &booking_id,
                BookingStatus::PendingPayment,
                BookingStatus::Active,
                &now,
            )?;
            if moved {
                if let Some(booking) = queries::get_booking(&tx, &booking_id)? {
                    if let Some(voucher_id) = booking.voucher_id {
                        if !queries::has_voucher_usage(&tx, voucher_id, &booking_id)? {
                            state.vouchers.record_usage(
                                &tx,
                                voucher_id,
                                booking.customer_id,
                                &booking_id,
                                booking.discount_amount,
                                &now,
                            )?;
                        }
                    }
                }
                confirmed_booking = Some(booking_id);
            } else if let Some(booking) = queries::get_booking(&tx, &booking_id)? {
                if booking.status == BookingStatus::Cancelled {
                    queries::append_payment_note(
                        &tx,
                        &payment.id,
                        "booking already cancelled, needs follow-up",
                        &now,
                    )?;
                }
            }
        }

        let mut confirmed_order = None;
        if let Some(order_id) = payment.order_id.clone() {
            let moved = queries::update_order_status_if(
                &tx,
                &order_id,
                OrderStatus::Pending,
                OrderStatus::Paid,
                &now,
            )?;
            if moved {
                if let Some(order) = queries::get_order(&tx, &order_id)? {
                    if let Some(voucher_id) = order.voucher_id {
                        if !queries::has_voucher_usage(&tx, voucher_id, &order_id)? {
                            state.vouchers.record_usage(
                                &tx,
                                voucher_id,
                                order.customer_id,
                                &order_id,
                                order.discount_amount,
                                &now,
                            )?;
                        }
                    }
                }
                confirmed_order = Some(order_id);
            } else if let Some(order) = queries::get_order(&tx, &order_id)? {
                if order.status == OrderStatus::Cancelled {
                    queries::append_payment_note(
                        &tx,
                        &payment.id,
                        "order already cancelled, needs follow-up",
                        &now,
                    )?;
                }
            }
        }

        tx.commit()?;
        (payment, confirmed_booking, confirmed_order)
    };

    state.publish(EngineEvent::payment_updated(&payment.id));
    if let Some(booking_id) = &confirmed_booking {
        state.publish(EngineEvent::booking_updated(booking_id));
    }
    if let Some(order_id) = &confirmed_order {
        state.publish(EngineEvent::order_updated(order_id));
    }

    tracing::info!(
        payment_id = %payment.id,
        booking_id = confirmed_booking.as_deref().unwrap_or(""),
        order_id = confirmed_order.as_deref().unwrap_or(""),
        amount,
        "transfer confirmed"
    );

    let notification = Notification {
        event: "payment_confirmed".to_string(),
        recipient: payment
            .customer_id
            .map(|id| id.to_string())
            .unwrap_or_default(),
        detail: serde_json::json!({
            "payment_id": payment.id,
            "amount": payment.amount,
        }),
    };
    if let Err(e) = state.notifier.dispatch(&notification).await {
        tracing::warn!(error = %e, "payment notification failed");
    }

    Ok(ReconcileOutcome::Confirmed {
        payment_id: payment.id,
        booking_id: confirmed_booking,
        order_id: confirmed_order,
    })
}
