use std::fmt;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::db::queries;
use crate::models::{
    CourtStatus, EngineEvent, OccurrenceStatus, Order, OrderStatus, Payment, PaymentMethod,
    PaymentStatus, ServiceBilling,
};
use crate::services::notify::Notification;
use crate::services::orders::duration_bill;
use crate::services::payments;
use crate::services::pricing::{self, PricingError};
use crate::services::vouchers::VoucherCheck;
use crate::state::AppState;

pub struct CheckoutRequest {
    pub occurrence_id: String,
    pub payment_method: PaymentMethod,
    pub voucher_id: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug)]
pub struct CheckoutResult {
    pub order: Order,
    pub payment: Payment,
    pub qr_url: Option<String>,
}

#[derive(Debug)]
pub enum CheckoutError {
    OccurrenceNotFound,
    NotCheckedIn,
    OrderAlreadyExists,
    Pricing(PricingError),
    Voucher(String),
    Internal(anyhow::Error),
}

impl fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutError::OccurrenceNotFound => write!(f, "occurrence not found"),
            CheckoutError::NotCheckedIn => write!(f, "occurrence is not checked in"),
            CheckoutError::OrderAlreadyExists => {
                write!(f, "an order already exists for this occurrence")
            }
            CheckoutError::Pricing(e) => write!(f, "{e}"),
            CheckoutError::Voucher(msg) => write!(f, "voucher rejected: {msg}"),
            CheckoutError::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl From<anyhow::Error> for CheckoutError {
    fn from(e: anyhow::Error) -> Self {
        CheckoutError::Internal(e)
    }
}

impl From<rusqlite::Error> for CheckoutError {
    fn from(e: rusqlite::Error) -> Self {
        CheckoutError::Internal(e.into())
    }
}

/// Surcharge for staying `overrun_minutes` past the scheduled end, billed
/// per started minute at `percent` of the base rate. Rounded up so one
/// extra minute is never free.
pub fn late_fee(price_per_hour: i64, overrun_minutes: i64, percent: i64) -> i64 {
    if overrun_minutes <= 0 {
        return 0;
    }
    (price_per_hour * overrun_minutes * percent + 5999) / 6000
}

/// Settles a session: court time, consumed products, service lines (running
/// hourly lines are ended here), late fee and voucher discount, all in one
/// order. The occurrence completes and the court comes free; bank-transfer
/// orders stay pending until the webhook confirms the payment.
pub async fn checkout(
    state: &AppState,
    req: CheckoutRequest,
) -> Result<CheckoutResult, CheckoutError> {
    let now = state.now_utc();
    let now_local = state.now_local();
    let today_local = now_local.date();

    let (order, payment) = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;

        let occ = queries::get_occurrence(&tx, &req.occurrence_id)?
            .ok_or(CheckoutError::OccurrenceNotFound)?;
        if occ.status != OccurrenceStatus::CheckedIn {
            return Err(CheckoutError::NotCheckedIn);
        }
        if queries::get_open_order_for_occurrence(&tx, &occ.id)?.is_some() {
            return Err(CheckoutError::OrderAlreadyExists);
        }
        let booking = queries::get_booking(&tx, &occ.booking_id)?
            .ok_or(CheckoutError::OccurrenceNotFound)?;

        let rules = queries::list_pricing_rules(&tx, &occ.court_id)?;
        let rate = pricing::resolve_rate(&rules, occ.date, occ.start_time, occ.end_time)
            .map_err(CheckoutError::Pricing)?;
        let base_amount = pricing::window_amount(rate, occ.start_time, occ.end_time);

        let items = queries::list_order_items(&tx, &occ.id)?;
        let items_subtotal: i64 = items.iter().map(|i| i.total_price).sum();

        // Hourly lines still running bill through this instant.
        let lines = queries::list_service_lines(&tx, &occ.id)?;
        let mut services_subtotal = 0i64;
        for line in &lines {
            if line.billing == ServiceBilling::Hourly && line.ended_at.is_none() {
                let total = duration_bill(line, &now);
                queries::close_service_line(&tx, &line.id, &now, total)?;
                services_subtotal += total;
            } else {
                services_subtotal += line.total_price;
            }
        }

        let scheduled_end = NaiveDateTime::new(occ.date, occ.end_time);
        let overrun_minutes = (now_local - scheduled_end).num_minutes().max(0);
        let late_fee_amount = late_fee(rate, overrun_minutes, state.config.late_fee_percent);

        let pre_discount = base_amount + items_subtotal + services_subtotal + late_fee_amount;

        let mut discount = 0i64;
        if let Some(voucher_id) = req.voucher_id {
            let decision = state.vouchers.validate(
                &tx,
                &VoucherCheck {
                    voucher_id,
                    customer_id: booking.customer_id,
                    order_total: pre_discount,
                    at: now_local,
                },
            )?;
            if !decision.is_valid {
                let msg = decision
                    .error_message
                    .unwrap_or_else(|| "voucher is not usable".to_string());
                return Err(CheckoutError::Voucher(msg));
            }
            discount = decision.discount_amount;
        }
        let total_amount = (pre_discount - discount).max(0);

        // Nothing left to transfer settles on the spot, whatever the method.
        let settles_now = req.payment_method == PaymentMethod::Cash || total_amount == 0;

        let order = Order {
            id: Uuid::new_v4().to_string(),
            occurrence_id: occ.id.clone(),
            booking_id: occ.booking_id.clone(),
            customer_id: booking.customer_id,
            base_amount,
            items_subtotal,
            services_subtotal,
            late_fee_amount,
            overrun_minutes,
            voucher_id: req.voucher_id,
            discount_amount: discount,
            total_amount,
            status: if settles_now {
                OrderStatus::Paid
            } else {
                OrderStatus::Pending
            },
            payment_method: req.payment_method.as_str().to_string(),
            note: req.note,
            created_at: now,
            updated_at: now,
        };
        queries::insert_order(&tx, &order)?;

        let payment = Payment {
            id: payments::next_payment_id(&tx, today_local)?,
            booking_id: None,
            order_id: Some(order.id.clone()),
            membership_id: None,
            customer_id: Some(booking.customer_id),
            amount: total_amount,
            status: if settles_now {
                PaymentStatus::Paid
            } else {
                PaymentStatus::PendingPayment
            },
            note: None,
            payment_created_at: now,
            updated_at: now,
        };
        queries::insert_payment(&tx, &payment)?;

        let moved = queries::update_occurrence_status_if(
            &tx,
            &occ.id,
            OccurrenceStatus::CheckedIn,
            OccurrenceStatus::Completed,
            &now,
        )?;
        if !moved {
            return Err(CheckoutError::NotCheckedIn);
        }
        queries::set_court_status_if(&tx, &occ.court_id, CourtStatus::InUse, CourtStatus::Active)?;

        if settles_now {
            if let Some(voucher_id) = req.voucher_id {
                state.vouchers.record_usage(
                    &tx,
                    voucher_id,
                    booking.customer_id,
                    &order.id,
                    discount,
                    &now,
                )?;
            }
        }

        tx.commit()?;
        (order, payment)
    };

    state.publish(EngineEvent::occurrence_updated(&req.occurrence_id));
    state.publish(EngineEvent::order_updated(&order.id));

    tracing::info!(
        order_id = %order.id,
        occurrence_id = %order.occurrence_id,
        total = order.total_amount,
        late_fee = order.late_fee_amount,
        method = %order.payment_method,
        "checkout settled"
    );

    if order.status == OrderStatus::Paid {
        let receipt = Notification {
            event: "checkout_receipt".to_string(),
            recipient: order.customer_id.to_string(),
            detail: serde_json::json!({
                "order_id": order.id,
                "total_amount": order.total_amount,
            }),
        };
        if let Err(e) = state.notifier.dispatch(&receipt).await {
            tracing::warn!(error = %e, "receipt notification failed");
        }
    }

    let qr_url = if payment.status == PaymentStatus::PendingPayment {
        payments::transfer_qr_url(&state.config, &payment.id, payment.amount)
    } else {
        None
    };

    Ok(CheckoutResult {
        order,
        payment,
        qr_url,
    })
}
