use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{EngineEvent, Order, OrderItem, OrderStatus, Payment, ServiceLine};
use crate::services::checkout::{self, CheckoutRequest};
use crate::services::payments;
use crate::state::AppState;

// POST /api/occurrences/:id/checkout
#[derive(Deserialize)]
pub struct CheckoutBody {
    pub payment_method: String,
    pub voucher_id: Option<i64>,
    pub note: Option<String>,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub payment: Payment,
    pub qr_url: Option<String>,
}

pub async fn checkout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let payment_method = super::bookings::parse_method(&body.payment_method)?;
    let result = checkout::checkout(
        &state,
        CheckoutRequest {
            occurrence_id: id,
            payment_method,
            voucher_id: body.voucher_id,
            note: body.note,
        },
    )
    .await?;

    Ok(Json(CheckoutResponse {
        order: result.order,
        payment: result.payment,
        qr_url: result.qr_url,
    }))
}

// GET /api/orders/:id
#[derive(Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub payment: Option<Payment>,
    pub items: Vec<OrderItem>,
    pub service_lines: Vec<ServiceLine>,
    pub qr_url: Option<String>,
}

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderDetail>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let detail = {
        let db = state.db.lock().unwrap();
        let order = queries::get_order(&db, &id)?
            .ok_or_else(|| AppError::NotFound("order not found".to_string()))?;
        let payment = queries::find_payment_for_order(&db, &id)?;
        let items = queries::list_order_items(&db, &order.occurrence_id)?;
        let service_lines = queries::list_service_lines(&db, &order.occurrence_id)?;
        let qr_url = match (&payment, order.status) {
            (Some(p), OrderStatus::Pending) => {
                payments::transfer_qr_url(&state.config, &p.id, p.amount)
            }
            _ => None,
        };
        OrderDetail {
            order,
            payment,
            items,
            service_lines,
            qr_url,
        }
    };

    Ok(Json(detail))
}

// POST /api/orders/:id/extend-payment
//
// Reopens an order whose bank hold lapsed: the order goes back to pending
// and its cancelled payments restart the hold window from now.
pub async fn extend_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderDetail>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = state.now_utc();
    let (order, payment) = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;

        let order = queries::get_order(&tx, &id)?
            .ok_or_else(|| AppError::NotFound("order not found".to_string()))?;
        if order.status != OrderStatus::Cancelled {
            return Err(AppError::Conflict(format!(
                "order is {}, only an expired order can be reopened",
                order.status.as_str()
            )));
        }

        let reopened =
            queries::update_order_status_if(&tx, &id, OrderStatus::Cancelled, OrderStatus::Pending, &now)?;
        if !reopened {
            return Err(AppError::Conflict(
                "order changed state, retry".to_string(),
            ));
        }
        queries::reset_order_payments(&tx, &id, &now)?;

        let order = queries::get_order(&tx, &id)?
            .ok_or_else(|| AppError::NotFound("order not found".to_string()))?;
        let payment = queries::find_payment_for_order(&tx, &id)?;
        tx.commit()?;
        (order, payment)
    };

    state.publish(EngineEvent::order_updated(&order.id));
    if let Some(p) = &payment {
        state.publish(EngineEvent::payment_updated(&p.id));
    }
    tracing::info!(order_id = %order.id, "payment window extended");

    let qr_url = payment
        .as_ref()
        .and_then(|p| payments::transfer_qr_url(&state.config, &p.id, p.amount));
    let (items, service_lines) = {
        let db = state.db.lock().unwrap();
        (
            queries::list_order_items(&db, &order.occurrence_id)?,
            queries::list_service_lines(&db, &order.occurrence_id)?,
        )
    };

    Ok(Json(OrderDetail {
        order,
        payment,
        items,
        service_lines,
        qr_url,
    }))
}
