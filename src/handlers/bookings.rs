use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{Booking, Occurrence, Payment, PaymentMethod};
use crate::services::booking::{self, NewBooking};
use crate::services::clock::{parse_date, parse_time};
use crate::state::AppState;

pub(crate) fn parse_method(s: &str) -> Result<PaymentMethod, AppError> {
    match s {
        "cash" => Ok(PaymentMethod::Cash),
        "bank_transfer" => Ok(PaymentMethod::BankTransfer),
        other => Err(AppError::Validation(format!(
            "unknown payment method: {other}"
        ))),
    }
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub customer_id: i64,
    pub court_id: String,
    pub start_date: String,
    pub end_date: Option<String>,
    #[serde(default)]
    pub days_of_week: Vec<u8>,
    pub start_time: String,
    pub end_time: String,
    pub payment_method: String,
    pub voucher_id: Option<i64>,
    pub note: Option<String>,
}

#[derive(Serialize)]
pub struct BookingResponse {
    pub booking: Booking,
    pub occurrences: Vec<Occurrence>,
    pub payment: Payment,
    pub qr_url: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let start_date = parse_date(&body.start_date)
        .ok_or_else(|| AppError::Validation(format!("invalid start_date: {}", body.start_date)))?;
    let end_date = match &body.end_date {
        Some(s) => {
            parse_date(s).ok_or_else(|| AppError::Validation(format!("invalid end_date: {s}")))?
        }
        None => start_date,
    };
    let start_time = parse_time(&body.start_time)
        .ok_or_else(|| AppError::Validation(format!("invalid start_time: {}", body.start_time)))?;
    let end_time = parse_time(&body.end_time)
        .ok_or_else(|| AppError::Validation(format!("invalid end_time: {}", body.end_time)))?;
    let payment_method = parse_method(&body.payment_method)?;

    let created = booking::create_booking(
        &state,
        NewBooking {
            customer_id: body.customer_id,
            court_id: body.court_id,
            start_date,
            end_date,
            days_of_week: body.days_of_week,
            start_time,
            end_time,
            payment_method,
            voucher_id: body.voucher_id,
            note: body.note,
        },
    )?;

    Ok(Json(BookingResponse {
        booking: created.booking,
        occurrences: created.occurrences,
        payment: created.payment,
        qr_url: created.qr_url,
    }))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub court_id: Option<String>,
    pub customer_id: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50);
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(
            &db,
            query.status.as_deref(),
            query.court_id.as_deref(),
            query.customer_id,
            limit,
        )?
    };

    Ok(Json(bookings))
}

// GET /api/bookings/:id
#[derive(Serialize)]
pub struct BookingDetail {
    pub booking: Booking,
    pub occurrences: Vec<Occurrence>,
    pub payment: Option<Payment>,
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingDetail>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let detail = {
        let db = state.db.lock().unwrap();
        let booking = queries::get_booking(&db, &id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;
        let occurrences = queries::list_booking_occurrences(&db, &id)?;
        let payment = queries::find_payment_for_booking(&db, &id)?;
        BookingDetail {
            booking,
            occurrences,
            payment,
        }
    };

    Ok(Json(detail))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = booking::cancel_booking(&state, &id)?;
    Ok(Json(booking))
}
