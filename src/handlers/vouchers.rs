use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{DiscountType, Voucher};
use crate::services::clock::parse_datetime;
use crate::services::vouchers::{VoucherCheck, VoucherDecision};
use crate::state::AppState;

// POST /api/vouchers
#[derive(Deserialize)]
pub struct CreateVoucherRequest {
    pub code: String,
    pub discount_type: String,
    pub discount_value: i64,
    pub max_discount: Option<i64>,
    pub min_order: Option<i64>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub usage_limit_total: Option<i64>,
    pub usage_limit_per_user: Option<i64>,
    pub is_active: Option<bool>,
}

fn parse_instant(label: &str, s: &str) -> Result<chrono::NaiveDateTime, AppError> {
    parse_datetime(s).ok_or_else(|| AppError::Validation(format!("invalid {label}: {s}")))
}

pub async fn create_voucher(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateVoucherRequest>,
) -> Result<Json<Voucher>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let code = body.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::Validation("code is required".to_string()));
    }
    let discount_type = match body.discount_type.as_str() {
        "percentage" => DiscountType::Percentage,
        "fixed" => DiscountType::Fixed,
        other => {
            return Err(AppError::Validation(format!(
                "unknown discount type: {other}"
            )))
        }
    };
    if body.discount_value <= 0 {
        return Err(AppError::Validation(
            "discount_value must be positive".to_string(),
        ));
    }
    if discount_type == DiscountType::Percentage && body.discount_value > 100 {
        return Err(AppError::Validation(
            "percentage discount cannot exceed 100".to_string(),
        ));
    }

    let start_at = body
        .start_at
        .as_deref()
        .map(|s| parse_instant("start_at", s))
        .transpose()?;
    let end_at = body
        .end_at
        .as_deref()
        .map(|s| parse_instant("end_at", s))
        .transpose()?;

    let voucher = Voucher {
        id: 0,
        code,
        discount_type,
        discount_value: body.discount_value,
        max_discount: body.max_discount,
        min_order: body.min_order,
        start_at,
        end_at,
        usage_limit_total: body.usage_limit_total,
        usage_limit_per_user: body.usage_limit_per_user,
        used_count: 0,
        is_active: body.is_active.unwrap_or(true),
    };

    let stored = {
        let db = state.db.lock().unwrap();
        if queries::get_voucher_by_code(&db, &voucher.code)?.is_some() {
            return Err(AppError::Conflict(format!(
                "voucher code {} already exists",
                voucher.code
            )));
        }
        let id = queries::insert_voucher(&db, &voucher)?;
        queries::get_voucher(&db, id)?
            .ok_or_else(|| anyhow::anyhow!("voucher {id} vanished after insert"))?
    };

    Ok(Json(stored))
}

// GET /api/vouchers
pub async fn list_vouchers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Voucher>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let vouchers = {
        let db = state.db.lock().unwrap();
        queries::list_vouchers(&db)?
    };

    Ok(Json(vouchers))
}

// POST /api/vouchers/validate
//
// Dry-run check: reports whether the voucher would apply to an order of the
// given total, and for how much. Records nothing.
#[derive(Deserialize)]
pub struct ValidateVoucherRequest {
    pub voucher_id: Option<i64>,
    pub code: Option<String>,
    pub customer_id: i64,
    pub order_total: i64,
}

pub async fn validate_voucher(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ValidateVoucherRequest>,
) -> Result<Json<VoucherDecision>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let at = state.now_local();
    let decision = {
        let db = state.db.lock().unwrap();
        let voucher_id = match (body.voucher_id, body.code.as_deref()) {
            (Some(id), _) => id,
            (None, Some(code)) => {
                match queries::get_voucher_by_code(&db, code.trim().to_uppercase().as_str())? {
                    Some(v) => v.id,
                    None => return Ok(Json(VoucherDecision::invalid("voucher not found"))),
                }
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "voucher_id or code is required".to_string(),
                ))
            }
        };
        state.vouchers.validate(
            &db,
            &VoucherCheck {
                voucher_id,
                customer_id: body.customer_id,
                order_total: body.order_total,
                at,
            },
        )?
    };

    Ok(Json(decision))
}
