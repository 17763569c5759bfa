use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::reconcile::{self, ReconcileOutcome};
use crate::state::AppState;

/// The gateway authenticates with `Authorization: Apikey <key>`.
fn check_webhook_key(headers: &HeaderMap, expected_key: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let key = auth.strip_prefix("Apikey ").unwrap_or("");
    if expected_key.is_empty() || key != expected_key {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// POST /webhook/bank
//
// Transfer notification from the bank gateway. The payment reference is
// buried in the free-text narrative; referenceCode and description are
// fallbacks for gateways that strip it from the content.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransferPayload {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub transfer_type: String,
    #[serde(default)]
    pub transfer_amount: i64,
    pub reference_code: Option<String>,
    pub description: Option<String>,
}

pub async fn bank_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<BankTransferPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_webhook_key(&headers, &state.config.bank_webhook_key)?;

    let reference = reconcile::parse_payment_reference(&payload.content)
        .or_else(|| {
            payload
                .reference_code
                .as_deref()
                .and_then(reconcile::parse_payment_reference)
        })
        .or_else(|| {
            payload
                .description
                .as_deref()
                .and_then(reconcile::parse_payment_reference)
        })
        .ok_or_else(|| {
            AppError::Validation("no payment reference in transfer content".to_string())
        })?;

    let outcome = reconcile::apply_transfer(
        &state,
        &reference,
        &payload.transfer_type,
        payload.transfer_amount,
    )
    .await?;

    let message = match outcome {
        ReconcileOutcome::Confirmed { payment_id, .. } => {
            format!("payment {payment_id} confirmed")
        }
        ReconcileOutcome::AlreadyPaid { payment_id } => {
            format!("payment {payment_id} already settled")
        }
        ReconcileOutcome::Ignored { reason } => reason.to_string(),
    };

    Ok(Json(serde_json::json!({"success": true, "message": message})))
}
