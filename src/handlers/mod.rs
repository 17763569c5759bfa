pub mod bookings;
pub mod catalog;
pub mod courts;
pub mod events;
pub mod health;
pub mod occurrences;
pub mod orders;
pub mod vouchers;
pub mod webhook;

use axum::http::HeaderMap;

use crate::errors::AppError;

/// Admin endpoints share one static bearer token.
pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
