use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::booking::BookingError;
use crate::services::checkout::CheckoutError;
use crate::services::expansion::ExpansionError;
use crate::services::lifecycle::LifecycleError;
use crate::services::orders::OrderEditError;
use crate::services::pricing::PricingError;
use crate::services::reconcile::ReconcileError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        let msg = e.to_string();
        match e {
            BookingError::CourtNotFound
            | BookingError::CustomerNotFound
            | BookingError::NotFound => AppError::NotFound(msg),
            BookingError::Conflicts(_) => AppError::Conflict(msg),
            BookingError::CourtInactive
            | BookingError::Schedule(_)
            | BookingError::Pricing(_)
            | BookingError::Voucher(_) => AppError::Validation(msg),
            BookingError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(e: LifecycleError) -> Self {
        let msg = e.to_string();
        match e {
            LifecycleError::NotFound => AppError::NotFound(msg),
            LifecycleError::NotWithinWindow { .. } => AppError::Validation(msg),
            LifecycleError::AlreadyCheckedIn
            | LifecycleError::NotCheckedIn
            | LifecycleError::InvalidState(_)
            | LifecycleError::HoldUnpaid
            | LifecycleError::BookingCancelled => AppError::Conflict(msg),
            LifecycleError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl From<OrderEditError> for AppError {
    fn from(e: OrderEditError) -> Self {
        let msg = e.to_string();
        match e {
            OrderEditError::OccurrenceNotFound
            | OrderEditError::ProductNotFound
            | OrderEditError::ServiceNotFound
            | OrderEditError::LineNotFound => AppError::NotFound(msg),
            OrderEditError::NotCheckedIn
            | OrderEditError::LineAlreadyEnded
            | OrderEditError::NotDurationBilled => AppError::Conflict(msg),
            OrderEditError::ProductInactive
            | OrderEditError::ServiceInactive
            | OrderEditError::InvalidQuantity => AppError::Validation(msg),
            OrderEditError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(e: CheckoutError) -> Self {
        let msg = e.to_string();
        match e {
            CheckoutError::OccurrenceNotFound => AppError::NotFound(msg),
            CheckoutError::NotCheckedIn | CheckoutError::OrderAlreadyExists => {
                AppError::Conflict(msg)
            }
            CheckoutError::Pricing(_) | CheckoutError::Voucher(_) => AppError::Validation(msg),
            CheckoutError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(e: ReconcileError) -> Self {
        match e {
            // The gateway retries on 5xx; a bad reference is the sender's
            // problem and must come back 400.
            ReconcileError::PaymentNotFound => AppError::Validation(e.to_string()),
            ReconcileError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl From<ExpansionError> for AppError {
    fn from(e: ExpansionError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<PricingError> for AppError {
    fn from(e: PricingError) -> Self {
        AppError::Validation(e.to_string())
    }
}
