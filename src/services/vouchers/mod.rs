pub mod store;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

pub use store::SqliteVoucherStore;

pub struct VoucherCheck {
    pub voucher_id: i64,
    pub customer_id: i64,
    pub order_total: i64,
    /// Reference instant for the validity window: the booking's own
    /// date/time when one exists, otherwise now.
    pub at: NaiveDateTime,
}

/// Validation reports instead of throwing: an unusable voucher is a normal
/// answer, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct VoucherDecision {
    pub is_valid: bool,
    pub discount_amount: i64,
    pub error_message: Option<String>,
}

impl VoucherDecision {
    pub fn valid(discount_amount: i64) -> Self {
        Self {
            is_valid: true,
            discount_amount,
            error_message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            discount_amount: 0,
            error_message: Some(message.into()),
        }
    }
}

/// Discount authority consumed by booking creation and checkout. Takes the
/// caller's connection so usage recording lands inside the caller's
/// transaction.
pub trait VoucherValidator: Send + Sync {
    fn validate(&self, conn: &Connection, check: &VoucherCheck) -> anyhow::Result<VoucherDecision>;

    fn record_usage(
        &self,
        conn: &Connection,
        voucher_id: i64,
        customer_id: i64,
        order_ref: &str,
        discount_amount: i64,
        now: &NaiveDateTime,
    ) -> anyhow::Result<()>;
}
