use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A payment intent. Exactly one of `booking_id`, `order_id` and
/// `membership_id` is set; the id doubles as the bank-transfer reference
/// (`PM-DDMMYYYY-NNNNNN`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub booking_id: Option<String>,
    pub order_id: Option<String>,
    pub membership_id: Option<String>,
    pub customer_id: Option<i64>,
    pub amount: i64,
    pub status: PaymentStatus,
    pub note: Option<String>,
    pub payment_created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PendingPayment,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::PendingPayment => "pending_payment",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "paid" => PaymentStatus::Paid,
            "cancelled" => PaymentStatus::Cancelled,
            _ => PaymentStatus::PendingPayment,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "cash" => PaymentMethod::Cash,
            _ => PaymentMethod::BankTransfer,
        }
    }
}
