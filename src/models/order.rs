use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The checkout bill for one occurrence: court time, add-ons, late fee and
/// voucher discount itemized. At most one non-cancelled order exists per
/// occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub occurrence_id: String,
    pub booking_id: String,
    pub customer_id: i64,
    pub base_amount: i64,
    pub items_subtotal: i64,
    pub services_subtotal: i64,
    pub late_fee_amount: i64,
    pub overrun_minutes: i64,
    pub voucher_id: Option<i64>,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub payment_method: String,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "paid" => OrderStatus::Paid,
            "cancelled" => OrderStatus::Cancelled,
            _ => OrderStatus::Pending,
        }
    }
}

/// A product consumed during a session, priced at add time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub occurrence_id: String,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub total_price: i64,
    pub created_at: NaiveDateTime,
}

/// A rentable service attached to a session. Fixed lines are priced at add
/// time; hourly lines run from `started_at` until ended and bill elapsed
/// hours (`total_price` stays 0 while running).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLine {
    pub id: String,
    pub occurrence_id: String,
    pub service_id: i64,
    pub service_name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub billing: ServiceBilling,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub total_price: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceBilling {
    Fixed,
    Hourly,
}

impl ServiceBilling {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceBilling::Fixed => "fixed",
            ServiceBilling::Hourly => "hourly",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "hourly" => ServiceBilling::Hourly,
            _ => ServiceBilling::Fixed,
        }
    }
}
