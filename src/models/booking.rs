use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A reservation header. Walk-ins have `start_date == end_date` and an empty
/// day mask; recurring bookings span a date range with a day mask in the
/// venue encoding (Monday = 2 .. Sunday = 8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub customer_id: i64,
    pub court_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub days_of_week: Vec<u8>,
    pub status: BookingStatus,
    pub voucher_id: Option<i64>,
    pub discount_amount: i64,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// `PendingPayment` is the bank-transfer hold: slots are already reserved
/// but the booking falls to `Cancelled` if the transfer misses its window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Active,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::Active => "active",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => BookingStatus::Active,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::PendingPayment,
        }
    }
}

/// One concrete court session on one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: String,
    pub booking_id: String,
    pub court_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: OccurrenceStatus,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    Active,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
}

impl OccurrenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccurrenceStatus::Active => "active",
            OccurrenceStatus::CheckedIn => "checked_in",
            OccurrenceStatus::Completed => "completed",
            OccurrenceStatus::Cancelled => "cancelled",
            OccurrenceStatus::NoShow => "no_show",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "checked_in" => OccurrenceStatus::CheckedIn,
            "completed" => OccurrenceStatus::Completed,
            "cancelled" => OccurrenceStatus::Cancelled,
            "no_show" => OccurrenceStatus::NoShow,
            _ => OccurrenceStatus::Active,
        }
    }

    /// Completed, Cancelled and NoShow never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OccurrenceStatus::Completed | OccurrenceStatus::Cancelled | OccurrenceStatus::NoShow
        )
    }
}
