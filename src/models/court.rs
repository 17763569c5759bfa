use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Court {
    pub id: String,
    pub name: String,
    pub status: CourtStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CourtStatus {
    Active,
    InUse,
    Inactive,
}

impl CourtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourtStatus::Active => "active",
            CourtStatus::InUse => "in_use",
            CourtStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "in_use" => CourtStatus::InUse,
            "inactive" => CourtStatus::Inactive,
            _ => CourtStatus::Active,
        }
    }
}

/// One tariff band for a court. `days_of_week` uses the venue encoding
/// (Monday = 2 .. Sunday = 8); the band covers `[start_time, end_time)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: i64,
    pub court_id: String,
    pub days_of_week: Vec<u8>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price_per_hour: i64,
    pub rule_order: i64,
}
