use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::order::ServiceBilling;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sale_price: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceItem {
    pub id: i64,
    pub name: String,
    pub unit_price: i64,
    pub billing: ServiceBilling,
    pub is_active: bool,
}
