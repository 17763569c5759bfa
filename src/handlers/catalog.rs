use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{Customer, Product, ServiceBilling, ServiceItem};
use crate::state::AppState;

// POST /api/customers
#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateCustomerRequest>,
) -> Result<Json<Customer>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let full_name = body.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::Validation("full_name is required".to_string()));
    }
    let now = state.now_utc();

    let customer = {
        let db = state.db.lock().unwrap();
        let id = queries::insert_customer(
            &db,
            full_name,
            body.email.as_deref(),
            body.phone.as_deref(),
            &now,
        )?;
        queries::get_customer(&db, id)?
            .ok_or_else(|| anyhow::anyhow!("customer {id} vanished after insert"))?
    };

    Ok(Json(customer))
}

// GET /api/customers
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Customer>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let customers = {
        let db = state.db.lock().unwrap();
        queries::list_customers(&db)?
    };

    Ok(Json(customers))
}

// POST /api/products
#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub sale_price: i64,
}

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateProductRequest>,
) -> Result<Json<Product>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if body.sale_price < 0 {
        return Err(AppError::Validation(
            "sale_price must not be negative".to_string(),
        ));
    }

    let product = {
        let db = state.db.lock().unwrap();
        let id = queries::insert_product(&db, name, body.sale_price)?;
        queries::get_product(&db, id)?
            .ok_or_else(|| anyhow::anyhow!("product {id} vanished after insert"))?
    };

    Ok(Json(product))
}

// GET /api/products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Product>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let products = {
        let db = state.db.lock().unwrap();
        queries::list_products(&db)?
    };

    Ok(Json(products))
}

// POST /api/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub unit_price: i64,
    pub billing: String,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> Result<Json<ServiceItem>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if body.unit_price < 0 {
        return Err(AppError::Validation(
            "unit_price must not be negative".to_string(),
        ));
    }
    let billing = match body.billing.as_str() {
        "fixed" => ServiceBilling::Fixed,
        "hourly" => ServiceBilling::Hourly,
        other => {
            return Err(AppError::Validation(format!(
                "unknown billing kind: {other}"
            )))
        }
    };

    let service = {
        let db = state.db.lock().unwrap();
        let id = queries::insert_service(&db, name, body.unit_price, billing)?;
        queries::get_service(&db, id)?
            .ok_or_else(|| anyhow::anyhow!("service {id} vanished after insert"))?
    };

    Ok(Json(service))
}

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ServiceItem>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let services = {
        let db = state.db.lock().unwrap();
        queries::list_services(&db)?
    };

    Ok(Json(services))
}
