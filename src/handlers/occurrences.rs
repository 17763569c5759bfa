use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{Occurrence, Order, OrderItem, ServiceLine};
use crate::services::{lifecycle, orders};
use crate::state::AppState;

// POST /api/occurrences/:id/check-in
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Occurrence>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let occurrence = lifecycle::check_in(&state, &id)?;
    Ok(Json(occurrence))
}

// POST /api/occurrences/:id/check-out
#[derive(Deserialize)]
pub struct NoteBody {
    pub note: Option<String>,
}

pub async fn check_out(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<NoteBody>>,
) -> Result<Json<Occurrence>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let note = body.as_ref().and_then(|b| b.note.as_deref());
    let occurrence = lifecycle::check_out(&state, &id, note)?;
    Ok(Json(occurrence))
}

// POST /api/occurrences/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<NoteBody>>,
) -> Result<Json<Occurrence>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let note = body.as_ref().and_then(|b| b.note.as_deref());
    let occurrence = lifecycle::cancel_occurrence(&state, &id, note)?;
    Ok(Json(occurrence))
}

// POST /api/occurrences/:id/no-show
pub async fn no_show(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Occurrence>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let occurrence = lifecycle::mark_no_show(&state, &id)?;
    Ok(Json(occurrence))
}

// GET /api/occurrences/:id
#[derive(Serialize)]
pub struct OccurrenceDetail {
    pub occurrence: Occurrence,
    pub items: Vec<OrderItem>,
    pub service_lines: Vec<ServiceLine>,
    pub order: Option<Order>,
}

pub async fn get_occurrence(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OccurrenceDetail>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let detail = {
        let db = state.db.lock().unwrap();
        let occurrence = queries::get_occurrence(&db, &id)?
            .ok_or_else(|| AppError::NotFound("occurrence not found".to_string()))?;
        let items = queries::list_order_items(&db, &id)?;
        let service_lines = queries::list_service_lines(&db, &id)?;
        let order = queries::get_open_order_for_occurrence(&db, &id)?;
        OccurrenceDetail {
            occurrence,
            items,
            service_lines,
            order,
        }
    };

    Ok(Json(detail))
}

// POST /api/occurrences/:id/items
#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

pub async fn add_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<OrderItem>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let item = orders::add_order_item(&state, &id, body.product_id, body.quantity)?;
    Ok(Json(item))
}

// PUT /api/occurrences/:id/items
#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub item_id: String,
    pub quantity: i64,
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    match orders::update_order_item(&state, &id, &body.item_id, body.quantity)? {
        Some(item) => Ok(Json(serde_json::json!(item))),
        None => Ok(Json(serde_json::json!({"removed": true}))),
    }
}

// POST /api/occurrences/:id/services
#[derive(Deserialize)]
pub struct AddServiceRequest {
    pub service_id: i64,
    pub quantity: Option<i64>,
}

pub async fn add_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AddServiceRequest>,
) -> Result<Json<ServiceLine>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let quantity = body.quantity.unwrap_or(1);
    let line = orders::add_service_line(&state, &id, body.service_id, quantity)?;
    Ok(Json(line))
}

// POST /api/service-lines/:id/end
pub async fn end_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ServiceLine>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let line = orders::end_service_line(&state, &id)?;
    Ok(Json(line))
}
