use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{Court, CourtStatus, Occurrence, PricingRule};
use crate::services::clock::{parse_date, parse_time};
use crate::services::pricing;
use crate::state::AppState;

// GET /api/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<queries::StatusCounts>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let today = state.now_local().date();
    let counts = {
        let db = state.db.lock().unwrap();
        queries::get_status_counts(&db, &today)?
    };

    Ok(Json(counts))
}

// POST /api/courts
#[derive(Deserialize)]
pub struct RuleInput {
    pub days_of_week: Vec<u8>,
    pub start_time: String,
    pub end_time: String,
    pub price_per_hour: i64,
    pub rule_order: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateCourtRequest {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleInput>,
}

#[derive(Serialize)]
pub struct CourtDetail {
    pub court: Court,
    pub rules: Vec<PricingRule>,
}

pub async fn create_court(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateCourtRequest>,
) -> Result<Json<CourtDetail>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("court name is required".to_string()));
    }

    let court = Court {
        id: Uuid::new_v4().to_string(),
        name,
        status: CourtStatus::Active,
        created_at: state.now_utc(),
    };

    let mut rules = Vec::with_capacity(body.rules.len());
    for (idx, r) in body.rules.iter().enumerate() {
        let start_time = parse_time(&r.start_time)
            .ok_or_else(|| AppError::Validation(format!("invalid start_time: {}", r.start_time)))?;
        let end_time = parse_time(&r.end_time)
            .ok_or_else(|| AppError::Validation(format!("invalid end_time: {}", r.end_time)))?;
        rules.push(PricingRule {
            id: 0,
            court_id: court.id.clone(),
            days_of_week: r.days_of_week.clone(),
            start_time,
            end_time,
            price_per_hour: r.price_per_hour,
            rule_order: r.rule_order.unwrap_or(idx as i64),
        });
    }
    pricing::validate_rules(&rules)?;

    let rules = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;
        if queries::court_name_exists(&tx, &court.name)? {
            return Err(AppError::Conflict(format!(
                "court {} already exists",
                court.name
            )));
        }
        queries::insert_court(&tx, &court)?;
        for rule in &rules {
            queries::insert_pricing_rule(&tx, rule)?;
        }
        let stored = queries::list_pricing_rules(&tx, &court.id)?;
        tx.commit()?;
        stored
    };

    tracing::info!(court_id = %court.id, rules = rules.len(), "court created");
    Ok(Json(CourtDetail { court, rules }))
}

// GET /api/courts
pub async fn list_courts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Court>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let courts = {
        let db = state.db.lock().unwrap();
        queries::list_courts(&db)?
    };

    Ok(Json(courts))
}

// GET /api/courts/:id
pub async fn get_court(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CourtDetail>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let (court, rules) = {
        let db = state.db.lock().unwrap();
        let court = queries::get_court(&db, &id)?
            .ok_or_else(|| AppError::NotFound("court not found".to_string()))?;
        let rules = queries::list_pricing_rules(&db, &id)?;
        (court, rules)
    };

    Ok(Json(CourtDetail { court, rules }))
}

// GET /api/courts/:id/schedule
#[derive(Deserialize)]
pub struct ScheduleQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    pub court_id: String,
    pub from: String,
    pub to: String,
    pub occurrences: Vec<Occurrence>,
}

pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ScheduleResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let from = match &query.from {
        Some(s) => {
            parse_date(s).ok_or_else(|| AppError::Validation(format!("invalid from date: {s}")))?
        }
        None => state.now_local().date(),
    };
    let to = match &query.to {
        Some(s) => {
            parse_date(s).ok_or_else(|| AppError::Validation(format!("invalid to date: {s}")))?
        }
        None => from + chrono::Duration::days(6),
    };
    if to < from {
        return Err(AppError::Validation(
            "to date is before from date".to_string(),
        ));
    }

    let occurrences = {
        let db = state.db.lock().unwrap();
        queries::get_court(&db, &id)?
            .ok_or_else(|| AppError::NotFound("court not found".to_string()))?;
        queries::list_court_occurrences(&db, &id, &from, &to)?
    };

    Ok(Json(ScheduleResponse {
        court_id: id,
        from: from.format("%Y-%m-%d").to_string(),
        to: to.format("%Y-%m-%d").to_string(),
        occurrences,
    }))
}
