use std::fmt;

use uuid::Uuid;

use crate::db::queries;
use crate::models::{EngineEvent, OccurrenceStatus, OrderItem, ServiceBilling, ServiceLine};
use crate::state::AppState;

#[derive(Debug)]
pub enum OrderEditError {
    OccurrenceNotFound,
    NotCheckedIn,
    ProductNotFound,
    ProductInactive,
    ServiceNotFound,
    ServiceInactive,
    LineNotFound,
    LineAlreadyEnded,
    NotDurationBilled,
    InvalidQuantity,
    Internal(anyhow::Error),
}

impl fmt::Display for OrderEditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderEditError::OccurrenceNotFound => write!(f, "occurrence not found"),
            OrderEditError::NotCheckedIn => {
                write!(f, "occurrence must be checked in to edit its bill")
            }
            OrderEditError::ProductNotFound => write!(f, "product not found"),
            OrderEditError::ProductInactive => write!(f, "product is no longer sold"),
            OrderEditError::ServiceNotFound => write!(f, "service not found"),
            OrderEditError::ServiceInactive => write!(f, "service is no longer offered"),
            OrderEditError::LineNotFound => write!(f, "line not found"),
            OrderEditError::LineAlreadyEnded => write!(f, "service line is already ended"),
            OrderEditError::NotDurationBilled => {
                write!(f, "only hourly service lines can be ended")
            }
            OrderEditError::InvalidQuantity => write!(f, "quantity must be positive"),
            OrderEditError::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl From<anyhow::Error> for OrderEditError {
    fn from(e: anyhow::Error) -> Self {
        OrderEditError::Internal(e)
    }
}

impl From<rusqlite::Error> for OrderEditError {
    fn from(e: rusqlite::Error) -> Self {
        OrderEditError::Internal(e.into())
    }
}

/// Puts a product on the session's bill. Re-adding the same product grows
/// the existing line; the unit price stays the one captured first.
pub fn add_order_item(
    state: &AppState,
    occurrence_id: &str,
    product_id: i64,
    quantity: i64,
) -> Result<OrderItem, OrderEditError> {
    if quantity <= 0 {
        return Err(OrderEditError::InvalidQuantity);
    }
    let now = state.now_utc();

    let item = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;

        require_checked_in(&tx, occurrence_id)?;
        let product =
            queries::get_product(&tx, product_id)?.ok_or(OrderEditError::ProductNotFound)?;
        if !product.is_active {
            return Err(OrderEditError::ProductInactive);
        }

        let item = match queries::find_order_item(&tx, occurrence_id, product_id)? {
            Some(existing) => {
                let new_quantity = existing.quantity + quantity;
                let total = existing.unit_price * new_quantity;
                queries::set_order_item_quantity(&tx, &existing.id, new_quantity, total)?;
                OrderItem {
                    quantity: new_quantity,
                    total_price: total,
                    ..existing
                }
            }
            None => {
                let item = OrderItem {
                    id: Uuid::new_v4().to_string(),
                    occurrence_id: occurrence_id.to_string(),
                    product_id,
                    product_name: product.name.clone(),
                    quantity,
                    unit_price: product.sale_price,
                    total_price: product.sale_price * quantity,
                    created_at: now,
                };
                queries::insert_order_item(&tx, &item)?;
                item
            }
        };

        tx.commit()?;
        item
    };

    state.publish(EngineEvent::occurrence_updated(occurrence_id));
    Ok(item)
}

/// Sets an item's absolute quantity; 0 takes it off the bill (returns None).
pub fn update_order_item(
    state: &AppState,
    occurrence_id: &str,
    item_id: &str,
    quantity: i64,
) -> Result<Option<OrderItem>, OrderEditError> {
    if quantity < 0 {
        return Err(OrderEditError::InvalidQuantity);
    }

    let item = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;

        require_checked_in(&tx, occurrence_id)?;
        let existing = queries::get_order_item(&tx, item_id)?
            .filter(|i| i.occurrence_id == occurrence_id)
            .ok_or(OrderEditError::LineNotFound)?;

        let item = if quantity == 0 {
            queries::delete_order_item(&tx, item_id)?;
            None
        } else {
            let total = existing.unit_price * quantity;
            queries::set_order_item_quantity(&tx, item_id, quantity, total)?;
            Some(OrderItem {
                quantity,
                total_price: total,
                ..existing
            })
        };

        tx.commit()?;
        item
    };

    state.publish(EngineEvent::occurrence_updated(occurrence_id));
    Ok(item)
}

/// Attaches a service to the session. Fixed services settle their price at
/// add time; hourly ones start a running line the clock bills later.
pub fn add_service_line(
    state: &AppState,
    occurrence_id: &str,
    service_id: i64,
    quantity: i64,
) -> Result<ServiceLine, OrderEditError> {
    if quantity <= 0 {
        return Err(OrderEditError::InvalidQuantity);
    }
    let now = state.now_utc();

    let line = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;

        require_checked_in(&tx, occurrence_id)?;
        let service =
            queries::get_service(&tx, service_id)?.ok_or(OrderEditError::ServiceNotFound)?;
        if !service.is_active {
            return Err(OrderEditError::ServiceInactive);
        }

        let line = match service.billing {
            ServiceBilling::Fixed => ServiceLine {
                id: Uuid::new_v4().to_string(),
                occurrence_id: occurrence_id.to_string(),
                service_id,
                service_name: service.name.clone(),
                quantity,
                unit_price: service.unit_price,
                billing: ServiceBilling::Fixed,
                started_at: None,
                ended_at: None,
                total_price: service.unit_price * quantity,
                created_at: now,
            },
            ServiceBilling::Hourly => ServiceLine {
                id: Uuid::new_v4().to_string(),
                occurrence_id: occurrence_id.to_string(),
                service_id,
                service_name: service.name.clone(),
                quantity,
                unit_price: service.unit_price,
                billing: ServiceBilling::Hourly,
                started_at: Some(now),
                ended_at: None,
                total_price: 0,
                created_at: now,
            },
        };
        queries::insert_service_line(&tx, &line)?;

        tx.commit()?;
        line
    };

    state.publish(EngineEvent::occurrence_updated(occurrence_id));
    Ok(line)
}

/// Stops a running hourly line and bills the elapsed time, rounded to the
/// nearest minor unit.
pub fn end_service_line(state: &AppState, line_id: &str) -> Result<ServiceLine, OrderEditError> {
    let now = state.now_utc();

    let line = {
        let db = state.db.lock().unwrap();
        let tx = db.unchecked_transaction()?;

        let line = queries::get_service_line(&tx, line_id)?.ok_or(OrderEditError::LineNotFound)?;
        if line.billing != ServiceBilling::Hourly {
            return Err(OrderEditError::NotDurationBilled);
        }
        if line.ended_at.is_some() {
            return Err(OrderEditError::LineAlreadyEnded);
        }

        let total = duration_bill(&line, &now);
        let closed = queries::close_service_line(&tx, line_id, &now, total)?;
        if !closed {
            return Err(OrderEditError::LineAlreadyEnded);
        }

        let line = queries::get_service_line(&tx, line_id)?.ok_or(OrderEditError::LineNotFound)?;
        tx.commit()?;
        line
    };

    state.publish(EngineEvent::occurrence_updated(&line.occurrence_id));
    Ok(line)
}

/// Price of a duration line through `at`: whole minutes since the line
/// started, billed at the hourly unit price, rounded half-up.
pub fn duration_bill(line: &ServiceLine, at: &chrono::NaiveDateTime) -> i64 {
    let started = line.started_at.unwrap_or(line.created_at);
    let minutes = (*at - started).num_minutes().max(0);
    (line.unit_price * line.quantity * minutes + 30) / 60
}

fn require_checked_in(conn: &rusqlite::Connection, occurrence_id: &str) -> Result<(), OrderEditError> {
    let occ =
        queries::get_occurrence(conn, occurrence_id)?.ok_or(OrderEditError::OccurrenceNotFound)?;
    if occ.status != OccurrenceStatus::CheckedIn {
        return Err(OrderEditError::NotCheckedIn);
    }
    Ok(())
}
