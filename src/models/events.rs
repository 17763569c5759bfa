use serde::Serialize;

/// A realtime event fanned out to SSE subscribers. Kinds mirror what the
/// front desk screens listen for.
#[derive(Debug, Clone, Serialize)]
pub struct EngineEvent {
    pub kind: String,
    pub entity_id: String,
}

impl EngineEvent {
    fn new(kind: &str, entity_id: &str) -> Self {
        Self {
            kind: kind.to_string(),
            entity_id: entity_id.to_string(),
        }
    }

    pub fn booking_updated(id: &str) -> Self {
        Self::new("bookingUpdated", id)
    }

    pub fn occurrence_updated(id: &str) -> Self {
        Self::new("occurrenceUpdated", id)
    }

    pub fn payment_updated(id: &str) -> Self {
        Self::new("paymentUpdated", id)
    }

    pub fn order_updated(id: &str) -> Self {
        Self::new("orderUpdated", id)
    }
}
