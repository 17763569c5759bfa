use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::EngineEvent;
use crate::services::clock::Clock;
use crate::services::notify::NotificationDispatcher;
use crate::services::vouchers::VoucherValidator;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub clock: Box<dyn Clock>,
    pub notifier: Box<dyn NotificationDispatcher>,
    pub vouchers: Box<dyn VoucherValidator>,
    pub events_tx: broadcast::Sender<EngineEvent>,
}

impl AppState {
    /// Venue wall-clock now.
    pub fn now_local(&self) -> chrono::NaiveDateTime {
        self.clock.now_local(self.config.tz_offset_minutes)
    }

    /// Naive UTC now, the format timestamps are stored in.
    pub fn now_utc(&self) -> chrono::NaiveDateTime {
        self.clock.now_utc().naive_utc()
    }

    /// Fan out a realtime event; nobody listening is fine.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.events_tx.send(event);
    }
}
