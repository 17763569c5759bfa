use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use courtbook::config::AppConfig;
use courtbook::db;
use courtbook::handlers;
use courtbook::services::clock::SystemClock;
use courtbook::services::holds;
use courtbook::services::notify::{LogNotifier, NotificationDispatcher, RelayNotifier};
use courtbook::services::vouchers::SqliteVoucherStore;
use courtbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn NotificationDispatcher> = if config.notify_webhook_url.is_empty() {
        tracing::info!("no notify webhook configured, notifications go to the log");
        Box::new(LogNotifier)
    } else {
        tracing::info!("relaying notifications to {}", config.notify_webhook_url);
        Box::new(RelayNotifier::new(config.notify_webhook_url.clone()))
    };

    let (events_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        clock: Box::new(SystemClock),
        notifier,
        vouchers: Box::new(SqliteVoucherStore),
        events_tx,
    });

    tokio::spawn(holds::run_sweeper(state.clone()));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/bank", post(handlers::webhook::bank_webhook))
        .route("/api/status", get(handlers::courts::get_status))
        .route(
            "/api/courts",
            post(handlers::courts::create_court).get(handlers::courts::list_courts),
        )
        .route("/api/courts/:id", get(handlers::courts::get_court))
        .route(
            "/api/courts/:id/schedule",
            get(handlers::courts::get_schedule),
        )
        .route(
            "/api/customers",
            post(handlers::catalog::create_customer).get(handlers::catalog::list_customers),
        )
        .route(
            "/api/products",
            post(handlers::catalog::create_product).get(handlers::catalog::list_products),
        )
        .route(
            "/api/services",
            post(handlers::catalog::create_service).get(handlers::catalog::list_services),
        )
        .route(
            "/api/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_bookings),
        )
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/occurrences/:id",
            get(handlers::occurrences::get_occurrence),
        )
        .route(
            "/api/occurrences/:id/check-in",
            post(handlers::occurrences::check_in),
        )
        .route(
            "/api/occurrences/:id/check-out",
            post(handlers::occurrences::check_out),
        )
        .route(
            "/api/occurrences/:id/cancel",
            post(handlers::occurrences::cancel),
        )
        .route(
            "/api/occurrences/:id/no-show",
            post(handlers::occurrences::no_show),
        )
        .route(
            "/api/occurrences/:id/items",
            post(handlers::occurrences::add_item).put(handlers::occurrences::update_item),
        )
        .route(
            "/api/occurrences/:id/services",
            post(handlers::occurrences::add_service),
        )
        .route(
            "/api/service-lines/:id/end",
            post(handlers::occurrences::end_service),
        )
        .route(
            "/api/occurrences/:id/checkout",
            post(handlers::orders::checkout),
        )
        .route("/api/orders/:id", get(handlers::orders::get_order))
        .route(
            "/api/orders/:id/extend-payment",
            post(handlers::orders::extend_payment),
        )
        .route(
            "/api/vouchers",
            post(handlers::vouchers::create_voucher).get(handlers::vouchers::list_vouchers),
        )
        .route(
            "/api/vouchers/validate",
            post(handlers::vouchers::validate_voucher),
        )
        .route("/api/events", get(handlers::events::events_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
