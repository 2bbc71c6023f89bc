use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{events, health_check, orders, scanner};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let order_routes = Router::new()
        .route("/events/:event_id", get(events::get_event))
        .route("/events/:event_id/orders", post(orders::create_order))
        .route("/orders/:order_id", get(orders::get_order))
        .route(
            "/orders/:order_id/confirm-payment",
            post(orders::confirm_payment),
        )
        .route("/orders/:order_id/tickets", get(orders::order_tickets));

    let scanner_routes = Router::new()
        .route("/scan", post(scanner::scan))
        .route("/tickets/:ticket_id/scans", get(scanner::scan_history));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", order_routes.nest("/scanner", scanner_routes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config.production))
        .layer(create_cors_layer(&config.allowed_origins))
}
