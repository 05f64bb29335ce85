pub mod events;
pub mod payments;
pub mod tickets;
pub mod users;
pub mod waitlist;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::db::AppState;
use crate::middleware::require_auth;

pub async fn health() -> &'static str {
    "OK"
}

/// Endpoints that need no credentials: liveness, registration, the cached
/// availability snapshot, and the signature-authenticated gateway webhook.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/users", post(users::register))
        .route("/events/{id}/availability", get(events::availability))
        .route("/payments/webhook", post(payments::webhook::handle_webhook))
}

/// Endpoints behind Bearer API-key auth.
pub fn authed_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/events", post(events::create_event))
        .route(
            "/events/{id}/ticket-types",
            post(events::create_ticket_type),
        )
        .route("/promo-codes", post(events::create_promo_code))
        .route(
            "/promo-codes/{id}",
            axum::routing::delete(events::deactivate_promo_code),
        )
        .route(
            "/payments/initialize",
            post(payments::initialize::initialize_payment),
        )
        .route(
            "/payments/verify/{reference}",
            get(payments::verify::verify_payment),
        )
        .route("/tickets/verify", post(tickets::verify_scan))
        .route("/tickets/{id}/cancel", put(tickets::cancel_ticket))
        .route(
            "/events/{id}/waitlist",
            post(waitlist::join).delete(waitlist::leave),
        )
        .layer(from_fn_with_state(state, require_auth))
}
