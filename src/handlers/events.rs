use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::id::is_valid_prefixed_id;
use crate::middleware::AuthedUser;
use crate::models::{CreateEvent, CreatePromoCode, CreateTicketType, Event, PromoCode, TicketType};

/// How long an availability snapshot may be served stale.
const AVAILABILITY_TTL: Duration = Duration::from_secs(5);

/// Cached remaining-capacity snapshot. Advisory only: the purchase path does
/// its own conditional reservation, so a stale read here can never oversell.
pub async fn availability(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    // Unauthenticated endpoint; reject garbage ids before touching cache or db
    if !is_valid_prefixed_id(&event_id) {
        return Err(AppError::NotFound(msg::EVENT_NOT_FOUND.into()));
    }

    let cache_key = format!("event:{}:availability", event_id);
    if let Some(hit) = state.cache.get(&cache_key) {
        return Ok(Json(hit));
    }

    let conn = state.db.get()?;
    let availability =
        queries::event_availability(&conn, &event_id).or_not_found(msg::EVENT_NOT_FOUND)?;

    let value = serde_json::to_value(&availability)?;
    state.cache.set(&cache_key, value.clone(), AVAILABILITY_TTL);
    Ok(Json(value))
}

/// Create an event; the caller becomes its organizer.
pub async fn create_event(
    State(state): State<AppState>,
    Extension(AuthedUser(organizer)): Extension<AuthedUser>,
    Json(request): Json<CreateEvent>,
) -> Result<(StatusCode, Json<Event>)> {
    let conn = state.db.get()?;
    let event = queries::create_event(&conn, &organizer.id, &request)?;
    tracing::info!("Event {} created by {}", event.id, organizer.id);
    Ok((StatusCode::CREATED, Json(event)))
}

/// Add a ticket tier to an event. Organizer only.
pub async fn create_ticket_type(
    State(state): State<AppState>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(event_id): Path<String>,
    Json(request): Json<CreateTicketType>,
) -> Result<(StatusCode, Json<TicketType>)> {
    let conn = state.db.get()?;
    let event = queries::get_event_by_id(&conn, &event_id).or_not_found(msg::EVENT_NOT_FOUND)?;
    if event.organizer_id != caller.id {
        return Err(AppError::Forbidden(
            "Only the event organizer can add ticket types".into(),
        ));
    }

    let tier = queries::create_ticket_type(&conn, &event.id, &request)?;
    state
        .cache
        .invalidate_prefix(&format!("event:{}", event.id));
    Ok((StatusCode::CREATED, Json(tier)))
}

/// Create a promo code in the caller's namespace, optionally scoped to one of
/// their events.
pub async fn create_promo_code(
    State(state): State<AppState>,
    Extension(AuthedUser(creator)): Extension<AuthedUser>,
    Json(request): Json<CreatePromoCode>,
) -> Result<(StatusCode, Json<PromoCode>)> {
    let conn = state.db.get()?;

    if let Some(event_id) = &request.event_id {
        let event = queries::get_event_by_id(&conn, event_id).or_not_found(msg::EVENT_NOT_FOUND)?;
        if event.organizer_id != creator.id {
            return Err(AppError::Forbidden(
                "Promo codes can only be scoped to your own events".into(),
            ));
        }
    }

    let promo = queries::create_promo_code(&conn, &creator.id, &request)?;
    Ok((StatusCode::CREATED, Json(promo)))
}

/// Deactivate a promo code. Quotes against it fail from here on; payments
/// already in flight still redeem.
pub async fn deactivate_promo_code(
    State(state): State<AppState>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(promo_id): Path<String>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    let promo =
        queries::get_promo_code_by_id(&conn, &promo_id).or_not_found(msg::PROMO_NOT_FOUND)?;
    if promo.creator_id != caller.id {
        return Err(AppError::Forbidden(
            "Only the creator can deactivate a promo code".into(),
        ));
    }

    queries::deactivate_promo_code(&conn, &promo.id)?;
    Ok(StatusCode::NO_CONTENT)
}
