use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthedUser;
use crate::models::WaitlistEntry;

/// Join an event's waitlist.
///
/// Only legal while the event is sold out; while capacity remains the buyer
/// should simply purchase. Duplicate joins are a Conflict.
pub async fn join(
    State(state): State<AppState>,
    Extension(AuthedUser(buyer)): Extension<AuthedUser>,
    Path(event_id): Path<String>,
) -> Result<(StatusCode, Json<WaitlistEntry>)> {
    let mut conn = state.db.get()?;

    let event = queries::get_event_by_id(&conn, &event_id).or_not_found(msg::EVENT_NOT_FOUND)?;
    if !queries::is_event_sold_out(&conn, &event)? {
        return Err(AppError::BadRequest(
            "Event still has capacity; purchase a ticket instead".into(),
        ));
    }

    let entry = queries::join_waitlist(&mut conn, &event.id, &buyer.id)?;
    tracing::info!(
        "Buyer joined waitlist for {} at position {}",
        event.id,
        entry.position
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Leave an event's waitlist. Remaining positions are renumbered so they stay
/// contiguous from 1.
pub async fn leave(
    State(state): State<AppState>,
    Extension(AuthedUser(buyer)): Extension<AuthedUser>,
    Path(event_id): Path<String>,
) -> Result<StatusCode> {
    let mut conn = state.db.get()?;

    queries::get_event_by_id(&conn, &event_id).or_not_found(msg::EVENT_NOT_FOUND)?;
    if !queries::leave_waitlist(&mut conn, &event_id, &buyer.id)? {
        return Err(AppError::NotFound("Not on the waitlist".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}
