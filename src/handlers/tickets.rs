use axum::extract::State;
use axum::Extension;
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthedUser;
use crate::models::{Ticket, TicketStatus};
use crate::notify::{spawn_notification, NotifyEvent};

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub credential: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub ticket_id: String,
    pub scan_code: String,
    pub buyer_name: String,
    pub status: TicketStatus,
    pub scanned_at: i64,
}

/// Check a ticket in at the door.
///
/// The credential is verified cryptographically before any lookup, so forged
/// or expired tokens never touch ticket state. The ACTIVE→USED flip is a
/// conditional update; when two scanners race, exactly one wins and the other
/// is told the ticket is already used.
pub async fn verify_scan(
    State(state): State<AppState>,
    Extension(AuthedUser(scanner)): Extension<AuthedUser>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResponse>> {
    let claims = state.scan_key.verify_credential(&request.credential)?;

    let conn = state.db.get()?;
    let ticket =
        queries::get_ticket_by_id(&conn, &claims.ticket_id).or_not_found(msg::TICKET_NOT_FOUND)?;
    let event =
        queries::get_event_by_id(&conn, &ticket.event_id).or_not_found(msg::EVENT_NOT_FOUND)?;

    if event.organizer_id != scanner.id {
        return Err(AppError::Forbidden(
            "Only the event organizer can check in tickets".into(),
        ));
    }
    if ticket.event_id != claims.event_id || ticket.buyer_id != claims.buyer_id {
        return Err(AppError::BadRequest(
            "Credential does not match the ticket".into(),
        ));
    }

    match ticket.status {
        TicketStatus::Cancelled => Err(AppError::BadRequest("Ticket has been cancelled".into())),
        TicketStatus::Used => Err(AppError::BadRequest("Ticket has already been used".into())),
        TicketStatus::Active => {
            let scanned_at = queries::now();
            if !queries::try_mark_ticket_used(&conn, &ticket.id, scanned_at)? {
                // Lost a race with a concurrent scan
                return Err(AppError::BadRequest("Ticket has already been used".into()));
            }

            let buyer_name = queries::get_user_by_id(&conn, &ticket.buyer_id)?
                .map(|u| u.name)
                .unwrap_or_default();

            tracing::info!("Ticket {} checked in for event {}", ticket.id, event.id);
            Ok(Json(ScanResponse {
                ticket_id: ticket.id,
                scan_code: ticket.scan_code,
                buyer_name,
                status: TicketStatus::Used,
                scanned_at,
            }))
        }
    }
}

/// Cancel an ACTIVE ticket.
///
/// Cancellation, the slot release, and the waitlist promotion pick all commit
/// in one transaction; the freed slot is advertised, not reserved, so the
/// promoted entrant still purchases normally.
pub async fn cancel_ticket(
    State(state): State<AppState>,
    Extension(AuthedUser(caller)): Extension<AuthedUser>,
    Path(ticket_id): Path<String>,
) -> Result<Json<Ticket>> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut ticket =
        queries::get_ticket_by_id(&tx, &ticket_id).or_not_found(msg::TICKET_NOT_FOUND)?;
    if ticket.buyer_id != caller.id {
        return Err(AppError::Forbidden(
            "Only the ticket holder can cancel it".into(),
        ));
    }
    if !queries::try_cancel_ticket(&tx, &ticket.id)? {
        return Err(AppError::BadRequest(
            "Only an active ticket can be cancelled".into(),
        ));
    }

    queries::release_slot(&tx, &ticket.event_id, ticket.ticket_type_id.as_deref())?;

    let promoted = queries::next_unnotified_entry(&tx, &ticket.event_id)?;
    if let Some(entry) = &promoted {
        queries::mark_waitlist_notified(&tx, &entry.id)?;
    }
    tx.commit()?;

    state
        .cache
        .invalidate_prefix(&format!("event:{}", ticket.event_id));

    spawn_notification(
        state.notify_webhook_url.clone(),
        NotifyEvent::new(
            "ticket_cancelled",
            &ticket.buyer_id,
            &ticket.event_id,
            Some(&ticket.id),
        ),
    );
    if let Some(entry) = &promoted {
        tracing::info!(
            "Waitlist position {} promoted for event {}",
            entry.position,
            entry.event_id
        );
        spawn_notification(
            state.notify_webhook_url.clone(),
            NotifyEvent::new("waitlist_slot_open", &entry.buyer_id, &entry.event_id, None),
        );
    }

    ticket.status = TicketStatus::Cancelled;
    Ok(Json(ticket))
}
