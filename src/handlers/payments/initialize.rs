use axum::extract::State;
use axum::Extension;
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::middleware::AuthedUser;
use crate::models::{CreatePayment, PaymentStatus, Ticket};
use crate::payments::CheckoutSession;
use crate::promo::{self, Quote};

use super::reconcile;

#[derive(Debug, Deserialize)]
pub struct InitializeRequest {
    pub event_id: String,
    #[serde(default)]
    pub ticket_type_id: Option<String>,
    #[serde(default)]
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitializeResponse {
    pub reference: String,
    pub amount_cents: i64,
    pub discount_cents: i64,
    pub status: PaymentStatus,
    /// Hosted checkout the buyer is redirected to; absent on the zero-cost path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout: Option<CheckoutSession>,
    /// Issued immediately on the zero-cost path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,
}

/// Quote a purchase and open a payment.
///
/// Non-zero totals get a PENDING payment plus a hosted checkout session; the
/// payment is confirmed later by verify or webhook. A total of exactly zero
/// (free event or full discount) skips the gateway entirely: the slot is
/// reserved and the ticket issued synchronously.
pub async fn initialize_payment(
    State(state): State<AppState>,
    Extension(AuthedUser(buyer)): Extension<AuthedUser>,
    Json(request): Json<InitializeRequest>,
) -> Result<Json<InitializeResponse>> {
    let mut conn = state.db.get()?;

    let event =
        queries::get_event_by_id(&conn, &request.event_id).or_not_found(msg::EVENT_NOT_FOUND)?;

    let tier = match &request.ticket_type_id {
        Some(tier_id) => {
            let tier =
                queries::get_ticket_type_by_id(&conn, tier_id).or_not_found(msg::TIER_NOT_FOUND)?;
            if tier.event_id != event.id {
                return Err(AppError::BadRequest(
                    "Ticket type does not belong to this event".into(),
                ));
            }
            Some(tier)
        }
        None => {
            if !queries::list_ticket_types(&conn, &event.id)?.is_empty() {
                return Err(AppError::BadRequest(
                    "This event requires selecting a ticket type".into(),
                ));
            }
            None
        }
    };

    // Advisory check; the authoritative reservation is the conditional
    // increment at finalize time.
    let sold_out = match &tier {
        Some(t) => t.sold_count >= t.capacity,
        None => event.sold_count >= event.capacity,
    };
    if sold_out {
        return Err(AppError::BadRequest(msg::SOLD_OUT.into()));
    }

    if queries::buyer_has_live_ticket(
        &conn,
        &buyer.id,
        &event.id,
        request.ticket_type_id.as_deref(),
    )? {
        return Err(AppError::BadRequest(msg::ALREADY_TICKETED.into()));
    }

    let base_cents = tier
        .as_ref()
        .map(|t| t.price_cents)
        .unwrap_or(event.price_cents);

    // Promo codes live in the organizer's namespace
    let (quote, promo_code_id) = match &request.promo_code {
        Some(code) => {
            let promo = queries::get_promo_code(&conn, &event.organizer_id, code)
                .or_not_found(msg::PROMO_NOT_FOUND)?;
            let quote = promo::quote(base_cents, &promo, &event.id, queries::now())?;
            (quote, Some(promo.id))
        }
        None => (Quote::undiscounted(base_cents), None),
    };

    if quote.total_cents == 0 {
        // Zero-cost bypass: no gateway round-trip. Reservation, SUCCESS
        // payment, and ticket all commit together.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Re-check inside the transaction; the guard above ran before it
        if queries::buyer_has_live_ticket(
            &tx,
            &buyer.id,
            &event.id,
            request.ticket_type_id.as_deref(),
        )? {
            return Err(AppError::BadRequest(msg::ALREADY_TICKETED.into()));
        }
        if !queries::reserve_slot(&tx, &event.id, request.ticket_type_id.as_deref())? {
            return Err(AppError::BadRequest(msg::SOLD_OUT.into()));
        }
        let payment = queries::create_payment(
            &tx,
            &CreatePayment {
                buyer_id: buyer.id.clone(),
                event_id: event.id.clone(),
                ticket_type_id: request.ticket_type_id.clone(),
                promo_code_id: promo_code_id.clone(),
                amount_cents: 0,
                discount_cents: quote.discount_cents,
                status: PaymentStatus::Success,
                paid_at: Some(queries::now()),
            },
        )?;
        if let Some(promo_id) = &promo_code_id {
            if !queries::redeem_promo_code(&tx, promo_id)? {
                tracing::warn!("Promo {} exhausted at redemption time", promo_id);
            }
        }
        let ticket = reconcile::issue_ticket(&tx, &state.scan_key, &payment)?;
        tx.commit()?;

        let finalized = reconcile::Finalized {
            payment,
            ticket: Some(ticket),
            transition: reconcile::Transition::Confirmed,
        };
        reconcile::apply_side_effects(&state, &finalized);

        return Ok(Json(InitializeResponse {
            reference: finalized.payment.reference,
            amount_cents: 0,
            discount_cents: finalized.payment.discount_cents,
            status: PaymentStatus::Success,
            checkout: None,
            ticket: finalized.ticket,
        }));
    }

    let payment = queries::create_payment(
        &conn,
        &CreatePayment {
            buyer_id: buyer.id.clone(),
            event_id: event.id.clone(),
            ticket_type_id: request.ticket_type_id.clone(),
            promo_code_id,
            amount_cents: quote.total_cents,
            discount_cents: quote.discount_cents,
            status: PaymentStatus::Pending,
            paid_at: None,
        },
    )?;

    let callback_url = format!("{}/payments/verify/{}", state.base_url, payment.reference);
    let checkout = state
        .gateway
        .initialize(
            &payment.reference,
            &buyer.email,
            payment.amount_cents,
            &callback_url,
        )
        .await?;

    Ok(Json(InitializeResponse {
        reference: payment.reference,
        amount_cents: payment.amount_cents,
        discount_cents: payment.discount_cents,
        status: PaymentStatus::Pending,
        checkout: Some(checkout),
        ticket: None,
    }))
}
