use axum::extract::State;
use axum::Extension;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthedUser;
use crate::models::{Payment, PaymentStatus, Ticket};

use super::reconcile;

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub payment: Payment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,
}

/// Poll-confirm a payment by reference.
///
/// Terminal payments are answered from the ledger without touching the
/// gateway. A PENDING payment triggers a gateway query and runs the shared
/// reconciler; racing with the webhook is safe because both paths funnel into
/// `finalize_payment`.
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(AuthedUser(buyer)): Extension<AuthedUser>,
    Path(reference): Path<String>,
) -> Result<Json<VerifyResponse>> {
    let mut conn = state.db.get()?;

    let payment = queries::get_payment_by_reference(&conn, &reference)
        .or_not_found(msg::PAYMENT_NOT_FOUND)?;
    if payment.buyer_id != buyer.id {
        return Err(AppError::Forbidden(
            "Payment belongs to another buyer".into(),
        ));
    }

    match payment.status {
        PaymentStatus::Success => {
            let ticket = queries::get_ticket_by_payment(&conn, &payment.id)?;
            return Ok(Json(VerifyResponse { payment, ticket }));
        }
        PaymentStatus::Failed => {
            return Ok(Json(VerifyResponse {
                payment,
                ticket: None,
            }));
        }
        PaymentStatus::Pending => {}
    }

    let charge = state.gateway.verify(&reference).await?;
    let finalized = reconcile::finalize_payment(&mut conn, &state.scan_key, &charge)?;
    reconcile::apply_side_effects(&state, &finalized);

    Ok(Json(VerifyResponse {
        payment: finalized.payment,
        ticket: finalized.ticket,
    }))
}
