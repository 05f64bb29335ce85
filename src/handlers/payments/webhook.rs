use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::db::AppState;
use crate::error::AppError;
use crate::payments::paystack::{PaystackWebhookEvent, SIGNATURE_HEADER};

use super::reconcile;

/// Result type for webhook operations. The gateway only cares about the
/// status code; the text is for its delivery logs.
pub type WebhookResult = (StatusCode, &'static str);

/// Gateway push notifications.
///
/// The raw body is authenticated with HMAC-SHA512 before anything is parsed.
/// Once the signature checks out we trust the embedded charge status and run
/// the shared reconciler. Unknown references answer 200 so the gateway stops
/// retrying deliveries we will never be able to match.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::UNAUTHORIZED, "Missing signature");
    };

    match state.gateway.verify_webhook_signature(&body, signature) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Webhook rejected: signature mismatch");
            return (StatusCode::UNAUTHORIZED, "Invalid signature");
        }
        Err(e) => {
            tracing::error!("Webhook signature check failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Signature check failed");
        }
    }

    let event: PaystackWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(_) => return (StatusCode::BAD_REQUEST, "Malformed payload"),
    };

    if !matches!(event.event.as_str(), "charge.success" | "charge.failed") {
        return (StatusCode::OK, "Ignored");
    }

    let charge = event.data.into_charge();

    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Pool error in webhook: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable");
        }
    };

    match reconcile::finalize_payment(&mut conn, &state.scan_key, &charge) {
        Ok(finalized) => {
            reconcile::apply_side_effects(&state, &finalized);
            (StatusCode::OK, "Processed")
        }
        // A reference we never created; acknowledge so the gateway stops retrying
        Err(AppError::NotFound(_)) => (StatusCode::OK, "Unknown reference"),
        Err(e) => {
            tracing::error!("Webhook processing failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Processing error")
        }
    }
}
