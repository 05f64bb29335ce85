//! Outbound buyer notifications.
//!
//! When configured via `BOXOFFICE_NOTIFY_WEBHOOK_URL`, boxoffice posts notification
//! events (ticket issued, waitlist slot freed, event reminders) to an
//! external delivery service. Delivery is fire-and-forget: a purchase never
//! fails because an email could not be sent.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use reqwest::Client;
use serde::Serialize;

/// Retry delays in milliseconds for notification webhooks.
/// Quick retries so a spawned task never lingers long past the request.
const NOTIFY_RETRY_DELAYS: &[u64] = &[100, 200];

/// Notification payload posted to the configured webhook.
#[derive(Debug, Clone, Serialize)]
pub struct NotifyEvent {
    /// Event type: "ticket_issued", "payment_failed", "ticket_cancelled",
    /// "waitlist_slot_open", "event_reminder"
    pub event: String,
    pub buyer_id: String,
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    /// Unix timestamp
    pub timestamp: i64,
    /// Unique per send; the delivery service deduplicates our retries on it.
    pub idempotency_key: String,
}

impl NotifyEvent {
    pub fn new(event: &str, buyer_id: &str, event_id: &str, ticket_id: Option<&str>) -> Self {
        Self {
            event: event.to_string(),
            buyer_id: buyer_id.to_string(),
            event_id: event_id.to_string(),
            ticket_id: ticket_id.map(String::from),
            timestamp: chrono::Utc::now().timestamp(),
            idempotency_key: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Spawn a fire-and-forget notification.
///
/// If no webhook URL is configured this is a no-op. The event is sent in a
/// background task; failures are logged and never affect the caller. Panics
/// in the spawned task are logged rather than silently swallowed.
pub fn spawn_notification(webhook_url: Option<String>, event: NotifyEvent) {
    if let Some(url) = webhook_url {
        let event_type = event.event.clone();
        tokio::spawn(
            AssertUnwindSafe(async move {
                send_notification(&Client::new(), &url, &event).await;
            })
            .catch_unwind()
            .map(move |result| {
                if let Err(panic) = result {
                    let panic_msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(
                        "Notification task panicked for event '{}': {}",
                        event_type,
                        panic_msg
                    );
                }
            }),
        );
    }
}

async fn send_notification(client: &Client, url: &str, event: &NotifyEvent) {
    for (attempt, delay_ms) in std::iter::once(&0u64)
        .chain(NOTIFY_RETRY_DELAYS.iter())
        .enumerate()
    {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
        }

        match client
            .post(url)
            .json(event)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                if attempt > 0 {
                    tracing::debug!("Notification webhook succeeded after {} retries", attempt);
                }
                return;
            }
            Ok(resp) => {
                tracing::debug!("Notification webhook returned {}", resp.status());
            }
            Err(e) => {
                tracing::debug!("Notification webhook failed: {}", e);
            }
        }
    }

    tracing::warn!(
        "Notification webhook failed after {} attempts",
        NOTIFY_RETRY_DELAYS.len() + 1
    );
}
