use async_trait::async_trait;
use chrono::DateTime;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

use super::{ChargeStatus, CheckoutSession, GatewayCharge, PaymentGateway};

type HmacSha512 = Hmac<Sha512>;

const API_BASE: &str = "https://api.paystack.co";

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Clone)]
pub struct PaystackClient {
    client: Client,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    reference: String,
    status: String,
    amount: i64,
    paid_at: Option<String>,
}

/// Map Paystack's transaction status strings onto our three-state view.
/// Anything that is not terminal ("ongoing", "processing", queued states)
/// stays Pending and leaves the payment untouched.
fn map_status(status: &str) -> ChargeStatus {
    match status {
        "success" => ChargeStatus::Success,
        "failed" | "abandoned" | "reversed" => ChargeStatus::Failed,
        _ => ChargeStatus::Pending,
    }
}

fn parse_paid_at(paid_at: Option<&str>) -> Option<i64> {
    paid_at
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp())
}

impl TransactionData {
    fn into_charge(self) -> GatewayCharge {
        let paid_at = parse_paid_at(self.paid_at.as_deref());
        GatewayCharge {
            status: map_status(&self.status),
            reference: self.reference,
            amount_cents: self.amount,
            paid_at,
        }
    }
}

impl PaystackClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: Client::new(),
            secret_key,
        }
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize(
        &self,
        reference: &str,
        email: &str,
        amount_cents: i64,
        callback_url: &str,
    ) -> Result<CheckoutSession> {
        let response = self
            .client
            .post(format!("{}/transaction/initialize", API_BASE))
            .bearer_auth(&self.secret_key)
            .json(&serde_json::json!({
                "email": email,
                "amount": amount_cents,
                "reference": reference,
                "callback_url": callback_url,
            }))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Gateway API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Gateway API error: {}",
                error_text
            )));
        }

        let body: ApiResponse<InitializeData> = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse gateway response: {}", e)))?;

        let data = match (body.status, body.data) {
            (true, Some(data)) => data,
            _ => {
                return Err(AppError::Internal(format!(
                    "Gateway rejected initialize: {}",
                    body.message
                )))
            }
        };

        Ok(CheckoutSession {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayCharge> {
        let response = self
            .client
            .get(format!("{}/transaction/verify/{}", API_BASE, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Gateway API error: {}", e)))?;

        // NotFound is reserved for our own entities; a reference the gateway
        // has never seen is a caller-side problem.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::BadRequest("Charge not found at gateway".into()));
        }
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Gateway API error: {}",
                error_text
            )));
        }

        let body: ApiResponse<TransactionData> = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse gateway response: {}", e)))?;

        let data = match (body.status, body.data) {
            (true, Some(data)) => data,
            _ => {
                return Err(AppError::Internal(format!(
                    "Gateway rejected verify: {}",
                    body.message
                )))
            }
        };

        Ok(data.into_charge())
    }

    /// Paystack signs the raw webhook body with HMAC-SHA512 keyed by the
    /// account secret key, hex-encoded in the signature header.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let mut mac = HmacSha512::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| AppError::Internal("Invalid gateway secret key".into()))?;
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        let expected_bytes = expected.as_bytes();
        let provided_bytes = signature.as_bytes();

        // Length is not secret (always 128 hex chars for SHA-512), so an
        // early length check does not leak anything useful.
        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        // Constant-time comparison to prevent timing attacks
        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

// ============ Webhook payloads ============

#[derive(Debug, Deserialize)]
pub struct PaystackWebhookEvent {
    pub event: String,
    pub data: PaystackWebhookData,
}

#[derive(Debug, Deserialize)]
pub struct PaystackWebhookData {
    pub reference: String,
    pub status: String,
    pub amount: i64,
    pub paid_at: Option<String>,
}

impl PaystackWebhookData {
    pub fn into_charge(self) -> GatewayCharge {
        let paid_at = parse_paid_at(self.paid_at.as_deref());
        GatewayCharge {
            status: map_status(&self.status),
            reference: self.reference,
            amount_cents: self.amount,
            paid_at,
        }
    }
}
