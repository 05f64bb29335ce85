//! Payment gateway abstraction.
//!
//! Handlers talk to a `PaymentGateway` trait object so the reconciler can be
//! tested against a mock without touching the network. The production
//! implementation is `paystack::PaystackClient`.

pub mod paystack;

use async_trait::async_trait;

use crate::error::Result;

/// Gateway-reported state of a charge. The reconciler only ever acts on
/// `Success` and `Failed`; `Pending` leaves the payment untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStatus {
    Success,
    Failed,
    Pending,
}

/// The gateway's view of one charge, keyed by our payment reference.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub reference: String,
    pub status: ChargeStatus,
    /// Amount the gateway actually collected, in minor units.
    pub amount_cents: i64,
    /// Gateway-reported payment time (unix seconds), present on success.
    pub paid_at: Option<i64>,
}

/// A hosted checkout page the buyer is redirected to.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutSession {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session for a charge.
    async fn initialize(
        &self,
        reference: &str,
        email: &str,
        amount_cents: i64,
        callback_url: &str,
    ) -> Result<CheckoutSession>;

    /// Ask the gateway for the authoritative state of a charge.
    async fn verify(&self, reference: &str) -> Result<GatewayCharge>;

    /// Check a webhook body against its signature header.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool>;
}
