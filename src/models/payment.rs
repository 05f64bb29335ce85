use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a purchase attempt. PENDING is the only non-terminal state;
/// SUCCESS and FAILED are each entered at most once, and SUCCESS is idempotent
/// (re-confirming a SUCCESS payment is a no-op).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

/// The ledger row for one purchase attempt, keyed by a unique external
/// `reference` that the gateway echoes back. Mutated only by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub reference: String,
    pub buyer_id: String,
    pub event_id: String,
    pub ticket_type_id: Option<String>,
    pub promo_code_id: Option<String>,
    /// Amount actually charged, after discount.
    pub amount_cents: i64,
    pub discount_cents: i64,
    pub status: PaymentStatus,
    /// Gateway-reported payment time; set exactly once on SUCCESS.
    pub paid_at: Option<i64>,
    pub created_at: i64,
}

/// Insert parameters for a payment row. The reference is generated at insert
/// time. `status`/`paid_at` let the zero-total path write SUCCESS directly.
#[derive(Debug)]
pub struct CreatePayment {
    pub buyer_id: String,
    pub event_id: String,
    pub ticket_type_id: Option<String>,
    pub promo_code_id: Option<String>,
    pub amount_cents: i64,
    pub discount_cents: i64,
    pub status: PaymentStatus,
    pub paid_at: Option<i64>,
}
