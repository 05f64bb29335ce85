use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for TicketStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "used" => Ok(Self::Used),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

/// Issued only as a side effect of a payment reaching SUCCESS. `payment_id`
/// is unique, which is what enforces exactly one ticket per payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub buyer_id: String,
    pub event_id: String,
    pub ticket_type_id: Option<String>,
    pub payment_id: String,
    /// Short opaque identifier printed next to the QR code.
    pub scan_code: String,
    /// Signed token embedded in the QR representation (see `scan`).
    pub scan_credential: String,
    pub status: TicketStatus,
    pub scanned_at: Option<i64>,
    pub created_at: i64,
}
