use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        };
        f.write_str(s)
    }
}

impl FromStr for DiscountType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            _ => Err(()),
        }
    }
}

/// A discount code scoped to a creator's namespace, optionally to one event.
/// `used_count` never exceeds `max_uses`; the increment is an atomic
/// conditional update applied only after a successful payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: String,
    pub creator_id: String,
    /// When set, the code is only valid for this event.
    pub event_id: Option<String>,
    /// Stored uppercase; lookups normalize the input.
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub active: bool,
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePromoCode {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub max_uses: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}
