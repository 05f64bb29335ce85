use serde::{Deserialize, Serialize};

/// Optional named sub-product of an event with its own price and capacity.
/// When any ticket types exist for an event, the event-level price/capacity
/// are bypassed in favor of tier-level pricing and admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketType {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub price_cents: i64,
    pub capacity: i64,
    pub sold_count: i64,
    pub sort_order: i64,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketType {
    pub name: String,
    pub price_cents: i64,
    pub capacity: i64,
    #[serde(default)]
    pub sort_order: i64,
}
