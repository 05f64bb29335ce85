use serde::{Deserialize, Serialize};

/// Only the fields the purchase flow needs. Content management (description,
/// venue, imagery, publishing) lives in the admin console, out of scope here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub organizer_id: String,
    pub title: String,
    /// Event-level price; bypassed when the event defines ticket types.
    pub price_cents: i64,
    /// Event-level capacity; bypassed when the event defines ticket types.
    pub capacity: i64,
    /// Atomic admission counter. Incremented only by a conditional reserve,
    /// decremented on cancellation.
    pub sold_count: i64,
    /// Minutes before `starts_at` at which a reminder is scheduled, if any.
    pub reminder_offset_mins: Option<i64>,
    pub starts_at: i64,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateEvent {
    pub title: String,
    pub price_cents: i64,
    pub capacity: i64,
    #[serde(default)]
    pub reminder_offset_mins: Option<i64>,
    pub starts_at: i64,
}
