use serde::{Deserialize, Serialize};

/// FIFO waitlist entry. Positions for one event are 1-based and contiguous
/// after every mutation; leaving renumbers the remainder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: String,
    pub event_id: String,
    pub buyer_id: String,
    pub position: i64,
    /// Set when the entrant has been offered a freed slot. The slot is not
    /// reserved; admission is re-checked at purchase time.
    pub notified: bool,
    pub created_at: i64,
}
