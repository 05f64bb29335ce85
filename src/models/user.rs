use serde::{Deserialize, Serialize};

/// Buyers and organizers are both users; organizer-ship is a property of the
/// event (`events.organizer_id`), not a role on the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// SHA-256 hex digest of the API key. Never serialized.
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
}
