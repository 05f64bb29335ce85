//! Prefixed ID generation for boxoffice entities.
//!
//! All IDs use a `bx_` brand prefix to guarantee collision avoidance with
//! payment gateway identifiers (Paystack's `trx_`, `CUS_`, etc.).
//!
//! Format: `bx_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &[
    "bx_usr_",
    "bx_evt_",
    "bx_tier_",
    "bx_promo_",
    "bx_pay_",
    "bx_tkt_",
    "bx_wl_",
    "bx_rem_",
];

/// Validate that a string is a valid boxoffice prefixed ID.
///
/// Cheap check to reject garbage before hitting the database.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in boxoffice.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    User,
    Event,
    TicketType,
    PromoCode,
    Payment,
    Ticket,
    WaitlistEntry,
    Reminder,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "bx_usr",
            Self::Event => "bx_evt",
            Self::TicketType => "bx_tier",
            Self::PromoCode => "bx_promo",
            Self::Payment => "bx_pay",
            Self::Ticket => "bx_tkt",
            Self::WaitlistEntry => "bx_wl",
            Self::Reminder => "bx_rem",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}

/// Generate an external payment reference: `BX-{timestamp}-{random}`.
///
/// This is the key the gateway echoes back in verify responses and webhook
/// payloads, and the unique handle the reconciler operates on. The timestamp
/// component keeps references roughly sortable; the random suffix makes them
/// unguessable enough that a reference alone does not leak purchase volume.
pub fn gen_payment_reference() -> String {
    let ts = Utc::now().timestamp_millis();
    let rand_part: u64 = rand::thread_rng().gen();
    format!("BX-{}-{:012x}", ts, rand_part & 0xffff_ffff_ffff)
}

/// Generate a short opaque scan code printed alongside the QR credential.
///
/// 10 uppercase alphanumerics, no confusable characters.
pub fn gen_scan_code() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
