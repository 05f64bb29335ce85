//! Ticket scan credentials.
//!
//! A scan credential is the signed token embedded in a ticket's QR
//! representation. It binds {ticket id, event id, buyer id, random nonce}
//! under an HMAC (HS256) shared secret with a long validity window, so a
//! credential printed at purchase time still verifies at the door even for
//! events scheduled far out.
//!
//! The ticket id is pre-generated before the ticket row is written, so the
//! credential embeds the real id and issuance is a single write.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use jwt_simple::prelude::*;

use crate::error::{AppError, Result};

/// Credential validity window. Long on purpose: the credential must outlive
/// the event, and revocation happens through ticket status, not expiry.
const CREDENTIAL_VALIDITY_DAYS: u64 = 366;

const SCAN_KEY_SIZE: usize = 32;

/// Custom claims bound into every scan credential.
/// Standard claims (iss, iat, exp, nonce via jti) are handled by jwt-simple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanClaims {
    pub ticket_id: String,
    pub event_id: String,
    pub buyer_id: String,
}

/// Shared secret for signing and verifying scan credentials.
#[derive(Clone)]
pub struct ScanKey {
    key: HS256Key,
}

impl std::fmt::Debug for ScanKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ScanKey(..)")
    }
}

impl ScanKey {
    /// Create a ScanKey from a base64-encoded 32-byte secret.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::Internal(format!("Invalid scan key encoding: {}", e)))?;

        if decoded.len() != SCAN_KEY_SIZE {
            return Err(AppError::Internal(format!(
                "Scan key must be {} bytes, got {}",
                SCAN_KEY_SIZE,
                decoded.len()
            )));
        }

        Ok(Self {
            key: HS256Key::from_bytes(&decoded),
        })
    }

    /// Generate a fresh random key (dev mode / initial setup).
    pub fn generate() -> Self {
        Self {
            key: HS256Key::generate(),
        }
    }

    /// Create a ScanKey from raw bytes. Intended for tests.
    pub fn from_bytes(bytes: &[u8; SCAN_KEY_SIZE]) -> Self {
        Self {
            key: HS256Key::from_bytes(bytes),
        }
    }

    /// Sign a scan credential for a ticket.
    ///
    /// The jti carries a random nonce so two credentials for the same ticket
    /// fields are never byte-identical.
    pub fn sign_credential(
        &self,
        ticket_id: &str,
        event_id: &str,
        buyer_id: &str,
    ) -> Result<String> {
        let custom = ScanClaims {
            ticket_id: ticket_id.to_string(),
            event_id: event_id.to_string(),
            buyer_id: buyer_id.to_string(),
        };

        let nonce = uuid::Uuid::new_v4().as_simple().to_string();
        let claims =
            Claims::with_custom_claims(custom, Duration::from_days(CREDENTIAL_VALIDITY_DAYS))
                .with_issuer("boxoffice")
                .with_jwt_id(nonce);

        self.key
            .authenticate(claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign scan credential: {}", e)))
    }

    /// Verify a scan credential and return its claims.
    ///
    /// Malformed, expired, or signature-invalid credentials all surface as
    /// BadRequest; the scan endpoint reports the reason, never a generic 500.
    pub fn verify_credential(&self, credential: &str) -> Result<ScanClaims> {
        let options = VerificationOptions {
            allowed_issuers: Some(std::collections::HashSet::from(["boxoffice".to_string()])),
            ..Default::default()
        };

        let claims = self
            .key
            .verify_token::<ScanClaims>(credential, Some(options))
            .map_err(|e| AppError::BadRequest(format!("Invalid scan credential: {}", e)))?;

        Ok(claims.custom)
    }
}
