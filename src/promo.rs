//! Promo code validation and discount math.
//!
//! All money math is integer cents. A percentage discount rounds to the
//! nearest cent; a fixed discount is capped at the base price so the total
//! never goes negative.

use crate::error::{AppError, Result};
use crate::models::{DiscountType, PromoCode};

/// A priced purchase before payment is initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub base_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

impl Quote {
    pub fn undiscounted(base_cents: i64) -> Self {
        Self {
            base_cents,
            discount_cents: 0,
            total_cents: base_cents,
        }
    }
}

/// Compute the discount a promo code grants on a base price.
pub fn apply_discount(base_cents: i64, promo: &PromoCode) -> Quote {
    let discount_cents = match promo.discount_type {
        // Round to the nearest cent
        DiscountType::Percentage => (base_cents * promo.discount_value + 50) / 100,
        DiscountType::Fixed => promo.discount_value.min(base_cents),
    };
    let discount_cents = discount_cents.min(base_cents).max(0);
    Quote {
        base_cents,
        discount_cents,
        total_cents: base_cents - discount_cents,
    }
}

/// Validate a promo code for a purchase and price the quote.
///
/// Rejections are BadRequest with a reason the buyer can act on. The usage
/// cap is re-checked atomically at redemption time; this check only gives an
/// early, friendlier error.
pub fn quote(base_cents: i64, promo: &PromoCode, event_id: &str, now: i64) -> Result<Quote> {
    if !promo.active {
        return Err(AppError::BadRequest("Promo code is no longer active".into()));
    }
    if let Some(expires_at) = promo.expires_at {
        if now >= expires_at {
            return Err(AppError::BadRequest("Promo code has expired".into()));
        }
    }
    if let Some(max_uses) = promo.max_uses {
        if promo.used_count >= max_uses {
            return Err(AppError::BadRequest(
                "Promo code has reached its usage limit".into(),
            ));
        }
    }
    if let Some(ref scoped_event) = promo.event_id {
        if scoped_event != event_id {
            return Err(AppError::BadRequest(
                "Promo code is not valid for this event".into(),
            ));
        }
    }
    Ok(apply_discount(base_cents, promo))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn promo(discount_type: DiscountType, value: i64) -> PromoCode {
        PromoCode {
            id: "bx_promo_test".to_string(),
            creator_id: "bx_usr_test".to_string(),
            event_id: None,
            code: "TEST".to_string(),
            discount_type,
            discount_value: value,
            max_uses: None,
            used_count: 0,
            active: true,
            expires_at: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let q = quote(5000, &promo(DiscountType::Percentage, 20), "bx_evt_a", 100).unwrap();
        assert_eq!(q.discount_cents, 1000);
        assert_eq!(q.total_cents, 4000);
    }

    #[test]
    fn test_percentage_rounds_to_nearest_cent() {
        // 15% of 999 = 149.85, rounds to 150
        let q = apply_discount(999, &promo(DiscountType::Percentage, 15));
        assert_eq!(q.discount_cents, 150);
        assert_eq!(q.total_cents, 849);
    }

    #[test]
    fn test_fixed_discount_capped_at_base() {
        let q = quote(5000, &promo(DiscountType::Fixed, 7000), "bx_evt_a", 100).unwrap();
        assert_eq!(q.discount_cents, 5000);
        assert_eq!(q.total_cents, 0);
    }

    #[test]
    fn test_full_percentage_zeroes_total() {
        let q = apply_discount(5000, &promo(DiscountType::Percentage, 100));
        assert_eq!(q.total_cents, 0);
    }

    #[test]
    fn test_inactive_rejected() {
        let mut p = promo(DiscountType::Fixed, 100);
        p.active = false;
        assert!(quote(5000, &p, "bx_evt_a", 100).is_err());
    }

    #[test]
    fn test_expired_rejected() {
        let mut p = promo(DiscountType::Fixed, 100);
        p.expires_at = Some(50);
        assert!(quote(5000, &p, "bx_evt_a", 100).is_err());
        // Not yet expired
        p.expires_at = Some(200);
        assert!(quote(5000, &p, "bx_evt_a", 100).is_ok());
    }

    #[test]
    fn test_exhausted_rejected() {
        let mut p = promo(DiscountType::Fixed, 100);
        p.max_uses = Some(3);
        p.used_count = 3;
        assert!(quote(5000, &p, "bx_evt_a", 100).is_err());
    }

    #[test]
    fn test_event_scope_enforced() {
        let mut p = promo(DiscountType::Fixed, 100);
        p.event_id = Some("bx_evt_other".to_string());
        assert!(quote(5000, &p, "bx_evt_a", 100).is_err());
        p.event_id = Some("bx_evt_a".to_string());
        assert!(quote(5000, &p, "bx_evt_a", 100).is_ok());
    }
}
