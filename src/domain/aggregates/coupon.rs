//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    #[default]
    Percentage,
    Fixed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    #[serde(default)]
    pub id: String,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Codes are stored and looked up upper-cased.
pub fn normalize_code(code: &str) -> String { code.trim().to_uppercase() }

impl Coupon {
    pub fn create(code: &str, discount_type: DiscountType, discount_value: Decimal) -> Result<Self, CouponError> {
        let coupon = Self {
            id: String::new(), code: normalize_code(code), discount_type, discount_value, is_active: true,
            expires_at: None, created_at: Some(Utc::now()),
        };
        coupon.validate()?;
        Ok(coupon)
    }

    pub fn validate(&self) -> Result<(), CouponError> {
        if self.code.is_empty() { return Err(CouponError::MissingCode); }
        if self.discount_value <= Decimal::ZERO { return Err(CouponError::NonPositiveValue); }
        if self.discount_type == DiscountType::Percentage && self.discount_value > Decimal::ONE_HUNDRED {
            return Err(CouponError::PercentageOverHundred);
        }
        Ok(())
    }

    /// Active and not past its expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |at| at > now)
    }

    /// Discount this coupon grants on `subtotal`. Not clamped; callers floor the total.
    pub fn discount_for(&self, subtotal: &Money) -> Money {
        match self.discount_type {
            DiscountType::Percentage => subtotal.percent(self.discount_value),
            DiscountType::Fixed => Money::new(self.discount_value, subtotal.currency()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CouponError { MissingCode, NonPositiveValue, PercentageOverHundred }
impl std::error::Error for CouponError {}
impl fmt::Display for CouponError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCode => write!(f, "Coupon code is required"),
            Self::NonPositiveValue => write!(f, "Discount value must be greater than zero"),
            Self::PercentageOverHundred => write!(f, "Percentage discount cannot exceed 100"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_create_normalizes_code() {
        let c = Coupon::create(" save10 ", DiscountType::Percentage, Decimal::new(10, 0)).unwrap();
        assert_eq!(c.code, "SAVE10");
        assert!(c.is_active);
        assert_eq!(Coupon::create("X", DiscountType::Percentage, Decimal::new(101, 0)), Err(CouponError::PercentageOverHundred));
        assert_eq!(Coupon::create("X", DiscountType::Fixed, Decimal::ZERO), Err(CouponError::NonPositiveValue));
    }

    #[test]
    fn test_discount_for() {
        let subtotal = Money::naira(Decimal::new(10_000, 0));
        let pct = Coupon::create("TEN", DiscountType::Percentage, Decimal::new(10, 0)).unwrap();
        assert_eq!(pct.discount_for(&subtotal).amount(), Decimal::new(1_000, 0));
        let fixed = Coupon::create("FLAT", DiscountType::Fixed, Decimal::new(2_500, 0)).unwrap();
        assert_eq!(fixed.discount_for(&subtotal).amount(), Decimal::new(2_500, 0));
    }

    #[test]
    fn test_expired_coupon_is_not_usable() {
        let now = Utc::now();
        let mut c = Coupon::create("OLD", DiscountType::Fixed, Decimal::ONE).unwrap();
        c.expires_at = Some(now - Duration::days(1));
        assert!(!c.is_usable(now));
        c.expires_at = Some(now + Duration::days(1));
        assert!(c.is_usable(now));
    }

    #[test]
    fn test_decodes_stored_document() {
        let c: Coupon = serde_json::from_value(json!({
            "id": "k", "code": "WELCOME", "discount_type": "fixed", "discount_value": 500,
            "is_active": false, "createdAt": 1_700_000_000_000_i64
        }))
        .unwrap();
        assert_eq!(c.discount_type, DiscountType::Fixed);
        assert!(!c.is_usable(Utc::now()));
    }
}
