//! User profile and the records nested under it:
//! `users/{id}`, `users/{id}/addresses`, `users/{id}/paymentMethods`,
//! `users/{id}/wishlist`.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(rename = "notifications_orders", default)]
    pub notifications_orders: bool,
    #[serde(rename = "notifications_promos", default)]
    pub notifications_promos: bool,
    #[serde(rename = "notifications_newsletter", default)]
    pub notifications_newsletter: bool,
    #[serde(default)]
    pub loyalty_points: u64,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn full_name(&self) -> String { format!("{} {}", self.first_name, self.last_name).trim().to_string() }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty() || self.full_name().to_lowercase().contains(&term) || self.email.to_lowercase().contains(&term)
    }

    pub fn notification_preferences(&self) -> NotificationPreferences {
        NotificationPreferences {
            orders: self.notifications_orders,
            promos: self.notifications_promos,
            newsletter: self.notifications_newsletter,
        }
    }
}

/// Editable profile fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 80))]
    pub first_name: String,
    #[validate(length(min = 1, max = 80))]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub phone: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub orders: bool,
    pub promos: bool,
    pub newsletter: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[serde(default)]
    pub id: String,
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(rename = "createdAt", default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardType { Visa, Mastercard }

/// A saved card. Only the last four digits are ever kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCard {
    #[serde(default)]
    pub id: String,
    pub card_type: CardType,
    pub last4: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    #[serde(default)]
    pub is_default: bool,
    #[serde(rename = "createdAt", default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SavedCard {
    /// Build from a raw card number and an `MM/YY` expiry.
    /// Cards starting with `4` are Visa, anything else Mastercard.
    pub fn from_input(card_number: &str, expiry: &str, now: DateTime<Utc>) -> Result<Self, CardError> {
        let digits: String = card_number.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
        if !(12..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CardError::InvalidNumber);
        }
        let (month, year) = expiry.split_once('/').ok_or(CardError::InvalidExpiry)?;
        let month: u32 = month.trim().parse().map_err(|_| CardError::InvalidExpiry)?;
        let year: i32 = year.trim().parse().map_err(|_| CardError::InvalidExpiry)?;
        if !(1..=12).contains(&month) || !(0..100).contains(&year) { return Err(CardError::InvalidExpiry); }
        let year = 2000 + year;
        if (year, month) < (now.year(), now.month()) { return Err(CardError::Expired); }

        Ok(Self {
            id: String::new(),
            card_type: if digits.starts_with('4') { CardType::Visa } else { CardType::Mastercard },
            last4: digits[digits.len() - 4..].to_string(),
            expiry_month: month,
            expiry_year: year,
            is_default: false,
            created_at: Some(now),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CardError { InvalidNumber, InvalidExpiry, Expired }
impl std::error::Error for CardError {}
impl fmt::Display for CardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNumber => write!(f, "Invalid card number"),
            Self::InvalidExpiry => write!(f, "Expiry must be MM/YY"),
            Self::Expired => write!(f, "Card has expired"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    #[serde(default)]
    pub id: String,
    pub product_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_profile_decodes_sparse_document() {
        let u: UserProfile = serde_json::from_value(json!({"id": "u1", "email": "ada@example.com", "firstName": "Ada", "isAdmin": true})).unwrap();
        assert!(u.is_admin);
        assert_eq!(u.loyalty_points, 0);
        assert!(u.matches_search("ADA"));
        assert!(u.matches_search("example.com"));
        assert!(!u.notification_preferences().orders);
    }

    #[test]
    fn test_saved_card_from_input() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let card = SavedCard::from_input("4111 1111 1111 1234", "09/28", now).unwrap();
        assert_eq!(card.card_type, CardType::Visa);
        assert_eq!(card.last4, "1234");
        assert_eq!(card.expiry_year, 2028);

        let mc = SavedCard::from_input("5500-0000-0000-0004", "03/26", now).unwrap();
        assert_eq!(mc.card_type, CardType::Mastercard);

        assert_eq!(SavedCard::from_input("4111", "09/28", now), Err(CardError::InvalidNumber));
        assert_eq!(SavedCard::from_input("4111111111111111", "13/28", now), Err(CardError::InvalidExpiry));
        assert_eq!(SavedCard::from_input("4111111111111111", "02/26", now), Err(CardError::Expired));
    }

    #[test]
    fn test_address_validation() {
        let a = Address { street: "1 Allen Ave".into(), city: "Ikeja".into(), state: "".into(), ..Default::default() };
        assert!(a.validate().is_err());
    }
}
