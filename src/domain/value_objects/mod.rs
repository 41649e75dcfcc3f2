//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NAIRA: &str = "NGN";

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn naira(amount: Decimal) -> Self { Self::new(amount, NAIRA) }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    pub fn sub(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount - other.amount, &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// `percent` of this amount, e.g. `percent(10)` of 10,000 is 1,000.
    pub fn percent(&self, percent: Decimal) -> Money {
        Money::new(self.amount * percent / Decimal::ONE_HUNDRED, &self.currency)
    }

    /// Clamp negative amounts to zero.
    pub fn floor_zero(self) -> Money {
        if self.amount.is_sign_negative() { Money::zero(&self.currency) } else { self }
    }

    pub fn display(&self) -> String {
        if self.currency == NAIRA { format_naira(self.amount) } else { format!("{} {}", self.currency, self.amount) }
    }
}

impl Default for Money { fn default() -> Self { Self::zero(NAIRA) } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.display()) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// Format an amount as Nigerian Naira: `₦` prefix, comma grouping, whole naira.
///
/// Fractional kobo are rounded half away from zero.
pub fn format_naira(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 { grouped.push(','); }
        grouped.push(ch);
    }
    if rounded.is_sign_negative() && !rounded.is_zero() { format!("-₦{grouped}") } else { format!("₦{grouped}") }
}

/// Category slug derived from a display name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Lowercase, collapse whitespace runs into `-`, drop anything outside `[a-z0-9_-]`.
    pub fn from_name(name: &str) -> Self {
        let mut out = String::with_capacity(name.len());
        let mut in_space = false;
        for ch in name.trim().chars().flat_map(char::to_lowercase) {
            if ch.is_whitespace() {
                if !in_space { out.push('-'); }
                in_space = true;
                continue;
            }
            in_space = false;
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' { out.push(ch); }
        }
        Self(out)
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(SlugError::Empty); }
        if !value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
            return Err(SlugError::InvalidCharacter);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SlugError { Empty, InvalidCharacter }
impl std::error::Error for SlugError {}
impl fmt::Display for SlugError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "Slug empty"), Self::InvalidCharacter => write!(f, "Slug has invalid characters") }
    }
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> { self.0.checked_sub(other).map(Self) }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_naira_groups_thousands() {
        assert_eq!(format_naira(Decimal::new(1500, 0)), "₦1,500");
        assert_eq!(format_naira(Decimal::new(1_234_567, 0)), "₦1,234,567");
        assert_eq!(format_naira(Decimal::ZERO), "₦0");
        assert_eq!(format_naira(Decimal::new(999, 0)), "₦999");
    }

    #[test]
    fn test_format_naira_rounds_and_signs() {
        assert_eq!(format_naira(Decimal::new(15005, 1)), "₦1,501");
        assert_eq!(format_naira(Decimal::new(-25000, 0)), "-₦25,000");
        assert_eq!(format_naira(Decimal::new(-4, 1)), "₦0");
    }

    #[test]
    fn test_money_percent_and_floor() {
        let subtotal = Money::naira(Decimal::new(10_000, 0));
        assert_eq!(subtotal.percent(Decimal::new(10, 0)).amount(), Decimal::new(1_000, 0));
        let negative = subtotal.sub(&Money::naira(Decimal::new(12_000, 0))).unwrap();
        assert!(negative.floor_zero().is_zero());
    }

    #[test]
    fn test_money_currency_mismatch() {
        let a = Money::naira(Decimal::ONE);
        let b = Money::new(Decimal::ONE, "USD");
        assert_eq!(a.add(&b), Err(MoneyError::CurrencyMismatch));
    }

    #[test]
    fn test_slug_from_name() {
        assert_eq!(Slug::from_name("Home & Kitchen").as_str(), "home--kitchen");
        assert_eq!(Slug::from_name("  Men's   Shoes ").as_str(), "mens-shoes");
        assert_eq!(Slug::parse("bad slug"), Err(SlugError::InvalidCharacter));
    }

    #[test]
    fn test_quantity() {
        let q = Quantity::new(3);
        assert_eq!(q.subtract(5), None);
        assert_eq!(q.subtract(3).map(|q| q.is_zero()), Some(true));
    }
}
