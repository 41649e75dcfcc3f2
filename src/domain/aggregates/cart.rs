//! Cart Aggregate
//!
//! Session-scoped, in-memory. Every derived amount is recomputed from the
//! lines on demand, so there is no cached total to drift.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::coupon::Coupon;
use super::product::Product;
use crate::domain::value_objects::{Money, NAIRA};

/// Most units a single line may hold.
pub const MAX_LINE_QUANTITY: u32 = 999;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    pub fn unit_price(&self) -> Money { self.product.unit_price() }
    pub fn line_total(&self) -> Money { self.unit_price().multiply(self.quantity) }
}

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    items: Vec<CartItem>,
    applied_coupon: Option<Coupon>,
    currency: String,
    updated_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self { Self::new(NAIRA) }
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self { items: vec![], applied_coupon: None, currency: currency.to_string(), updated_at: Utc::now() }
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn applied_coupon(&self) -> Option<&Coupon> { self.applied_coupon.as_ref() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Add `quantity` of `product`, merging into an existing line for the same product.
    pub fn add_item(&mut self, product: Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 || quantity > MAX_LINE_QUANTITY { return Err(CartError::InvalidQuantity); }
        if let Some(existing) = self.items.iter_mut().find(|i| i.product.id == product.id) {
            let merged = existing.quantity.saturating_add(quantity);
            if merged > MAX_LINE_QUANTITY { return Err(CartError::InvalidQuantity); }
            existing.quantity = merged;
        } else {
            self.items.push(CartItem { product, quantity });
        }
        self.touch();
        Ok(())
    }

    /// Set a line's quantity; zero or less removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.product.id == product_id).ok_or(CartError::ItemNotFound)?;
        if quantity <= 0 {
            self.items.retain(|i| i.product.id != product_id);
        } else {
            item.quantity = u32::try_from(quantity)
                .ok()
                .filter(|q| *q <= MAX_LINE_QUANTITY)
                .ok_or(CartError::InvalidQuantity)?;
        }
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product.id != product_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    /// Empty the cart and drop any applied coupon.
    pub fn clear(&mut self) {
        self.items.clear();
        self.applied_coupon = None;
        self.touch();
    }

    pub fn apply_coupon(&mut self, coupon: Coupon) { self.applied_coupon = Some(coupon); self.touch(); }
    pub fn remove_coupon(&mut self) { self.applied_coupon = None; self.touch(); }

    /// Total units across all lines.
    pub fn item_count(&self) -> u32 { self.items.iter().fold(0u32, |n, i| n.saturating_add(i.quantity)) }

    pub fn subtotal(&self) -> Money {
        self.items.iter().fold(Money::zero(&self.currency), |acc, i| acc.add(&i.line_total()).unwrap_or(acc))
    }

    pub fn discount(&self) -> Money {
        match &self.applied_coupon {
            Some(coupon) => coupon.discount_for(&self.subtotal()),
            None => Money::zero(&self.currency),
        }
    }

    /// `subtotal - discount`, never below zero.
    pub fn total(&self) -> Money {
        let subtotal = self.subtotal();
        subtotal.sub(&self.discount()).unwrap_or(subtotal).floor_zero()
    }

    pub fn summary(&self) -> CartSummary {
        CartSummary {
            item_count: self.item_count(),
            subtotal: self.subtotal(),
            discount: self.discount(),
            total: self.total(),
            coupon_code: self.applied_coupon.as_ref().map(|c| c.code.clone()),
        }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Derived amounts, as shown in the order summary.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartSummary {
    pub item_count: u32,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound, InvalidQuantity }
impl std::error::Error for CartError {}
impl fmt::Display for CartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::ItemNotFound => write!(f, "Item not found"), Self::InvalidQuantity => write!(f, "Invalid quantity") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::coupon::DiscountType;
    use rust_decimal::Decimal;

    fn product(id: &str, price: i64) -> Product {
        let mut p = Product::create(format!("Product {id}"), Decimal::new(price, 0)).unwrap();
        p.id = id.into();
        p
    }

    #[test]
    fn test_empty_cart_totals_are_zero() {
        let cart = Cart::default();
        assert!(cart.subtotal().is_zero());
        assert!(cart.total().is_zero());
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_adding_same_product_merges() {
        let mut cart = Cart::default();
        cart.add_item(product("P1", 10), 2).unwrap();
        cart.add_item(product("P1", 10), 1).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.subtotal().amount(), Decimal::new(30, 0));
        assert_eq!(cart.add_item(product("P2", 1), 0), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn test_non_positive_quantity_removes_line() {
        let mut cart = Cart::default();
        cart.add_item(product("P1", 10), 1).unwrap();
        cart.add_item(product("P2", 20), 1).unwrap();
        cart.update_quantity("P1", 0).unwrap();
        cart.update_quantity("P2", -3).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.update_quantity("P1", 2), Err(CartError::ItemNotFound));
    }

    #[test]
    fn test_update_quantity_sets_value() {
        let mut cart = Cart::default();
        cart.add_item(product("P1", 10), 1).unwrap();
        cart.update_quantity("P1", 5).unwrap();
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_line_quantity_is_capped() {
        let mut cart = Cart::default();
        assert_eq!(cart.add_item(product("P1", 10), u32::MAX), Err(CartError::InvalidQuantity));
        cart.add_item(product("P1", 10), MAX_LINE_QUANTITY).unwrap();
        cart.add_item(product("P2", 10), 2).unwrap();
        assert_eq!(cart.add_item(product("P1", 10), 1), Err(CartError::InvalidQuantity));
        assert_eq!(cart.update_quantity("P2", i64::MAX), Err(CartError::InvalidQuantity));
        assert_eq!(cart.items()[1].quantity, 2);
        assert_eq!(cart.item_count(), MAX_LINE_QUANTITY + 2);
    }

    #[test]
    fn test_percentage_coupon() {
        let mut cart = Cart::default();
        cart.add_item(product("P1", 5_000), 2).unwrap();
        cart.apply_coupon(Coupon::create("TEN", DiscountType::Percentage, Decimal::new(10, 0)).unwrap());
        assert_eq!(cart.subtotal().amount(), Decimal::new(10_000, 0));
        assert_eq!(cart.discount().amount(), Decimal::new(1_000, 0));
        assert_eq!(cart.total().amount(), Decimal::new(9_000, 0));
    }

    #[test]
    fn test_fixed_coupon_never_goes_negative() {
        let mut cart = Cart::default();
        cart.add_item(product("P1", 1_000), 1).unwrap();
        cart.apply_coupon(Coupon::create("BIG", DiscountType::Fixed, Decimal::new(5_000, 0)).unwrap());
        assert!(cart.total().is_zero());
        assert_eq!(cart.summary().coupon_code.as_deref(), Some("BIG"));
    }

    #[test]
    fn test_clear_drops_coupon() {
        let mut cart = Cart::default();
        cart.add_item(product("P1", 1_000), 1).unwrap();
        cart.apply_coupon(Coupon::create("BIG", DiscountType::Fixed, Decimal::ONE).unwrap());
        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.applied_coupon().is_none());
    }

    #[test]
    fn test_sale_price_used_for_lines() {
        let mut p = product("P1", 10_000);
        p.sale_price = Some(Decimal::new(7_500, 0));
        let mut cart = Cart::default();
        cart.add_item(p, 2).unwrap();
        assert_eq!(cart.subtotal().amount(), Decimal::new(15_000, 0));
    }
}
