//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::value_objects::{Money, Quantity};

/// Category reference embedded in a product document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: Quantity,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub reviews: u32,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn create(name: impl Into<String>, price: Decimal) -> Result<Self, ProductError> {
        let product = Self {
            id: String::new(), name: name.into(), description: String::new(), price, sale_price: None,
            categories: vec![], images: vec![], stock: Quantity::default(), rating: 0.0, reviews: 0,
            featured: false, created_at: Some(Utc::now()),
        };
        product.validate()?;
        Ok(product)
    }

    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if self.price.is_sign_negative() { return Err(ProductError::NegativePrice); }
        if let Some(sale) = self.sale_price {
            if sale.is_sign_negative() { return Err(ProductError::NegativePrice); }
            if sale > self.price { return Err(ProductError::SaleAbovePrice); }
        }
        Ok(())
    }

    /// Price a shopper pays: the sale price when one is set, else the list price.
    pub fn unit_price(&self) -> Money {
        Money::naira(self.sale_price.filter(|p| !p.is_zero()).unwrap_or(self.price))
    }

    pub fn is_on_sale(&self) -> bool { self.sale_price.is_some_and(|p| !p.is_zero() && p < self.price) }
    pub fn is_in_stock(&self) -> bool { !self.stock.is_zero() }
    pub fn primary_image(&self) -> Option<&str> { self.images.first().map(String::as_str) }
    pub fn first_category_slug(&self) -> Option<&str> { self.categories.first().map(|c| c.slug.as_str()) }

    pub fn in_category(&self, slug: &str) -> bool { self.categories.iter().any(|c| c.slug == slug) }

    pub fn matches_search(&self, term: &str) -> bool {
        term.trim().is_empty() || self.name.to_lowercase().contains(&term.trim().to_lowercase())
    }

    pub fn is_low_stock(&self, threshold: u32) -> bool { (1..=threshold).contains(&self.stock.value()) }

    pub fn remove_inventory(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(qty).ok_or(ProductError::InsufficientInventory)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { MissingName, NegativePrice, SaleAbovePrice, InsufficientInventory }
impl std::error::Error for ProductError {}
impl fmt::Display for ProductError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingName => write!(f, "Product name is required"),
            Self::NegativePrice => write!(f, "Price cannot be negative"),
            Self::SaleAbovePrice => write!(f, "Sale price must not exceed the regular price"),
            Self::InsufficientInventory => write!(f, "Insufficient inventory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_create() {
        let p = Product::create("Ankara Tote", Decimal::new(12_500, 0)).unwrap();
        assert_eq!(p.name, "Ankara Tote");
        assert!(!p.is_in_stock());
        assert_eq!(Product::create(" ", Decimal::ONE), Err(ProductError::MissingName));
    }

    #[test]
    fn test_unit_price_prefers_sale() {
        let mut p = Product::create("Tote", Decimal::new(10_000, 0)).unwrap();
        assert_eq!(p.unit_price().amount(), Decimal::new(10_000, 0));
        p.sale_price = Some(Decimal::new(8_000, 0));
        assert_eq!(p.unit_price().amount(), Decimal::new(8_000, 0));
        assert!(p.is_on_sale());
        p.sale_price = Some(Decimal::new(12_000, 0));
        assert_eq!(p.validate(), Err(ProductError::SaleAbovePrice));
    }

    #[test]
    fn test_inventory() {
        let mut p = Product::create("P", Decimal::new(10, 0)).unwrap();
        p.stock = Quantity::new(10);
        assert!(p.is_low_stock(10));
        p.remove_inventory(5).unwrap();
        assert_eq!(p.stock.value(), 5);
        assert_eq!(p.remove_inventory(6), Err(ProductError::InsufficientInventory));
    }

    #[test]
    fn test_decodes_stored_document() {
        let p: Product = serde_json::from_value(json!({
            "id": "p1", "name": "Shea Butter", "price": 2500, "sale_price": null, "stock": 4,
            "categories": [{"id": "c1", "name": "Beauty", "slug": "beauty"}], "images": ["a.png"],
            "created_at": 1_700_000_000_000_i64
        }))
        .unwrap();
        assert!(p.in_category("beauty"));
        assert_eq!(p.primary_image(), Some("a.png"));
        assert!(p.matches_search("SHEA"));
        assert!(p.created_at.is_some());
    }
}
