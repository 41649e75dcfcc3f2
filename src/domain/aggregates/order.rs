//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::cart::Cart;
use super::coupon::DiscountType;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled];
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Card,
    /// Pay on delivery.
    Cod,
}

/// Snapshot of a cart line at checkout time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[serde(default)]
    pub zip: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponSnapshot {
    pub code: String,
    pub discount_value: Decimal,
    pub discount_type: DiscountType,
}

/// Customer name/email joined in for admin listings; never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub item_ids: Vec<String>,
    pub shipping_address: ShippingAddress,
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub coupon: Option<CouponSnapshot>,
    #[serde(rename = "tracking_number", default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(rename = "users", default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSummary>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Order {
    /// Snapshot `cart` into a new order. New orders start as `Processing`.
    pub fn from_cart(
        user_id: impl Into<String>,
        cart: &Cart,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }
        shipping_address.validate().map_err(|e| OrderError::InvalidAddress(e.to_string()))?;

        let items: Vec<OrderItem> = cart
            .items()
            .iter()
            .map(|line| OrderItem {
                id: line.product.id.clone(),
                name: line.product.name.clone(),
                price: line.unit_price().amount(),
                quantity: line.quantity,
                image: line.product.primary_image().map(str::to_string),
            })
            .collect();
        let summary = cart.summary();
        Ok(Self {
            id: String::new(),
            user_id: user_id.into(),
            created_at: Utc::now(),
            status: OrderStatus::Processing,
            payment_method,
            item_ids: items.iter().map(|i| i.id.clone()).collect(),
            items,
            shipping_address,
            subtotal: summary.subtotal.amount(),
            discount: summary.discount.amount(),
            total: summary.total.amount(),
            coupon: cart.applied_coupon().map(|c| CouponSnapshot {
                code: c.code.clone(),
                discount_value: c.discount_value,
                discount_type: c.discount_type,
            }),
            tracking_number: None,
            customer: None,
            events: vec![],
        })
    }

    /// Record the id assigned by the store and raise `Placed`.
    pub fn placed(&mut self, id: String) {
        self.id = id;
        self.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: self.id.clone(),
            user_id: self.user_id.clone(),
            total: self.total,
        }));
    }

    pub fn contains_product(&self, product_id: &str) -> bool {
        self.item_ids.iter().any(|id| id == product_id) || self.items.iter().any(|i| i.id == product_id)
    }

    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    /// Any status may follow any other; admins correct mistakes by hand.
    pub fn set_status(&mut self, status: OrderStatus) {
        if self.status == status { return; }
        let from = std::mem::replace(&mut self.status, status);
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id.clone(), from, to: status }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems, InvalidAddress(String) }
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoItems => write!(f, "Your cart is empty"),
            Self::InvalidAddress(msg) => write!(f, "Invalid shipping address: {msg}"),
        }
    }
}
