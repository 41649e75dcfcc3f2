//! Order placement.
//!
//! Stock is reserved line by line with store transactions. When any line
//! cannot be reserved, the lines already reserved are put back and no order
//! is written.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::aggregates::{Order, OrderError, OrderItem, PaymentMethod, ShippingAddress, UserProfile};
use crate::domain::events::{DomainEvent, EventPublisher, OrderEvent};
use crate::services::cart::CartService;
use crate::store::{to_document, Backend, DocumentStore, StoreError};

pub const ORDER_PLACED_MESSAGE: &str = "Order placed successfully!";
/// Naira spent per loyalty point.
const NAIRA_PER_POINT: i64 = 100;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Sorry, {0} is out of stock or does not have enough units left")]
    InsufficientStock(String),

    #[error("{0}")]
    Order(#[from] OrderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlacedOrder {
    pub message: String,
    pub order: Order,
}

/// Points earned for an order total: one per full ₦100.
pub fn loyalty_points_for(total: Decimal) -> u64 {
    (total / Decimal::from(NAIRA_PER_POINT)).floor().to_u64().unwrap_or(0)
}

#[derive(Clone)]
pub struct CheckoutService {
    store: Backend,
    carts: CartService,
    events: EventPublisher,
}

impl CheckoutService {
    pub fn new(store: Backend, carts: CartService, events: EventPublisher) -> Self { Self { store, carts, events } }

    /// Turn the cart at `cart_key` into an order for `customer`.
    #[tracing::instrument(skip(self, customer, request), fields(user_id = %customer.id))]
    pub async fn place_order(&self, customer: &UserProfile, cart_key: &str, request: CheckoutRequest) -> Result<PlacedOrder, CheckoutError> {
        let cart = self.carts.cart(cart_key).await;
        if cart.is_empty() { return Err(CheckoutError::EmptyCart); }
        let mut order = Order::from_cart(&customer.id, &cart, request.shipping_address, request.payment_method)?;

        let reserved = self.reserve_stock(&order.items).await?;
        let id = match self.store.push("orders", to_document(&order)).await {
            Ok(id) => id,
            Err(err) => {
                self.release_stock(&reserved).await;
                return Err(err.into());
            }
        };
        order.placed(id);
        self.carts.clear(cart_key).await;

        let points = loyalty_points_for(order.total);
        if points > 0 {
            let credited = self
                .store
                .transaction(&format!("users/{}/loyaltyPoints", customer.id), move |current| {
                    let balance = current.as_ref().and_then(Value::as_u64).unwrap_or(0);
                    Some(Value::from(balance.saturating_add(points)))
                })
                .await;
            if let Err(err) = credited {
                tracing::warn!(order_id = %order.id, error = %err, "failed to credit loyalty points");
            }
        }

        tracing::info!(order_id = %order.id, total = %order.total, items = order.item_count(), "order placed");
        let mut events: Vec<DomainEvent> = reserved
            .iter()
            .map(|(product_id, quantity, remaining)| {
                DomainEvent::Order(OrderEvent::StockReserved { product_id: product_id.clone(), quantity: *quantity, remaining: *remaining })
            })
            .collect();
        events.extend(order.take_events());
        self.events.publish_all(events).await;

        Ok(PlacedOrder { message: ORDER_PLACED_MESSAGE.to_string(), order })
    }

    /// Decrement stock for every line. Returns `(product_id, quantity, remaining)` per line.
    async fn reserve_stock(&self, items: &[OrderItem]) -> Result<Vec<(String, u32, u32)>, CheckoutError> {
        let mut reserved = Vec::with_capacity(items.len());
        for item in items {
            let quantity = u64::from(item.quantity);
            let outcome = self
                .store
                .transaction(&format!("products/{}/stock", item.id), move |current| {
                    let stock = current.as_ref().and_then(Value::as_u64)?;
                    stock.checked_sub(quantity).map(Value::from)
                })
                .await;
            match outcome {
                Ok(Some(remaining)) => {
                    let remaining = remaining.as_u64().and_then(|r| u32::try_from(r).ok()).unwrap_or(0);
                    reserved.push((item.id.clone(), item.quantity, remaining));
                }
                Ok(None) => {
                    self.release_stock(&reserved).await;
                    return Err(CheckoutError::InsufficientStock(item.name.clone()));
                }
                Err(err) => {
                    self.release_stock(&reserved).await;
                    return Err(err.into());
                }
            }
        }
        Ok(reserved)
    }

    async fn release_stock(&self, reserved: &[(String, u32, u32)]) {
        for (product_id, quantity, _) in reserved {
            let quantity = u64::from(*quantity);
            let restored = self
                .store
                .transaction(&format!("products/{product_id}/stock"), move |current| {
                    let stock = current.as_ref().and_then(Value::as_u64).unwrap_or(0);
                    Some(Value::from(stock.saturating_add(quantity)))
                })
                .await;
            if let Err(err) = restored {
                tracing::error!(%product_id, error = %err, "failed to restore reserved stock");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::OrderStatus;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn setup() -> (CheckoutService, CartService, MemoryStore) {
        let memory = MemoryStore::with_data(json!({
            "products": {
                "p1": {"name": "Ankara Tote", "price": 10000.0, "stock": 3, "images": ["https://img/p1.png"]},
                "p2": {"name": "Beaded Sandal", "price": 2500.0, "stock": 1}
            },
            "coupons": {"c1": {"code": "SAVE10", "discount_type": "percentage", "discount_value": 10.0, "is_active": true}},
            "users": {"u1": {"email": "ada@example.com", "loyaltyPoints": 5}}
        }));
        let store = Backend::Memory(memory.clone());
        let carts = CartService::new(store.clone());
        (CheckoutService::new(store, carts.clone(), EventPublisher::disabled()), carts, memory)
    }

    fn customer() -> UserProfile { UserProfile { id: "u1".into(), ..Default::default() } }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: ShippingAddress {
                first_name: "Ada".into(), last_name: "Obi".into(), address: "12 Marina".into(),
                city: "Lagos".into(), state: "Lagos".into(), zip: "100001".into(),
            },
            payment_method: PaymentMethod::Cod,
        }
    }

    #[tokio::test]
    async fn test_place_order_writes_snapshot_and_decrements_stock() {
        let (checkout, carts, memory) = setup();
        carts.add("s1", "p1", 2).await.unwrap();
        carts.apply_coupon("s1", "SAVE10").await.unwrap();

        let placed = checkout.place_order(&customer(), "s1", request()).await.unwrap();
        assert_eq!(placed.message, "Order placed successfully!");
        assert_eq!(placed.order.status, OrderStatus::Processing);
        assert_eq!(placed.order.total, Decimal::new(18_000, 0));

        let stored = memory.get(&format!("orders/{}", placed.order.id)).await.unwrap().unwrap();
        assert_eq!(stored["userId"], "u1");
        assert_eq!(stored["itemIds"], json!(["p1"]));
        assert_eq!(stored["items"][0]["image"], "https://img/p1.png");
        assert_eq!(stored["coupon"]["code"], "SAVE10");
        assert_eq!(stored["paymentMethod"], "cod");

        assert_eq!(memory.get("products/p1/stock").await.unwrap(), Some(json!(1)));
        assert_eq!(memory.get("users/u1/loyaltyPoints").await.unwrap(), Some(json!(185)));
        assert!(carts.cart("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_stock_restores_earlier_lines() {
        let (checkout, carts, memory) = setup();
        carts.add("s1", "p1", 1).await.unwrap();
        carts.add("s1", "p2", 2).await.unwrap();

        let err = checkout.place_order(&customer(), "s1", request()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InsufficientStock(name) if name == "Beaded Sandal"));
        assert_eq!(memory.get("products/p1/stock").await.unwrap(), Some(json!(3)));
        assert_eq!(memory.get("products/p2/stock").await.unwrap(), Some(json!(1)));
        assert_eq!(memory.get("orders").await.unwrap(), None);
        assert_eq!(carts.cart("s1").await.item_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_cart_and_bad_address() {
        let (checkout, carts, _) = setup();
        assert!(matches!(checkout.place_order(&customer(), "s1", request()).await, Err(CheckoutError::EmptyCart)));

        carts.add("s1", "p1", 1).await.unwrap();
        let mut bad = request();
        bad.shipping_address.city.clear();
        assert!(matches!(checkout.place_order(&customer(), "s1", bad).await, Err(CheckoutError::Order(OrderError::InvalidAddress(_)))));
    }

    #[test]
    fn test_loyalty_points() {
        assert_eq!(loyalty_points_for(Decimal::new(18_050, 0)), 180);
        assert_eq!(loyalty_points_for(Decimal::new(99, 0)), 0);
        assert_eq!(loyalty_points_for(Decimal::ZERO), 0);
    }
}
