//! Per-visitor carts and coupon lookup.

use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::aggregates::{normalize_code, Cart, CartError, CartSummary, Coupon, Product};
use crate::domain::value_objects::NAIRA;
use crate::store::{fetch, list, Backend, DocumentStore, Query, StoreError};

const MAX_CARTS: u64 = 100_000;
/// Carts nobody has touched for this long are dropped.
const CART_IDLE: Duration = Duration::from_secs(3 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CartServiceError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("{0}")]
    Cart(#[from] CartError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ApplyCouponError {
    #[error("Invalid coupon code.")]
    NotFound,

    #[error("This coupon is no longer active.")]
    Inactive,

    #[error("Could not validate coupon.")]
    Lookup(#[source] StoreError),
}

/// Cart with its derived totals, as shown to the shopper.
#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub summary: CartSummary,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        let summary = cart.summary();
        Self { cart, summary }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CouponApplied {
    pub message: String,
    pub cart: CartView,
}

/// Find a usable coupon by code. Codes match upper-cased.
pub async fn lookup_coupon<S: DocumentStore>(store: &S, code: &str) -> Result<Coupon, ApplyCouponError> {
    let code = normalize_code(code);
    if code.is_empty() { return Err(ApplyCouponError::NotFound); }
    let matches: Vec<Coupon> = list(store, "coupons", &Query::order_by_child("code").equal_to(code.as_str()))
        .await
        .map_err(ApplyCouponError::Lookup)?;
    let coupon = matches.into_iter().next().ok_or(ApplyCouponError::NotFound)?;
    if !coupon.is_usable(chrono::Utc::now()) { return Err(ApplyCouponError::Inactive); }
    Ok(coupon)
}

type SharedCart = Arc<Mutex<Cart>>;

#[derive(Clone)]
pub struct CartService {
    store: Backend,
    carts: Cache<String, SharedCart>,
}

impl CartService {
    pub fn new(store: Backend) -> Self {
        let carts = Cache::builder().max_capacity(MAX_CARTS).time_to_idle(CART_IDLE).build();
        Self { store, carts }
    }

    pub async fn cart(&self, key: &str) -> Cart {
        match self.carts.get(key).await {
            Some(cart) => cart.lock().await.clone(),
            None => Cart::new(NAIRA),
        }
    }

    pub async fn add(&self, key: &str, product_id: &str, quantity: u32) -> Result<Cart, CartServiceError> {
        let product: Product = fetch(&self.store, "products", product_id)
            .await?
            .ok_or_else(|| CartServiceError::ProductNotFound(product_id.to_string()))?;
        let slot = self.slot(key).await;
        let mut cart = slot.lock().await;
        cart.add_item(product, quantity)?;
        Ok(cart.clone())
    }

    /// Zero or negative quantities remove the line.
    pub async fn update_quantity(&self, key: &str, product_id: &str, quantity: i64) -> Result<Cart, CartServiceError> {
        let slot = self.carts.get(key).await.ok_or(CartError::ItemNotFound)?;
        let mut cart = slot.lock().await;
        cart.update_quantity(product_id, quantity)?;
        Ok(cart.clone())
    }

    pub async fn remove(&self, key: &str, product_id: &str) -> Result<Cart, CartServiceError> {
        let slot = self.carts.get(key).await.ok_or(CartError::ItemNotFound)?;
        let mut cart = slot.lock().await;
        cart.remove_item(product_id)?;
        Ok(cart.clone())
    }

    /// Empty the cart and drop any coupon.
    pub async fn clear(&self, key: &str) {
        self.carts.invalidate(key).await;
    }

    /// Attach the coupon named by `code`. Any failure detaches the current coupon.
    pub async fn apply_coupon(&self, key: &str, code: &str) -> Result<CouponApplied, ApplyCouponError> {
        match lookup_coupon(&self.store, code).await {
            Ok(coupon) => {
                let message = format!("Coupon \"{}\" applied!", coupon.code);
                let slot = self.slot(key).await;
                let mut cart = slot.lock().await;
                cart.apply_coupon(coupon);
                Ok(CouponApplied { message, cart: cart.clone().into() })
            }
            Err(err) => {
                if let ApplyCouponError::Lookup(source) = &err {
                    tracing::warn!(error = %source, "coupon lookup failed");
                }
                if let Some(slot) = self.carts.get(key).await {
                    slot.lock().await.remove_coupon();
                }
                Err(err)
            }
        }
    }

    pub async fn remove_coupon(&self, key: &str) -> Cart {
        let Some(slot) = self.carts.get(key).await else { return Cart::new(NAIRA) };
        let mut cart = slot.lock().await;
        cart.remove_coupon();
        cart.clone()
    }

    /// Move a guest cart onto a signed-in key, merging lines.
    pub async fn merge(&self, from: &str, into: &str) {
        if from == into { return; }
        let Some(guest) = self.carts.remove(from).await else { return };
        let guest = guest.lock().await.clone();
        let slot = self.slot(into).await;
        let mut target = slot.lock().await;
        for line in guest.items() {
            if target.add_item(line.product.clone(), line.quantity).is_err() {
                tracing::debug!(product_id = %line.product.id, "guest line dropped on merge");
            }
        }
        if target.applied_coupon().is_none() {
            if let Some(coupon) = guest.applied_coupon() {
                target.apply_coupon(coupon.clone());
            }
        }
    }

    /// The cart under `key`, created empty on first use.
    async fn slot(&self, key: &str) -> SharedCart {
        self.carts.get_with(key.to_string(), async { Arc::new(Mutex::new(Cart::new(NAIRA))) }).await
    }
}
