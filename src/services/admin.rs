//! Back-office operations.
//!
//! Callers are expected to have passed `SessionService::require_admin`
//! already; the HTTP layer does this for every admin route.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::aggregates::{
    normalize_code, Category, CategoryRef, Coupon, CouponError, CustomerSummary, DiscountType, Order, OrderStatus, Product,
    ProductError, ProductSummary, Review, SupportTicket, TicketStatus, UserProfile,
};
use crate::domain::events::{CatalogEvent, CustomerEvent, DomainEvent, EventPublisher};
use crate::domain::value_objects::{Quantity, SlugError};
use crate::storage::{Folder, ObjectStorage, StorageError};
use crate::store::{fetch, list, to_document, Backend, DocumentStore, Query, StoreError};

const RECENT_ORDERS: usize = 5;
const UNKNOWN_CUSTOMER: &str = "N/A";

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("You cannot remove your own admin access.")]
    SelfDemotion,

    #[error("{0}")]
    Product(#[from] ProductError),

    #[error("{0}")]
    Slug(#[from] SlugError),

    #[error("{0}")]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub stock: u32,
    /// Ids of existing categories; unknown ids are dropped.
    #[serde(default)]
    pub category_ids: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    /// Derived from the name when blank.
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CouponInput {
    pub code: String,
    #[serde(default)]
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn active_by_default() -> bool { true }

// =============================================================================
// Views
// =============================================================================

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrder {
    pub id: String,
    pub customer_name: String,
    pub total: Decimal,
    pub status: OrderStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockProduct {
    pub id: String,
    pub name: String,
    pub stock: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_revenue: Decimal,
    pub total_orders: usize,
    pub total_products: usize,
    pub total_users: usize,
    pub recent_orders: Vec<RecentOrder>,
    pub low_stock: Vec<LowStockProduct>,
}

#[derive(Clone)]
pub struct AdminService {
    store: Backend,
    storage: ObjectStorage,
    events: EventPublisher,
    low_stock_threshold: u32,
}

impl AdminService {
    pub fn new(store: Backend, storage: ObjectStorage, events: EventPublisher, low_stock_threshold: u32) -> Self {
        Self { store, storage, events, low_stock_threshold }
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    #[tracing::instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<Dashboard, AdminError> {
        let by_date = Query::order_by_child("createdAt");
        let by_stock = Query::order_by_child("stock");
        let (orders, products, users) = futures::try_join!(
            list::<Order, _>(&self.store, "orders", &by_date),
            list::<Product, _>(&self.store, "products", &by_stock),
            self.customers(),
        )?;

        let total_revenue = orders.iter().map(|o| o.total).sum();
        let recent_orders = orders
            .iter()
            .rev()
            .take(RECENT_ORDERS)
            .map(|o| RecentOrder {
                id: o.id.clone(),
                customer_name: users
                    .get(&o.user_id)
                    .map(|u| format!("{} {}", u.first_name, u.last_name).trim().to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| UNKNOWN_CUSTOMER.to_string()),
                total: o.total,
                status: o.status,
                created_at: o.created_at,
            })
            .collect();
        let low_stock = products
            .iter()
            .filter(|p| p.is_low_stock(self.low_stock_threshold))
            .map(|p| LowStockProduct { id: p.id.clone(), name: p.name.clone(), stock: p.stock.value() })
            .collect();

        Ok(Dashboard {
            total_revenue,
            total_orders: orders.len(),
            total_products: products.len(),
            total_users: users.len(),
            recent_orders,
            low_stock,
        })
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn products(&self, search: Option<&str>) -> Result<Vec<Product>, AdminError> {
        let products: Vec<Product> = list(&self.store, "products", &Query::new()).await?;
        Ok(products.into_iter().filter(|p| search.map_or(true, |term| p.matches_search(term))).collect())
    }

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: ProductInput) -> Result<Product, AdminError> {
        let mut product = Product::create(input.name.trim(), input.price)?;
        self.apply_product_input(&mut product, input).await?;
        product.id = self.store.push("products", to_document(&product)).await?;
        tracing::info!(product_id = %product.id, "product created");
        self.events.publish(DomainEvent::Catalog(CatalogEvent::ProductSaved { product_id: product.id.clone() })).await;
        Ok(product)
    }

    /// Replace the editable fields. Rating, review count and creation time are kept.
    pub async fn update_product(&self, id: &str, input: ProductInput) -> Result<Product, AdminError> {
        let mut product: Product = fetch(&self.store, "products", id).await?.ok_or(AdminError::NotFound("Product"))?;
        product.name = input.name.trim().to_string();
        product.price = input.price;
        self.apply_product_input(&mut product, input).await?;
        self.store.set(&format!("products/{id}"), to_document(&product)).await?;
        self.events.publish(DomainEvent::Catalog(CatalogEvent::ProductSaved { product_id: id.to_string() })).await;
        Ok(product)
    }

    /// Delete a product and any images this service stored for it.
    pub async fn delete_product(&self, id: &str) -> Result<(), AdminError> {
        let product: Product = fetch(&self.store, "products", id).await?.ok_or(AdminError::NotFound("Product"))?;
        self.store.remove(&format!("products/{id}")).await?;
        for image in product.images.iter().filter(|url| self.storage.is_managed_url(url)) {
            self.storage.delete_quietly(image).await;
        }
        tracing::info!(product_id = %id, "product deleted");
        self.events.publish(DomainEvent::Catalog(CatalogEvent::ProductDeleted { product_id: id.to_string() })).await;
        Ok(())
    }

    pub async fn upload_product_image(&self, file_name: &str, content_type: &str, bytes: &[u8]) -> Result<String, AdminError> {
        Ok(self.storage.upload(Folder::ProductImages, file_name, content_type, bytes).await?)
    }

    async fn apply_product_input(&self, product: &mut Product, input: ProductInput) -> Result<(), AdminError> {
        let categories: Vec<Category> = list(&self.store, "categories", &Query::new()).await?;
        product.categories = input
            .category_ids
            .iter()
            .filter_map(|id| categories.iter().find(|c| &c.id == id).map(Category::to_ref))
            .collect::<Vec<CategoryRef>>();
        product.description = input.description;
        product.sale_price = input.sale_price.filter(|p| !p.is_zero());
        product.stock = Quantity::new(input.stock);
        product.images = input.images;
        product.featured = input.featured;
        product.validate()?;
        Ok(())
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Ordered by name, optionally filtered by name or slug.
    pub async fn categories(&self, search: Option<&str>) -> Result<Vec<Category>, AdminError> {
        let categories: Vec<Category> = list(&self.store, "categories", &Query::order_by_child("name")).await?;
        Ok(categories.into_iter().filter(|c| search.map_or(true, |term| c.matches_search(term))).collect())
    }

    pub async fn create_category(&self, input: CategoryInput) -> Result<Category, AdminError> {
        let mut category = Category::create(input.name.trim(), input.slug.as_deref())?;
        category.id = self.store.push("categories", to_document(&category)).await?;
        Ok(category)
    }

    pub async fn update_category(&self, id: &str, input: CategoryInput) -> Result<Category, AdminError> {
        let existing: Category = fetch(&self.store, "categories", id).await?.ok_or(AdminError::NotFound("Category"))?;
        let renamed = Category::create(input.name.trim(), input.slug.as_deref())?;
        let mut fields = Map::new();
        fields.insert("name".into(), json!(renamed.name));
        fields.insert("slug".into(), json!(renamed.slug));
        self.store.update(&format!("categories/{id}"), fields).await?;
        Ok(Category { name: renamed.name, slug: renamed.slug, ..existing })
    }

    pub async fn delete_category(&self, id: &str) -> Result<(), AdminError> {
        Ok(self.store.remove(&format!("categories/{id}")).await?)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Newest first, each with the customer's name and email.
    pub async fn orders(&self) -> Result<Vec<Order>, AdminError> {
        let by_date = Query::order_by_child("createdAt");
        let (mut orders, users) = futures::try_join!(
            list::<Order, _>(&self.store, "orders", &by_date),
            self.customers(),
        )?;
        orders.reverse();
        for order in &mut orders {
            order.customer = users.get(&order.user_id).cloned();
        }
        Ok(orders)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_order_status(&self, id: &str, status: OrderStatus) -> Result<Order, AdminError> {
        let mut order: Order = fetch(&self.store, "orders", id).await?.ok_or(AdminError::NotFound("Order"))?;
        order.set_status(status);
        let mut fields = Map::new();
        fields.insert("status".into(), json!(status));
        self.store.update(&format!("orders/{id}"), fields).await?;
        self.events.publish_all(order.take_events()).await;
        Ok(order)
    }

    /// Blank clears the tracking number.
    pub async fn set_tracking_number(&self, id: &str, tracking_number: &str) -> Result<Order, AdminError> {
        let mut order: Order = fetch(&self.store, "orders", id).await?.ok_or(AdminError::NotFound("Order"))?;
        let tracking = Some(tracking_number.trim().to_string()).filter(|t| !t.is_empty());
        self.store
            .set(&format!("orders/{id}/tracking_number"), tracking.clone().map_or(Value::Null, Value::String))
            .await?;
        order.tracking_number = tracking;
        Ok(order)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Matches on full name or email.
    pub async fn users(&self, search: Option<&str>) -> Result<Vec<UserProfile>, AdminError> {
        let users: Vec<UserProfile> = list(&self.store, "users", &Query::new()).await?;
        Ok(users.into_iter().filter(|u| search.map_or(true, |term| u.matches_search(term))).collect())
    }

    /// Flip `isAdmin` on `user_id`. An admin cannot demote themselves.
    #[tracing::instrument(skip(self, acting), fields(acting = %acting.id))]
    pub async fn toggle_admin(&self, acting: &UserProfile, user_id: &str) -> Result<UserProfile, AdminError> {
        if acting.id == user_id { return Err(AdminError::SelfDemotion); }
        let mut user: UserProfile = fetch(&self.store, "users", user_id).await?.ok_or(AdminError::NotFound("User"))?;
        user.is_admin = !user.is_admin;
        self.store.set(&format!("users/{user_id}/isAdmin"), json!(user.is_admin)).await?;
        tracing::info!(%user_id, is_admin = user.is_admin, "admin flag changed");
        Ok(user)
    }

    // =========================================================================
    // Promotions
    // =========================================================================

    pub async fn coupons(&self) -> Result<Vec<Coupon>, AdminError> {
        let mut coupons: Vec<Coupon> = list(&self.store, "coupons", &Query::order_by_child("createdAt")).await?;
        coupons.reverse();
        Ok(coupons)
    }

    pub async fn create_coupon(&self, input: CouponInput) -> Result<Coupon, AdminError> {
        let mut coupon = Coupon::create(&input.code, input.discount_type, input.discount_value)?;
        coupon.is_active = input.is_active;
        coupon.expires_at = input.expires_at;
        coupon.id = self.store.push("coupons", to_document(&coupon)).await?;
        Ok(coupon)
    }

    pub async fn update_coupon(&self, id: &str, input: CouponInput) -> Result<Coupon, AdminError> {
        let existing: Coupon = fetch(&self.store, "coupons", id).await?.ok_or(AdminError::NotFound("Coupon"))?;
        let coupon = Coupon {
            code: normalize_code(&input.code),
            discount_type: input.discount_type,
            discount_value: input.discount_value,
            is_active: input.is_active,
            expires_at: input.expires_at,
            ..existing
        };
        coupon.validate()?;
        self.store.set(&format!("coupons/{id}"), to_document(&coupon)).await?;
        Ok(coupon)
    }

    pub async fn delete_coupon(&self, id: &str) -> Result<(), AdminError> {
        Ok(self.store.remove(&format!("coupons/{id}")).await?)
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Newest first, with current reviewer and product names.
    pub async fn reviews(&self) -> Result<Vec<Review>, AdminError> {
        let (by_date, everything) = (Query::order_by_child("createdAt"), Query::new());
        let (mut reviews, users, products) = futures::try_join!(
            list::<Review, _>(&self.store, "reviews", &by_date),
            self.customers(),
            list::<Product, _>(&self.store, "products", &everything),
        )?;
        reviews.reverse();
        for review in &mut reviews {
            if let Some(user) = users.get(&review.user_id) {
                review.user_first_name = user.first_name.clone();
                review.user_last_name = user.last_name.clone();
            }
            review.product = products
                .iter()
                .find(|p| p.id == review.product_id)
                .map(|p| ProductSummary { id: p.id.clone(), name: p.name.clone() });
        }
        Ok(reviews)
    }

    pub async fn toggle_review_approval(&self, id: &str) -> Result<Review, AdminError> {
        let mut review: Review = fetch(&self.store, "reviews", id).await?.ok_or(AdminError::NotFound("Review"))?;
        review.is_approved = !review.is_approved;
        self.store.set(&format!("reviews/{id}/is_approved"), json!(review.is_approved)).await?;
        self.events
            .publish(DomainEvent::Catalog(CatalogEvent::ReviewModerated { review_id: id.to_string(), approved: review.is_approved }))
            .await;
        Ok(review)
    }

    pub async fn delete_review(&self, id: &str) -> Result<(), AdminError> {
        Ok(self.store.remove(&format!("reviews/{id}")).await?)
    }

    // =========================================================================
    // Support
    // =========================================================================

    /// Newest first, with the submitting user's details.
    pub async fn tickets(&self) -> Result<Vec<SupportTicket>, AdminError> {
        let by_date = Query::order_by_child("createdAt");
        let (mut tickets, users) = futures::try_join!(
            list::<SupportTicket, _>(&self.store, "supportTickets", &by_date),
            self.customers(),
        )?;
        tickets.reverse();
        for ticket in &mut tickets {
            ticket.customer = users.get(&ticket.user_id).cloned();
        }
        Ok(tickets)
    }

    pub async fn set_ticket_status(&self, id: &str, status: TicketStatus) -> Result<SupportTicket, AdminError> {
        let mut ticket: SupportTicket = fetch(&self.store, "supportTickets", id).await?.ok_or(AdminError::NotFound("Ticket"))?;
        ticket.set_status(status, Utc::now());
        let mut fields = Map::new();
        fields.insert("status".into(), json!(ticket.status));
        fields.insert("resolvedAt".into(), json!(ticket.resolved_at));
        self.store.update(&format!("supportTickets/{id}"), fields).await?;
        self.events
            .publish(DomainEvent::Customer(CustomerEvent::TicketStatusChanged { ticket_id: id.to_string(), status }))
            .await;
        Ok(ticket)
    }

    /// Name and email of every user, keyed by id.
    async fn customers(&self) -> Result<HashMap<String, CustomerSummary>, StoreError> {
        let users: Vec<UserProfile> = list(&self.store, "users", &Query::new()).await?;
        Ok(users
            .into_iter()
            .map(|u| (u.id, CustomerSummary { first_name: u.first_name, last_name: u.last_name, email: u.email }))
            .collect())
    }
}
