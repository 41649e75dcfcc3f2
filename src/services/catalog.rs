//! Storefront reads: product listings, detail pages, the home page, and reviews.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{Category, FlashSale, Order, Product, Review, ReviewError, UserProfile, WishlistEntry};
use crate::domain::events::{CatalogEvent, DomainEvent, EventPublisher};
use crate::services::settings::load_settings;
use crate::store::{fetch, list, to_document, Backend, DocumentStore, Query, StoreError};

const HOME_FEATURED_LIMIT: usize = 4;
const HOME_CATEGORY_LIMIT: usize = 4;
const RELATED_LIMIT: usize = 3;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("{0}")]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub search: Option<String>,
    /// Category slugs; a product matches if it is in any of them.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub max_price: Option<Decimal>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        let search = self.search.as_deref().map_or(true, |term| product.matches_search(term));
        let category = self.categories.is_empty() || self.categories.iter().any(|slug| product.in_category(slug));
        let price = self.max_price.map_or(true, |max| product.price <= max);
        search && category && price
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub product: Product,
    pub reviews: Vec<Review>,
    pub related: Vec<Product>,
    pub has_purchased: bool,
    pub wishlist_entry_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FlashSaleView {
    #[serde(flatten)]
    pub sale: FlashSale,
    pub product: Product,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomePage {
    pub featured: Vec<Product>,
    pub categories: Vec<Category>,
    pub flash_sale: Option<FlashSaleView>,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Backend,
    events: EventPublisher,
}

impl CatalogService {
    pub fn new(store: Backend, events: EventPublisher) -> Self { Self { store, events } }

    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, CatalogError> {
        let products: Vec<Product> = list(&self.store, "products", &Query::new()).await?;
        Ok(products.into_iter().filter(|p| filter.matches(p)).collect())
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        Ok(list(&self.store, "categories", &Query::order_by_child("name")).await?)
    }

    pub async fn product(&self, id: &str) -> Result<Product, CatalogError> {
        fetch(&self.store, "products", id).await?.ok_or(CatalogError::ProductNotFound)
    }

    /// Everything the product page shows. `viewer` adds purchase and wishlist state.
    #[tracing::instrument(skip(self, viewer))]
    pub async fn product_detail(&self, id: &str, viewer: Option<&UserProfile>) -> Result<ProductDetail, CatalogError> {
        let product = self.product(id).await?;

        let reviews: Vec<Review> = list(&self.store, "reviews", &Query::order_by_child("productId").equal_to(id)).await?;
        let reviews = reviews.into_iter().filter(|r| r.is_approved).collect();

        let related = match product.first_category_slug() {
            Some(slug) => {
                let all: Vec<Product> = list(&self.store, "products", &Query::new()).await?;
                all.into_iter().filter(|p| p.id != product.id && p.in_category(slug)).take(RELATED_LIMIT).collect()
            }
            None => vec![],
        };

        let (has_purchased, wishlist_entry_id) = match viewer {
            Some(user) => {
                let orders: Vec<Order> =
                    list(&self.store, "orders", &Query::order_by_child("userId").equal_to(user.id.as_str())).await?;
                let wishlist: Vec<WishlistEntry> = list(
                    &self.store,
                    &format!("users/{}/wishlist", user.id),
                    &Query::order_by_child("productId").equal_to(id),
                )
                .await?;
                (orders.iter().any(|o| o.contains_product(id)), wishlist.into_iter().next().map(|w| w.id))
            }
            None => (false, None),
        };

        Ok(ProductDetail { product, reviews, related, has_purchased, wishlist_entry_id })
    }

    pub async fn home_page(&self) -> Result<HomePage, CatalogError> {
        let featured = list(&self.store, "products", &Query::order_by_child("featured").equal_to(true).limit_to_first(HOME_FEATURED_LIMIT)).await?;
        let categories = list(&self.store, "categories", &Query::order_by_key().limit_to_first(HOME_CATEGORY_LIMIT)).await?;

        let sale = load_settings(&self.store).await?.flash_sale;
        let flash_sale = if sale.is_running(Utc::now()) {
            fetch::<Product, _>(&self.store, "products", &sale.product_id)
                .await?
                .map(|product| FlashSaleView { sale, product })
        } else {
            None
        };
        Ok(HomePage { featured, categories, flash_sale })
    }

    /// Queue a review for moderation.
    #[tracing::instrument(skip(self, author, comment), fields(user_id = %author.id))]
    pub async fn submit_review(&self, author: &UserProfile, product_id: &str, rating: u8, comment: &str) -> Result<Review, CatalogError> {
        self.product(product_id).await?;
        let mut review = Review::submit(product_id, &author.id, &author.first_name, &author.last_name, rating, comment.trim())?;
        review.id = self.store.push("reviews", to_document(&review)).await?;
        self.events
            .publish(DomainEvent::Catalog(CatalogEvent::ReviewSubmitted { review_id: review.id.clone(), product_id: product_id.to_string() }))
            .await;
        Ok(review)
    }
}
