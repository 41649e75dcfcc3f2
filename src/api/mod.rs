//! JSON HTTP API.
//!
//! `/api/v1` carries the storefront, `/api/v1/account` the signed-in
//! customer's pages and `/api/v1/admin` the back office. Uploaded images are
//! served straight from the bucket directory.

use axum::{extract::DefaultBodyLimit, routing::get, Json, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;
use crate::domain::events::EventPublisher;
use crate::services::{
    AccountService, AdminService, CartService, CatalogService, CheckoutService, SessionService, SiteSettingsService,
};
use crate::storage::{ObjectStorage, MAX_UPLOAD_BYTES};
use crate::store::Backend;

pub mod account;
pub mod admin;
pub mod error;
pub mod extract;
pub mod storefront;

/// Room for request framing on top of the largest upload.
const BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionService,
    pub carts: CartService,
    pub catalog: CatalogService,
    pub checkout: CheckoutService,
    pub account: AccountService,
    pub admin: AdminService,
    pub settings: SiteSettingsService,
    pub storage: ObjectStorage,
}

impl AppState {
    pub fn new(config: &Config, store: Backend, events: EventPublisher) -> Self {
        let storage = ObjectStorage::new(&config.storage_dir, &config.storage_bucket, &config.public_base_url);
        let carts = CartService::new(store.clone());
        Self {
            sessions: SessionService::new(store.clone(), events.clone(), config.session_ttl),
            checkout: CheckoutService::new(store.clone(), carts.clone(), events.clone()),
            catalog: CatalogService::new(store.clone(), events.clone()),
            account: AccountService::new(store.clone(), storage.clone(), events.clone()),
            admin: AdminService::new(store.clone(), storage.clone(), events, config.low_stock_threshold),
            settings: SiteSettingsService::new(store, storage.clone()),
            carts,
            storage,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(storefront::routes())
        .nest("/account", account::routes())
        .nest("/admin", admin::routes());

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "naira-storefront"})) }))
        .nest("/api/v1", api)
        .nest_service(&state.storage.mount_path(), ServeDir::new(state.storage.bucket_dir()))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
