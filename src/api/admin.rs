//! Back-office routes. [`AdminUser`] gates every handler.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::extract::{AdminUser, Id, Upload};
use super::AppState;
use crate::domain::aggregates::{Category, Coupon, Order, OrderStatus, Product, Review, SettingsSection, SiteSettings, SupportTicket, TicketStatus, UserProfile};
use crate::services::admin::{CategoryInput, CouponInput, Dashboard, ProductInput};
use crate::{EcommerceError, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id", put(update_category).delete(delete_category))
        .route("/orders", get(list_orders))
        .route("/orders/:id/status", put(set_order_status))
        .route("/orders/:id/tracking", put(set_tracking_number))
        .route("/users", get(list_users))
        .route("/users/:id/toggle-admin", post(toggle_admin))
        .route("/coupons", get(list_coupons).post(create_coupon))
        .route("/coupons/:id", put(update_coupon).delete(delete_coupon))
        .route("/reviews", get(list_reviews))
        .route("/reviews/:id", delete(delete_review))
        .route("/reviews/:id/toggle-approval", post(toggle_review_approval))
        .route("/tickets", get(list_tickets))
        .route("/tickets/:id/status", put(set_ticket_status))
        .route("/settings", get(get_settings))
        .route("/settings/:section", put(update_settings_section))
        .route("/settings/hero_slides/:index", delete(remove_hero_slide))
        .route("/settings/team_members/:index", delete(remove_team_member))
        .route("/uploads/products", post(upload_product_image))
        .route("/uploads/hero", post(upload_hero_image))
        .route("/uploads/team", post(upload_team_image))
}

#[derive(Debug, Default, Deserialize)] pub struct SearchParams { pub search: Option<String> }

async fn dashboard(State(s): State<AppState>, _: AdminUser) -> Result<Json<Dashboard>> { Ok(Json(s.admin.dashboard().await?)) }

// =============================================================================
// Catalog
// =============================================================================

async fn list_products(State(s): State<AppState>, _: AdminUser, Query(p): Query<SearchParams>) -> Result<Json<Vec<Product>>> {
    Ok(Json(s.admin.products(p.search.as_deref()).await?))
}

async fn create_product(State(s): State<AppState>, _: AdminUser, Json(r): Json<ProductInput>) -> Result<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(s.admin.create_product(r).await?)))
}

async fn update_product(State(s): State<AppState>, _: AdminUser, Id(id): Id, Json(r): Json<ProductInput>) -> Result<Json<Product>> {
    Ok(Json(s.admin.update_product(&id, r).await?))
}

async fn delete_product(State(s): State<AppState>, _: AdminUser, Id(id): Id) -> Result<StatusCode> {
    s.admin.delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_categories(State(s): State<AppState>, _: AdminUser, Query(p): Query<SearchParams>) -> Result<Json<Vec<Category>>> {
    Ok(Json(s.admin.categories(p.search.as_deref()).await?))
}

async fn create_category(State(s): State<AppState>, _: AdminUser, Json(r): Json<CategoryInput>) -> Result<(StatusCode, Json<Category>)> {
    Ok((StatusCode::CREATED, Json(s.admin.create_category(r).await?)))
}

async fn update_category(State(s): State<AppState>, _: AdminUser, Id(id): Id, Json(r): Json<CategoryInput>) -> Result<Json<Category>> {
    Ok(Json(s.admin.update_category(&id, r).await?))
}

async fn delete_category(State(s): State<AppState>, _: AdminUser, Id(id): Id) -> Result<StatusCode> {
    s.admin.delete_category(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders & users
// =============================================================================

async fn list_orders(State(s): State<AppState>, _: AdminUser) -> Result<Json<Vec<Order>>> { Ok(Json(s.admin.orders().await?)) }

#[derive(Debug, Deserialize)] pub struct OrderStatusRequest { pub status: OrderStatus }

async fn set_order_status(State(s): State<AppState>, _: AdminUser, Id(id): Id, Json(r): Json<OrderStatusRequest>) -> Result<Json<Order>> {
    Ok(Json(s.admin.set_order_status(&id, r.status).await?))
}

#[derive(Debug, Deserialize)] #[serde(rename_all = "camelCase")] pub struct TrackingRequest { #[serde(default)] pub tracking_number: String }

async fn set_tracking_number(State(s): State<AppState>, _: AdminUser, Id(id): Id, Json(r): Json<TrackingRequest>) -> Result<Json<Order>> {
    Ok(Json(s.admin.set_tracking_number(&id, &r.tracking_number).await?))
}

async fn list_users(State(s): State<AppState>, _: AdminUser, Query(p): Query<SearchParams>) -> Result<Json<Vec<UserProfile>>> {
    Ok(Json(s.admin.users(p.search.as_deref()).await?))
}

async fn toggle_admin(State(s): State<AppState>, AdminUser(acting): AdminUser, Id(id): Id) -> Result<Json<UserProfile>> {
    Ok(Json(s.admin.toggle_admin(&acting, &id).await?))
}

// =============================================================================
// Promotions, reviews, support
// =============================================================================

async fn list_coupons(State(s): State<AppState>, _: AdminUser) -> Result<Json<Vec<Coupon>>> { Ok(Json(s.admin.coupons().await?)) }

async fn create_coupon(State(s): State<AppState>, _: AdminUser, Json(r): Json<CouponInput>) -> Result<(StatusCode, Json<Coupon>)> {
    Ok((StatusCode::CREATED, Json(s.admin.create_coupon(r).await?)))
}

async fn update_coupon(State(s): State<AppState>, _: AdminUser, Id(id): Id, Json(r): Json<CouponInput>) -> Result<Json<Coupon>> {
    Ok(Json(s.admin.update_coupon(&id, r).await?))
}

async fn delete_coupon(State(s): State<AppState>, _: AdminUser, Id(id): Id) -> Result<StatusCode> {
    s.admin.delete_coupon(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_reviews(State(s): State<AppState>, _: AdminUser) -> Result<Json<Vec<Review>>> { Ok(Json(s.admin.reviews().await?)) }

async fn toggle_review_approval(State(s): State<AppState>, _: AdminUser, Id(id): Id) -> Result<Json<Review>> {
    Ok(Json(s.admin.toggle_review_approval(&id).await?))
}

async fn delete_review(State(s): State<AppState>, _: AdminUser, Id(id): Id) -> Result<StatusCode> {
    s.admin.delete_review(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tickets(State(s): State<AppState>, _: AdminUser) -> Result<Json<Vec<SupportTicket>>> { Ok(Json(s.admin.tickets().await?)) }

#[derive(Debug, Deserialize)] pub struct TicketStatusRequest { pub status: TicketStatus }

async fn set_ticket_status(State(s): State<AppState>, _: AdminUser, Id(id): Id, Json(r): Json<TicketStatusRequest>) -> Result<Json<SupportTicket>> {
    Ok(Json(s.admin.set_ticket_status(&id, r.status).await?))
}

// =============================================================================
// Site settings & uploads
// =============================================================================

async fn get_settings(State(s): State<AppState>, _: AdminUser) -> Result<Json<SiteSettings>> { Ok(Json(s.settings.get().await?)) }

async fn update_settings_section(State(s): State<AppState>, _: AdminUser, Path(section): Path<String>, Json(value): Json<Value>) -> Result<Json<SiteSettings>> {
    let section: SettingsSection = section.parse().map_err(EcommerceError::BadRequest)?;
    Ok(Json(s.settings.update_section(section, value).await?))
}

async fn remove_hero_slide(State(s): State<AppState>, _: AdminUser, Path(index): Path<usize>) -> Result<Json<SiteSettings>> {
    Ok(Json(s.settings.remove_hero_slide(index).await?))
}

async fn remove_team_member(State(s): State<AppState>, _: AdminUser, Path(index): Path<usize>) -> Result<Json<SiteSettings>> {
    Ok(Json(s.settings.remove_team_member(index).await?))
}

#[derive(Debug, serde::Serialize)] pub struct Uploaded { pub url: String }

async fn upload_product_image(State(s): State<AppState>, _: AdminUser, upload: Upload) -> Result<(StatusCode, Json<Uploaded>)> {
    let url = s.admin.upload_product_image(&upload.file_name, &upload.content_type, &upload.bytes).await?;
    Ok((StatusCode::CREATED, Json(Uploaded { url })))
}

async fn upload_hero_image(State(s): State<AppState>, _: AdminUser, upload: Upload) -> Result<(StatusCode, Json<Uploaded>)> {
    let url = s.settings.upload_hero_image(&upload.file_name, &upload.content_type, &upload.bytes).await?;
    Ok((StatusCode::CREATED, Json(Uploaded { url })))
}

async fn upload_team_image(State(s): State<AppState>, _: AdminUser, upload: Upload) -> Result<(StatusCode, Json<Uploaded>)> {
    let url = s.settings.upload_team_image(&upload.file_name, &upload.content_type, &upload.bytes).await?;
    Ok((StatusCode::CREATED, Json(Uploaded { url })))
}
