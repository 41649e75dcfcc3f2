//! Public storefront routes: sign-in, catalog, cart and checkout.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::extract::{guest_cart_id, CartKey, CurrentUser, Id};
use super::AppState;
use crate::domain::aggregates::{Category, Product, Review, SiteSettings, UserProfile};
use crate::services::auth::{SignUpRequest, SignedIn};
use crate::services::cart::{CartView, CouponApplied};
use crate::services::catalog::{HomePage, ProductDetail, ProductFilter};
use crate::services::checkout::{CheckoutRequest, PlacedOrder};
use crate::Result;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/password", put(change_password))
        .route("/home", get(home))
        .route("/settings", get(site_settings))
        .route("/products", get(list_products))
        .route("/products/:id", get(product_detail))
        .route("/products/:id/reviews", post(submit_review))
        .route("/categories", get(list_categories))
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_to_cart))
        .route("/cart/items/:product_id", put(update_cart_item).delete(remove_cart_item))
        .route("/cart/coupon", post(apply_coupon).delete(remove_coupon))
        .route("/checkout", post(checkout))
}

// =============================================================================
// Auth
// =============================================================================

/// Guest carts carried in `X-Cart-Id` are folded into the new session's cart.
async fn sign_up(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<SignUpRequest>) -> Result<(StatusCode, Json<SignedIn>)> {
    let signed_in = s.sessions.sign_up(r).await?;
    adopt_guest_cart(&s, &headers, &signed_in.user).await;
    Ok((StatusCode::CREATED, Json(signed_in)))
}

#[derive(Debug, Deserialize)] pub struct LoginRequest { pub email: String, pub password: String }

async fn login(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<LoginRequest>) -> Result<Json<SignedIn>> {
    let signed_in = s.sessions.login(&r.email, &r.password).await?;
    adopt_guest_cart(&s, &headers, &signed_in.user).await;
    Ok(Json(signed_in))
}

async fn adopt_guest_cart(s: &AppState, headers: &HeaderMap, user: &UserProfile) {
    if let Some(cart_id) = guest_cart_id(headers) {
        s.carts.merge(&CartKey::guest(cart_id).0, &CartKey::user(&user.id).0).await;
    }
}

async fn logout(State(s): State<AppState>, user: CurrentUser) -> StatusCode {
    s.sessions.logout(&user.token).await;
    StatusCode::NO_CONTENT
}

async fn me(State(s): State<AppState>, user: CurrentUser) -> Result<Json<UserProfile>> {
    Ok(Json(s.sessions.refresh_user(&user.token).await?))
}

#[derive(Debug, Deserialize)] #[serde(rename_all = "camelCase")] pub struct PasswordRequest { pub new_password: String }

async fn change_password(State(s): State<AppState>, user: CurrentUser, Json(r): Json<PasswordRequest>) -> Result<StatusCode> {
    s.sessions.update_password(&user.token, &r.new_password).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Catalog
// =============================================================================

async fn home(State(s): State<AppState>) -> Result<Json<HomePage>> { Ok(Json(s.catalog.home_page().await?)) }

async fn site_settings(State(s): State<AppState>) -> Result<Json<SiteSettings>> { Ok(Json(s.settings.get().await?)) }

/// `category` takes comma-separated slugs.
#[derive(Debug, Default, Deserialize)]
pub struct ProductParams { pub search: Option<String>, pub category: Option<String>, pub max_price: Option<Decimal> }

impl From<ProductParams> for ProductFilter {
    fn from(p: ProductParams) -> Self {
        let categories = p
            .category
            .map(|c| c.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        Self { search: p.search, categories, max_price: p.max_price }
    }
}

async fn list_products(State(s): State<AppState>, Query(p): Query<ProductParams>) -> Result<Json<Vec<Product>>> {
    Ok(Json(s.catalog.list_products(&p.into()).await?))
}

async fn product_detail(State(s): State<AppState>, Id(id): Id, viewer: Option<CurrentUser>) -> Result<Json<ProductDetail>> {
    Ok(Json(s.catalog.product_detail(&id, viewer.as_ref().map(|v| &v.profile)).await?))
}

#[derive(Debug, Deserialize)] pub struct ReviewRequest { pub rating: u8, pub comment: String }

async fn submit_review(State(s): State<AppState>, user: CurrentUser, Id(id): Id, Json(r): Json<ReviewRequest>) -> Result<(StatusCode, Json<Review>)> {
    let review = s.catalog.submit_review(&user.profile, &id, r.rating, &r.comment).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<Category>>> { Ok(Json(s.catalog.list_categories().await?)) }

// =============================================================================
// Cart & checkout
// =============================================================================

async fn get_cart(State(s): State<AppState>, key: CartKey) -> Json<CartView> { Json(s.carts.cart(&key.0).await.into()) }

async fn clear_cart(State(s): State<AppState>, key: CartKey) -> StatusCode {
    s.carts.clear(&key.0).await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest { pub product_id: String, #[serde(default = "one")] pub quantity: u32 }

fn one() -> u32 { 1 }

async fn add_to_cart(State(s): State<AppState>, key: CartKey, Json(r): Json<AddToCartRequest>) -> Result<Json<CartView>> {
    Ok(Json(s.carts.add(&key.0, &r.product_id, r.quantity).await?.into()))
}

#[derive(Debug, Deserialize)] pub struct QuantityRequest { pub quantity: i64 }

async fn update_cart_item(State(s): State<AppState>, key: CartKey, Id(id): Id, Json(r): Json<QuantityRequest>) -> Result<Json<CartView>> {
    Ok(Json(s.carts.update_quantity(&key.0, &id, r.quantity).await?.into()))
}

async fn remove_cart_item(State(s): State<AppState>, key: CartKey, Id(id): Id) -> Result<Json<CartView>> {
    Ok(Json(s.carts.remove(&key.0, &id).await?.into()))
}

#[derive(Debug, Deserialize)] pub struct CouponRequest { pub code: String }

async fn apply_coupon(State(s): State<AppState>, key: CartKey, Json(r): Json<CouponRequest>) -> Result<Json<CouponApplied>> {
    Ok(Json(s.carts.apply_coupon(&key.0, &r.code).await?))
}

async fn remove_coupon(State(s): State<AppState>, key: CartKey) -> Json<CartView> { Json(s.carts.remove_coupon(&key.0).await.into()) }

/// Checkout always uses the signed-in user's cart.
async fn checkout(State(s): State<AppState>, user: CurrentUser, Json(r): Json<CheckoutRequest>) -> Result<(StatusCode, Json<PlacedOrder>)> {
    let placed = s.checkout.place_order(&user.profile, &CartKey::user(&user.profile.id).0, r).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}
