//! Signed-in customer routes. Every handler acts on the caller's own records.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use super::extract::{CurrentUser, Id, Upload};
use super::AppState;
use crate::domain::aggregates::{Address, NotificationPreferences, Order, Product, ProfileUpdate, Review, SavedCard, SupportTicket, UserProfile};
use crate::services::account::{NewCard, Rewards, WishlistToggle};
use crate::Result;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/profile/picture", post(upload_picture))
        .route("/notifications", put(set_notifications))
        .route("/addresses", get(addresses).post(add_address))
        .route("/addresses/:id", put(update_address).delete(delete_address))
        .route("/addresses/:id/default", post(set_default_address))
        .route("/payment-methods", get(cards).post(add_card))
        .route("/payment-methods/:id", delete(remove_card))
        .route("/wishlist", get(wishlist))
        .route("/wishlist/:product_id", post(toggle_wishlist))
        .route("/orders", get(orders))
        .route("/reviews", get(reviews))
        .route("/tickets", get(tickets).post(submit_ticket))
        .route("/rewards", get(rewards))
}

async fn profile(State(s): State<AppState>, u: CurrentUser) -> Result<Json<UserProfile>> { Ok(Json(s.account.profile(&u.profile.id).await?)) }

async fn update_profile(State(s): State<AppState>, u: CurrentUser, Json(r): Json<ProfileUpdate>) -> Result<Json<UserProfile>> {
    let profile = s.account.update_profile(&u.profile.id, r).await?;
    s.sessions.refresh_user(&u.token).await?;
    Ok(Json(profile))
}

async fn upload_picture(State(s): State<AppState>, u: CurrentUser, upload: Upload) -> Result<Json<UserProfile>> {
    let profile = s.account.upload_profile_picture(&u.profile.id, &upload.file_name, &upload.content_type, &upload.bytes).await?;
    s.sessions.refresh_user(&u.token).await?;
    Ok(Json(profile))
}

async fn set_notifications(State(s): State<AppState>, u: CurrentUser, Json(r): Json<NotificationPreferences>) -> Result<Json<NotificationPreferences>> {
    Ok(Json(s.account.set_notifications(&u.profile.id, r).await?))
}

async fn addresses(State(s): State<AppState>, u: CurrentUser) -> Result<Json<Vec<Address>>> { Ok(Json(s.account.addresses(&u.profile.id).await?)) }

async fn add_address(State(s): State<AppState>, u: CurrentUser, Json(r): Json<Address>) -> Result<(StatusCode, Json<Address>)> {
    Ok((StatusCode::CREATED, Json(s.account.add_address(&u.profile.id, r).await?)))
}

async fn update_address(State(s): State<AppState>, u: CurrentUser, Id(id): Id, Json(r): Json<Address>) -> Result<Json<Address>> {
    Ok(Json(s.account.update_address(&u.profile.id, &id, r).await?))
}

async fn delete_address(State(s): State<AppState>, u: CurrentUser, Id(id): Id) -> Result<StatusCode> {
    s.account.delete_address(&u.profile.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_default_address(State(s): State<AppState>, u: CurrentUser, Id(id): Id) -> Result<Json<Vec<Address>>> {
    Ok(Json(s.account.set_default_address(&u.profile.id, &id).await?))
}

async fn cards(State(s): State<AppState>, u: CurrentUser) -> Result<Json<Vec<SavedCard>>> { Ok(Json(s.account.cards(&u.profile.id).await?)) }

async fn add_card(State(s): State<AppState>, u: CurrentUser, Json(r): Json<NewCard>) -> Result<(StatusCode, Json<SavedCard>)> {
    Ok((StatusCode::CREATED, Json(s.account.add_card(&u.profile.id, r).await?)))
}

async fn remove_card(State(s): State<AppState>, u: CurrentUser, Id(id): Id) -> Result<StatusCode> {
    s.account.remove_card(&u.profile.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn wishlist(State(s): State<AppState>, u: CurrentUser) -> Result<Json<Vec<Product>>> { Ok(Json(s.account.wishlist(&u.profile.id).await?)) }

async fn toggle_wishlist(State(s): State<AppState>, u: CurrentUser, Id(product_id): Id) -> Result<Json<WishlistToggle>> {
    Ok(Json(s.account.toggle_wishlist(&u.profile.id, &product_id).await?))
}

async fn orders(State(s): State<AppState>, u: CurrentUser) -> Result<Json<Vec<Order>>> { Ok(Json(s.account.orders(&u.profile.id).await?)) }

async fn reviews(State(s): State<AppState>, u: CurrentUser) -> Result<Json<Vec<Review>>> { Ok(Json(s.account.reviews(&u.profile.id).await?)) }

async fn tickets(State(s): State<AppState>, u: CurrentUser) -> Result<Json<Vec<SupportTicket>>> { Ok(Json(s.account.tickets(&u.profile.id).await?)) }

#[derive(Debug, Deserialize)] pub struct TicketRequest { pub subject: String, pub details: String }

async fn submit_ticket(State(s): State<AppState>, u: CurrentUser, Json(r): Json<TicketRequest>) -> Result<(StatusCode, Json<SupportTicket>)> {
    Ok((StatusCode::CREATED, Json(s.account.submit_ticket(&u.profile.id, &r.subject, &r.details).await?)))
}

async fn rewards(State(s): State<AppState>, u: CurrentUser) -> Result<Json<Rewards>> { Ok(Json(s.account.rewards(&u.profile.id).await?)) }
