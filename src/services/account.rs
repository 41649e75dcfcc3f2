//! Customer account: profile, addresses, saved cards, wishlist, history,
//! support tickets and rewards. Everything here is scoped to one user id.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use validator::Validate;

use crate::domain::aggregates::{
    Address, CardError, Coupon, NotificationPreferences, Order, Product, ProductSummary, ProfileUpdate, Review, SavedCard,
    SupportTicket, TicketError, UserProfile, WishlistEntry,
};
use crate::domain::events::{CustomerEvent, DomainEvent, EventPublisher};
use crate::storage::{Folder, ObjectStorage, StorageError};
use crate::store::{fetch, list, to_document, Backend, DocumentStore, Query, StoreError};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User profile not found in database.")]
    ProfileNotFound,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Card(#[from] CardError),

    #[error("{0}")]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<validator::ValidationErrors> for AccountError {
    fn from(errors: validator::ValidationErrors) -> Self { Self::Validation(errors.to_string()) }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub card_number: String,
    /// `MM/YY`
    pub expiry: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistToggle {
    pub in_wishlist: bool,
    pub entry_id: Option<String>,
    pub message: &'static str,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewards {
    pub loyalty_points: u64,
    pub coupons: Vec<Coupon>,
}

#[derive(Clone)]
pub struct AccountService {
    store: Backend,
    storage: ObjectStorage,
    events: EventPublisher,
}

impl AccountService {
    pub fn new(store: Backend, storage: ObjectStorage, events: EventPublisher) -> Self { Self { store, storage, events } }

    // =========================================================================
    // Profile
    // =========================================================================

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, AccountError> {
        fetch(&self.store, "users", user_id).await?.ok_or(AccountError::ProfileNotFound)
    }

    pub async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<UserProfile, AccountError> {
        update.validate()?;
        self.profile(user_id).await?;
        let mut fields = Map::new();
        fields.insert("firstName".into(), json!(update.first_name.trim()));
        fields.insert("lastName".into(), json!(update.last_name.trim()));
        fields.insert("phone".into(), json!(update.phone));
        fields.insert("country".into(), json!(update.country));
        self.store.update(&format!("users/{user_id}"), fields).await?;
        self.profile(user_id).await
    }

    /// Store a new avatar and point the profile at it. The previous avatar is
    /// removed only when it sits in this user's own folder.
    pub async fn upload_profile_picture(&self, user_id: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Result<UserProfile, AccountError> {
        let previous = self.profile(user_id).await?.profile_picture_url;
        let folder = Folder::ProfilePictures { user_id: user_id.to_string() };
        let url = self.storage.upload(folder.clone(), file_name, content_type, bytes).await?;
        self.store.set(&format!("users/{user_id}/profilePictureUrl"), json!(url)).await?;
        if let Some(old) = previous.filter(|old| self.storage.is_in_folder(old, &folder)) {
            self.storage.delete_quietly(&old).await;
        }
        self.profile(user_id).await
    }

    pub async fn set_notifications(&self, user_id: &str, prefs: NotificationPreferences) -> Result<NotificationPreferences, AccountError> {
        let mut fields = Map::new();
        fields.insert("notifications_orders".into(), json!(prefs.orders));
        fields.insert("notifications_promos".into(), json!(prefs.promos));
        fields.insert("notifications_newsletter".into(), json!(prefs.newsletter));
        self.store.update(&format!("users/{user_id}"), fields).await?;
        Ok(prefs)
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// Newest first.
    pub async fn addresses(&self, user_id: &str) -> Result<Vec<Address>, AccountError> {
        let mut addresses: Vec<Address> = list(&self.store, &addresses_path(user_id), &Query::new()).await?;
        addresses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(addresses)
    }

    /// New addresses never start as the default.
    pub async fn add_address(&self, user_id: &str, mut address: Address) -> Result<Address, AccountError> {
        address.validate()?;
        address.is_default = false;
        address.created_at = Some(Utc::now());
        address.id = self.store.push(&addresses_path(user_id), to_document(&address)).await?;
        Ok(address)
    }

    pub async fn update_address(&self, user_id: &str, address_id: &str, address: Address) -> Result<Address, AccountError> {
        address.validate()?;
        let path = addresses_path(user_id);
        fetch::<Address, _>(&self.store, &path, address_id).await?.ok_or(AccountError::NotFound("Address"))?;
        let mut fields = Map::new();
        fields.insert("street".into(), json!(address.street));
        fields.insert("city".into(), json!(address.city));
        fields.insert("state".into(), json!(address.state));
        fields.insert("zip".into(), json!(address.zip));
        self.store.update(&format!("{path}/{address_id}"), fields).await?;
        fetch(&self.store, &path, address_id).await?.ok_or(AccountError::NotFound("Address"))
    }

    pub async fn delete_address(&self, user_id: &str, address_id: &str) -> Result<(), AccountError> {
        Ok(self.store.remove(&format!("{}/{address_id}", addresses_path(user_id))).await?)
    }

    /// Make one address the default and clear the flag on every other, in one write.
    pub async fn set_default_address(&self, user_id: &str, address_id: &str) -> Result<Vec<Address>, AccountError> {
        let path = addresses_path(user_id);
        let addresses: Vec<Address> = list(&self.store, &path, &Query::new()).await?;
        if !addresses.iter().any(|a| a.id == address_id) { return Err(AccountError::NotFound("Address")); }
        let writes = addresses
            .iter()
            .map(|a| (format!("{path}/{}/is_default", a.id), Value::Bool(a.id == address_id)))
            .collect();
        self.store.update_many(writes).await?;
        self.addresses(user_id).await
    }

    // =========================================================================
    // Saved cards
    // =========================================================================

    pub async fn cards(&self, user_id: &str) -> Result<Vec<SavedCard>, AccountError> {
        Ok(list(&self.store, &cards_path(user_id), &Query::new()).await?)
    }

    /// Only the brand, last four digits and expiry are kept.
    pub async fn add_card(&self, user_id: &str, card: NewCard) -> Result<SavedCard, AccountError> {
        let mut saved = SavedCard::from_input(&card.card_number, &card.expiry, Utc::now())?;
        saved.id = self.store.push(&cards_path(user_id), to_document(&saved)).await?;
        Ok(saved)
    }

    pub async fn remove_card(&self, user_id: &str, card_id: &str) -> Result<(), AccountError> {
        Ok(self.store.remove(&format!("{}/{card_id}", cards_path(user_id))).await?)
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    pub async fn toggle_wishlist(&self, user_id: &str, product_id: &str) -> Result<WishlistToggle, AccountError> {
        let path = format!("users/{user_id}/wishlist");
        let existing: Vec<WishlistEntry> = list(&self.store, &path, &Query::order_by_child("productId").equal_to(product_id)).await?;
        if let Some(entry) = existing.first() {
            self.store.remove(&format!("{path}/{}", entry.id)).await?;
            return Ok(WishlistToggle { in_wishlist: false, entry_id: None, message: "Removed from wishlist." });
        }
        fetch::<Product, _>(&self.store, "products", product_id).await?.ok_or(AccountError::NotFound("Product"))?;
        let entry = WishlistEntry { id: String::new(), product_id: product_id.to_string(), created_at: Utc::now() };
        let id = self.store.push(&path, to_document(&entry)).await?;
        Ok(WishlistToggle { in_wishlist: true, entry_id: Some(id), message: "Added to wishlist!" })
    }

    /// Wishlisted products, skipping any that were deleted since.
    pub async fn wishlist(&self, user_id: &str) -> Result<Vec<Product>, AccountError> {
        let entries: Vec<WishlistEntry> = list(&self.store, &format!("users/{user_id}/wishlist"), &Query::new()).await?;
        let lookups = entries.iter().map(|e| fetch::<Product, _>(&self.store, "products", &e.product_id));
        let products = futures::future::try_join_all(lookups).await?;
        Ok(products.into_iter().flatten().collect())
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Own orders, newest first.
    pub async fn orders(&self, user_id: &str) -> Result<Vec<Order>, AccountError> {
        let mut orders: Vec<Order> = list(&self.store, "orders", &Query::order_by_child("userId").equal_to(user_id)).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Own reviews with product names, newest first.
    pub async fn reviews(&self, user_id: &str) -> Result<Vec<Review>, AccountError> {
        let mut reviews: Vec<Review> = list(&self.store, "reviews", &Query::order_by_child("userId").equal_to(user_id)).await?;
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        for review in &mut reviews {
            review.product = fetch::<Product, _>(&self.store, "products", &review.product_id)
                .await?
                .map(|p| ProductSummary { id: p.id, name: p.name });
        }
        Ok(reviews)
    }

    // =========================================================================
    // Support & rewards
    // =========================================================================

    pub async fn submit_ticket(&self, user_id: &str, subject: &str, details: &str) -> Result<SupportTicket, AccountError> {
        let mut ticket = SupportTicket::open(user_id, subject.trim(), details.trim())?;
        ticket.id = self.store.push("supportTickets", to_document(&ticket)).await?;
        tracing::info!(ticket_id = %ticket.id, %user_id, "support ticket opened");
        self.events
            .publish(DomainEvent::Customer(CustomerEvent::TicketOpened { ticket_id: ticket.id.clone(), user_id: user_id.to_string() }))
            .await;
        Ok(ticket)
    }

    /// Own tickets, newest first.
    pub async fn tickets(&self, user_id: &str) -> Result<Vec<SupportTicket>, AccountError> {
        let mut tickets: Vec<SupportTicket> =
            list(&self.store, "supportTickets", &Query::order_by_child("userId").equal_to(user_id)).await?;
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    pub async fn rewards(&self, user_id: &str) -> Result<Rewards, AccountError> {
        let profile = self.profile(user_id).await?;
        let now = Utc::now();
        let coupons: Vec<Coupon> = list(&self.store, "coupons", &Query::order_by_child("is_active").equal_to(true)).await?;
        Ok(Rewards { loyalty_points: profile.loyalty_points, coupons: coupons.into_iter().filter(|c| c.is_usable(now)).collect() })
    }
}

fn addresses_path(user_id: &str) -> String { format!("users/{user_id}/addresses") }
fn cards_path(user_id: &str) -> String { format!("users/{user_id}/paymentMethods") }
