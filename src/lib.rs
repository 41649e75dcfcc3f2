//! Naira Storefront
//!
//! Storefront and admin console over a hierarchical document store.
//!
//! ## Features
//! - Email/password sign-in with bearer sessions
//! - Carts with coupon pricing and checkout with stock reservation
//! - Customer accounts: addresses, saved cards, wishlist, support, rewards
//! - Back office for catalog, orders, users, promotions, reviews and support
//! - Site settings and image uploads to a local object bucket

use thiserror::Error;

pub mod api;
pub mod config;
pub mod domain;
pub mod services;
pub mod storage;
pub mod store;

use services::account::AccountError;
use services::admin::AdminError;
use services::auth::AuthError;
use services::cart::{ApplyCouponError, CartServiceError};
use services::catalog::CatalogError;
use services::checkout::CheckoutError;
use services::settings::SettingsError;

// =============================================================================
// Error Types
// =============================================================================

/// Every failure a request can end in. Messages are the ones shown to shoppers.
#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Cart(#[from] CartServiceError),

    #[error(transparent)]
    Coupon(#[from] ApplyCouponError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
