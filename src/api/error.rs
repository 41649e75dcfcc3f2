//! HTTP rendering of [`EcommerceError`].
//!
//! Server-side failures are logged and answered with a generic message; every
//! other error carries its own user-facing text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::services::account::AccountError;
use crate::services::admin::AdminError;
use crate::services::auth::AuthError;
use crate::services::cart::{ApplyCouponError, CartServiceError};
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::services::settings::SettingsError;
use crate::storage::StorageError;
use crate::EcommerceError;

impl EcommerceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::NotSignedIn | AuthError::ProfileNotFound => StatusCode::UNAUTHORIZED,
                AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
                AuthError::EmailInUse => StatusCode::CONFLICT,
                AuthError::WeakPassword | AuthError::InvalidEmail => StatusCode::BAD_REQUEST,
                AuthError::NotAdmin => StatusCode::FORBIDDEN,
                AuthError::PasswordHash | AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(err) => match err {
                CartServiceError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                CartServiceError::Cart(_) => StatusCode::BAD_REQUEST,
                CartServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Coupon(err) => match err {
                ApplyCouponError::NotFound | ApplyCouponError::Inactive => StatusCode::BAD_REQUEST,
                ApplyCouponError::Lookup(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Catalog(err) => match err {
                CatalogError::ProductNotFound => StatusCode::NOT_FOUND,
                CatalogError::Review(_) => StatusCode::BAD_REQUEST,
                CatalogError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart | CheckoutError::Order(_) => StatusCode::BAD_REQUEST,
                CheckoutError::InsufficientStock(_) => StatusCode::CONFLICT,
                CheckoutError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Account(err) => match err {
                AccountError::ProfileNotFound | AccountError::NotFound(_) => StatusCode::NOT_FOUND,
                AccountError::Validation(_) | AccountError::Card(_) | AccountError::Ticket(_) => StatusCode::BAD_REQUEST,
                AccountError::Storage(err) => storage_status(err),
                AccountError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Admin(err) => match err {
                AdminError::NotFound(_) => StatusCode::NOT_FOUND,
                AdminError::SelfDemotion | AdminError::Product(_) | AdminError::Slug(_) | AdminError::Coupon(_) => StatusCode::BAD_REQUEST,
                AdminError::Storage(err) => storage_status(err),
                AdminError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Settings(err) => match err {
                SettingsError::InvalidSection { .. } => StatusCode::BAD_REQUEST,
                SettingsError::EntryNotFound(_) => StatusCode::NOT_FOUND,
                SettingsError::Storage(err) => storage_status(err),
                SettingsError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Storage(err) => storage_status(err),
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        StorageError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        StorageError::Empty | StorageError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Something went wrong. Please try again.".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
