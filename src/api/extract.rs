//! Request extractors for sessions and carts.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{header, request::Parts, HeaderMap},
};

use super::AppState;
use crate::domain::aggregates::UserProfile;
use crate::services::auth::AuthError;
use crate::store::is_key;
use crate::EcommerceError;

/// Header carrying a guest's cart id.
pub const CART_HEADER: &str = "x-cart-id";
/// Header carrying an upload's original file name.
pub const FILE_NAME_HEADER: &str = "x-file-name";
const MAX_CART_ID_LEN: usize = 64;

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Guest cart id from [`CART_HEADER`].
pub fn guest_cart_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CART_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_CART_ID_LEN)
}

/// A signed-in shopper.
pub struct CurrentUser {
    pub token: String,
    pub profile: UserProfile,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::NotSignedIn)?;
        let profile = state.sessions.current_user(token).await?;
        Ok(Self { token: token.to_string(), profile })
    }
}

/// A signed-in admin. The flag is re-read from the store on every request.
pub struct AdminUser(pub UserProfile);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::NotSignedIn)?;
        Ok(Self(state.sessions.require_admin(token).await?))
    }
}

/// Which cart a request works on: the signed-in user's, else the guest cart
/// named by [`CART_HEADER`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartKey(pub String);

impl CartKey {
    pub fn user(user_id: &str) -> Self { Self(format!("user:{user_id}")) }
    pub fn guest(cart_id: &str) -> Self { Self(format!("guest:{cart_id}")) }
}

#[async_trait]
impl FromRequestParts<AppState> for CartKey {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers) {
            if let Ok(user) = state.sessions.current_user(token).await {
                return Ok(Self::user(&user.id));
            }
        }
        guest_cart_id(&parts.headers)
            .map(Self::guest)
            .ok_or_else(|| EcommerceError::BadRequest("Sign in or send an X-Cart-Id header to use a cart.".into()))
    }
}

/// A record id taken from the route. Anything that is not a single store key
/// (for example a decoded `%2F`) is answered with 404.
#[derive(Debug)]
pub struct Id(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Id {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| EcommerceError::NotFound)?;
        if !is_key(&id) { return Err(EcommerceError::NotFound); }
        Ok(Self(id))
    }
}

/// A raw image upload: the body is the file, `Content-Type` its type.
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for Upload {
    type Rejection = EcommerceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let headers = req.headers();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        let file_name = headers
            .get(FILE_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("upload")
            .to_string();
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| EcommerceError::BadRequest(rejection.body_text()))?;
        Ok(Self { file_name, content_type, bytes })
    }
}
