//! Email/password identities and bearer-token sessions.
//!
//! Identities live at `identities/{uid}` with an argon2 hash; the matching
//! profile lives at `users/{uid}`. `identity_emails/{email}` maps an address
//! to its uid and is claimed with a store transaction so two sign-ups cannot
//! take the same address.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use moka::future::Cache;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::aggregates::UserProfile;
use crate::domain::events::{CustomerEvent, DomainEvent, EventPublisher};
use crate::store::{fetch, to_document, Backend, DocumentStore, StoreError};

const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_FAILED_LOGINS: u32 = 5;
const LOCKOUT_MINUTES: i64 = 15;
const MAX_SESSIONS: u64 = 100_000;
const MAX_TRACKED_EMAILS: u64 = 100_000;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password. Please try again.")]
    InvalidCredentials,

    #[error("Access to this account has been temporarily disabled due to many failed login attempts. You can immediately restore it by resetting your password or you can try again later.")]
    TooManyRequests,

    #[error("This email address is already in use by another account.")]
    EmailInUse,

    #[error("Password should be at least 6 characters.")]
    WeakPassword,

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("No user is logged in.")]
    NotSignedIn,

    #[error("User profile not found in database.")]
    ProfileNotFound,

    #[error("You do not have permission to access this page.")]
    NotAdmin,

    #[error("password hashing error")]
    PasswordHash,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIn {
    pub token: String,
    pub user: UserProfile,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Identity {
    #[serde(default)]
    id: String,
    email: String,
    password_hash: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
}

#[derive(Clone)]
struct Session {
    user: UserProfile,
    expires_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
struct FailedLogins {
    count: u32,
    locked_until: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct SessionService {
    store: Backend,
    events: EventPublisher,
    ttl: Duration,
    sessions: Cache<String, Session>,
    /// Failed-login counters per email; an idle counter lapses with the lockout window.
    failures: Cache<String, FailedLogins>,
}

impl SessionService {
    pub fn new(store: Backend, events: EventPublisher, ttl: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_live(ttl.to_std().unwrap_or(std::time::Duration::ZERO))
            .build();
        let failures = Cache::builder()
            .max_capacity(MAX_TRACKED_EMAILS)
            .time_to_live(std::time::Duration::from_secs(LOCKOUT_MINUTES as u64 * 60))
            .build();
        Self { store, events, ttl, sessions, failures }
    }

    /// Create an identity and its profile, then sign in.
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<SignedIn, AuthError> {
        let email = normalize_email(&request.email)?;
        validate_password(&request.password)?;
        let password_hash = hash_password(&request.password)?;

        let uid = uuid::Uuid::new_v4().simple().to_string();
        let claim_path = format!("identity_emails/{}", email_key(&email));
        let claimed = {
            let uid = uid.clone();
            self.store
                .transaction(&claim_path, move |current| match current {
                    None => Some(Value::String(uid)),
                    Some(_) => None,
                })
                .await?
        };
        if claimed.is_none() { return Err(AuthError::EmailInUse); }

        let now = Utc::now();
        let identity = Identity { id: uid.clone(), email: email.clone(), password_hash, created_at: now };
        let profile = UserProfile {
            id: uid.clone(),
            email,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            phone: request.phone,
            country: request.country,
            is_admin: false,
            created_at: Some(now),
            ..UserProfile::default()
        };
        let written = self
            .store
            .update_many(vec![
                (format!("identities/{uid}"), to_document(&identity)),
                (format!("users/{uid}"), to_document(&profile)),
            ])
            .await;
        if let Err(err) = written {
            // release the address so the next attempt can claim it
            if let Err(release) = self.store.remove(&claim_path).await {
                tracing::error!(error = %release, "failed to release email claim");
            }
            return Err(err.into());
        }

        tracing::info!(user_id = %uid, "user signed up");
        self.events.publish(DomainEvent::Customer(CustomerEvent::SignedUp { user_id: uid })).await;
        Ok(self.open_session(profile).await)
    }

    /// Verify credentials and open a session. A missing profile ends the session.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let now = Utc::now();
        if self.is_locked(&email, now).await { return Err(AuthError::TooManyRequests); }

        let identity = match self.identity_for(&email).await? {
            Some(identity) if verify_password(password, &identity.password_hash) => identity,
            _ => {
                self.record_failure(&email, now).await;
                return Err(AuthError::InvalidCredentials);
            }
        };
        self.failures.invalidate(&email).await;

        let Some(profile) = fetch::<UserProfile, _>(&self.store, "users", &identity.id).await? else {
            tracing::warn!(user_id = %identity.id, "profile missing at login");
            return Err(AuthError::ProfileNotFound);
        };
        tracing::info!(user_id = %identity.id, "user logged in");
        Ok(self.open_session(profile).await)
    }

    pub async fn logout(&self, token: &str) {
        if self.sessions.remove(token).await.is_some() {
            tracing::debug!("session closed");
        }
    }

    /// The profile cached on the session.
    pub async fn current_user(&self, token: &str) -> Result<UserProfile, AuthError> {
        let Some(session) = self.sessions.get(token).await else { return Err(AuthError::NotSignedIn) };
        if session.expires_at > Utc::now() { return Ok(session.user); }
        self.sessions.invalidate(token).await;
        Err(AuthError::NotSignedIn)
    }

    /// Re-read the profile from the store and refresh the session's copy.
    pub async fn refresh_user(&self, token: &str) -> Result<UserProfile, AuthError> {
        let user = self.current_user(token).await?;
        match fetch::<UserProfile, _>(&self.store, "users", &user.id).await? {
            Some(profile) => {
                // keeps the original expiry; a refresh never extends a session
                if let Some(session) = self.sessions.get(token).await {
                    self.sessions.insert(token.to_string(), Session { user: profile.clone(), ..session }).await;
                }
                Ok(profile)
            }
            None => {
                self.logout(token).await;
                Err(AuthError::ProfileNotFound)
            }
        }
    }

    /// Fresh profile of an admin session; anyone else is refused.
    pub async fn require_admin(&self, token: &str) -> Result<UserProfile, AuthError> {
        let user = self.refresh_user(token).await?;
        if !user.is_admin { return Err(AuthError::NotAdmin); }
        Ok(user)
    }

    pub async fn update_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let user = self.current_user(token).await?;
        validate_password(new_password)?;
        let hash = hash_password(new_password)?;
        self.store.set(&format!("identities/{}/passwordHash", user.id), Value::String(hash)).await?;
        tracing::info!(user_id = %user.id, "password updated");
        Ok(())
    }

    async fn open_session(&self, user: UserProfile) -> SignedIn {
        let token = new_token();
        let expires_at = Utc::now() + self.ttl;
        self.sessions.insert(token.clone(), Session { user: user.clone(), expires_at }).await;
        SignedIn { token, user, expires_at }
    }

    async fn identity_for(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        let Some(Value::String(uid)) = self.store.get(&format!("identity_emails/{}", email_key(email))).await? else {
            return Ok(None);
        };
        Ok(fetch(&self.store, "identities", &uid).await?)
    }

    async fn is_locked(&self, email: &str, now: DateTime<Utc>) -> bool {
        self.failures.get(email).await.and_then(|f| f.locked_until).is_some_and(|until| until > now)
    }

    async fn record_failure(&self, email: &str, now: DateTime<Utc>) {
        let entry = self
            .failures
            .entry(email.to_string())
            .and_upsert_with(|current| {
                let mut failed = current
                    .map(|e| e.into_value())
                    .filter(|f| !f.locked_until.is_some_and(|until| until <= now))
                    .unwrap_or_default();
                failed.count += 1;
                if failed.count >= MAX_FAILED_LOGINS {
                    failed.locked_until = Some(now + Duration::minutes(LOCKOUT_MINUTES));
                }
                std::future::ready(failed)
            })
            .await;
        if entry.value().count == MAX_FAILED_LOGINS {
            tracing::warn!(%email, "too many failed logins, locking");
        }
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if validator::validate_email(email.as_str()) { Ok(email) } else { Err(AuthError::InvalidEmail) }
}

/// Email as a single path segment.
fn email_key(email: &str) -> String {
    email
        .chars()
        .map(|c| match c {
            '.' => "%2E".to_string(),
            '#' => "%23".to_string(),
            '$' => "%24".to_string(),
            '[' => "%5B".to_string(),
            ']' => "%5D".to_string(),
            '/' => "%2F".to_string(),
            '%' => "%25".to_string(),
            c => c.to_string(),
        })
        .collect()
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH { return Err(AuthError::WeakPassword); }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service() -> (SessionService, MemoryStore) {
        let memory = MemoryStore::new();
        let service = SessionService::new(Backend::Memory(memory.clone()), EventPublisher::disabled(), Duration::hours(1));
        (service, memory)
    }

    fn request(email: &str, password: &str) -> SignUpRequest {
        SignUpRequest { email: email.into(), password: password.into(), first_name: "Ada".into(), last_name: "Obi".into(), ..Default::default() }
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile_and_session() {
        let (service, memory) = service();
        let signed_in = service.sign_up(request("Ada@Example.com", "secret1")).await.unwrap();
        assert_eq!(signed_in.user.email, "ada@example.com");
        assert!(!signed_in.user.is_admin);

        let tree = memory.snapshot().await;
        let profile = &tree["users"][&signed_in.user.id];
        assert_eq!(profile["firstName"], "Ada");
        assert_eq!(profile["isAdmin"], false);
        assert!(profile["createdAt"].is_number());
        assert!(tree["identities"][&signed_in.user.id]["passwordHash"].as_str().unwrap().starts_with("$argon2"));

        let me = service.current_user(&signed_in.token).await.unwrap();
        assert_eq!(me.id, signed_in.user.id);
    }

    #[tokio::test]
    async fn test_sign_up_errors() {
        let (service, _) = service();
        service.sign_up(request("ada@example.com", "secret1")).await.unwrap();
        assert!(matches!(service.sign_up(request("ADA@example.com", "secret2")).await, Err(AuthError::EmailInUse)));
        assert!(matches!(service.sign_up(request("bola@example.com", "12345")).await, Err(AuthError::WeakPassword)));
        assert!(matches!(service.sign_up(request("not-an-email", "secret1")).await, Err(AuthError::InvalidEmail)));
        assert_eq!(AuthError::EmailInUse.to_string(), "This email address is already in use by another account.");
    }

    #[tokio::test]
    async fn test_failed_sign_up_releases_email() {
        let memory = MemoryStore::with_data(json!({"users": "locked"}));
        let service = SessionService::new(Backend::Memory(memory.clone()), EventPublisher::disabled(), Duration::hours(1));
        assert!(matches!(service.sign_up(request("ada@example.com", "secret1")).await, Err(AuthError::Store(_))));
        assert_eq!(memory.snapshot().await.get("identity_emails").and_then(|v| v.as_object()).map(|m| m.len()).unwrap_or(0), 0);

        memory.remove("users").await.unwrap();
        let signed_in = service.sign_up(request("ada@example.com", "secret1")).await.unwrap();
        assert!(service.login("ada@example.com", "secret1").await.is_ok());
        assert_eq!(signed_in.user.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_login_logout() {
        let (service, _) = service();
        service.sign_up(request("ada@example.com", "secret1")).await.unwrap();
        assert!(matches!(service.login("ada@example.com", "wrong-pass").await, Err(AuthError::InvalidCredentials)));
        assert!(matches!(service.login("nobody@example.com", "secret1").await, Err(AuthError::InvalidCredentials)));

        let session = service.login(" ADA@example.com ", "secret1").await.unwrap();
        service.logout(&session.token).await;
        assert!(matches!(service.current_user(&session.token).await, Err(AuthError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_lockout_after_repeated_failures() {
        let (service, _) = service();
        service.sign_up(request("ada@example.com", "secret1")).await.unwrap();
        for _ in 0..MAX_FAILED_LOGINS {
            let _ = service.login("ada@example.com", "nope-nope").await;
        }
        assert!(matches!(service.login("ada@example.com", "secret1").await, Err(AuthError::TooManyRequests)));
    }

    #[tokio::test]
    async fn test_failed_logins_are_counted_per_email() {
        let (service, _) = service();
        for i in 0..3 {
            let _ = service.login(&format!("ghost{i}@example.com"), "whatever").await;
        }
        service.failures.run_pending_tasks().await;
        assert_eq!(service.failures.entry_count(), 3);
        assert!(!service.is_locked("ghost0@example.com", Utc::now()).await);
    }

    #[tokio::test]
    async fn test_refresh_keeps_session_expiry() {
        let (service, memory) = service();
        let signed_in = service.sign_up(request("ada@example.com", "secret1")).await.unwrap();
        memory.set(&format!("users/{}/firstName", signed_in.user.id), json!("Adaeze")).await.unwrap();
        assert_eq!(service.refresh_user(&signed_in.token).await.unwrap().first_name, "Adaeze");
        let session = service.sessions.get(&signed_in.token).await.unwrap();
        assert_eq!(session.expires_at, signed_in.expires_at);
        assert_eq!(service.current_user(&signed_in.token).await.unwrap().first_name, "Adaeze");
    }

    #[tokio::test]
    async fn test_missing_profile_signs_out() {
        let (service, memory) = service();
        let signed_in = service.sign_up(request("ada@example.com", "secret1")).await.unwrap();
        memory.remove(&format!("users/{}", signed_in.user.id)).await.unwrap();

        assert!(matches!(service.login("ada@example.com", "secret1").await, Err(AuthError::ProfileNotFound)));
        assert!(matches!(service.refresh_user(&signed_in.token).await, Err(AuthError::ProfileNotFound)));
        assert!(matches!(service.current_user(&signed_in.token).await, Err(AuthError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_require_admin_reads_fresh_flag() {
        let (service, memory) = service();
        let signed_in = service.sign_up(request("ada@example.com", "secret1")).await.unwrap();
        assert!(matches!(service.require_admin(&signed_in.token).await, Err(AuthError::NotAdmin)));
        memory.set(&format!("users/{}/isAdmin", signed_in.user.id), json!(true)).await.unwrap();
        assert!(service.require_admin(&signed_in.token).await.unwrap().is_admin);
    }

    #[tokio::test]
    async fn test_update_password() {
        let (service, _) = service();
        let signed_in = service.sign_up(request("ada@example.com", "secret1")).await.unwrap();
        assert!(matches!(service.update_password(&signed_in.token, "123").await, Err(AuthError::WeakPassword)));
        service.update_password(&signed_in.token, "new-secret").await.unwrap();
        assert!(service.login("ada@example.com", "secret1").await.is_err());
        assert!(service.login("ada@example.com", "new-secret").await.is_ok());
    }

    #[test]
    fn test_email_key_is_a_valid_segment() {
        let key = email_key("a.b#c@x.com");
        assert!(crate::store::segments(&format!("identity_emails/{key}")).is_ok());
    }
}
