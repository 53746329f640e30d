//! HTTP Basic credential verification with a short-lived cache
//!
//! Successful verifications are cached for five minutes keyed by the raw
//! `Authorization` header value, so repeated requests skip bcrypt. Any user
//! update or delete clears the cache.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use moka::future::Cache;

use crate::models::user::UserResponse;
use crate::services::user_service::{UserService, UserServiceError};

const CREDENTIAL_TTL: Duration = Duration::from_secs(300);
const CREDENTIAL_CACHE_CAPACITY: u64 = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Header absent or not `Basic <base64>`
    MissingCredentials,
    InvalidCredentials(String),
    Internal(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "Authentication required"),
            AuthError::InvalidCredentials(msg) => write!(f, "{}", msg),
            AuthError::Internal(msg) => write!(f, "Authentication failed: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<UserServiceError> for AuthError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::UnknownUser
            | UserServiceError::WrongPassword
            | UserServiceError::BootstrapUnavailable => AuthError::InvalidCredentials(err.to_string()),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

/// Split a `Basic` authorization header into username and password
pub fn decode_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    cache: Arc<Cache<String, UserResponse>>,
}

impl AuthService {
    pub fn new(users: UserService) -> Self {
        let cache = Cache::builder()
            .max_capacity(CREDENTIAL_CACHE_CAPACITY)
            .time_to_live(CREDENTIAL_TTL)
            .build();
        Self {
            users,
            cache: Arc::new(cache),
        }
    }

    /// Resolve the user behind an `Authorization` header value
    pub async fn authenticate(&self, header: Option<&str>) -> Result<UserResponse, AuthError> {
        let header = header.ok_or(AuthError::MissingCredentials)?;
        if let Some(user) = self.cache.get(header).await {
            return Ok(user);
        }

        let (username, password) = decode_basic(header).ok_or(AuthError::MissingCredentials)?;
        let user = self.users.verify_credentials(&username, &password).await?;
        self.cache.insert(header.to_string(), user.clone()).await;
        tracing::debug!(username = %user.username, "Credentials verified");
        Ok(user)
    }

    /// Explicit login; never served from the cache
    pub async fn login(&self, username: &str, password: &str) -> Result<UserResponse, AuthError> {
        Ok(self.users.verify_credentials(username, password).await?)
    }

    /// Drop every cached verification
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
