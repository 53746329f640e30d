//! User administration and credential checks
//!
//! Passwords are bcrypt hashes. Hashing and verification run on the
//! blocking pool.

use std::sync::Arc;

use chrono::FixedOffset;
use mockable::Clock;
use uuid::Uuid;

use crate::entities::users;
use crate::models::user::{UserForm, UserListQuery, UserListResponse, UserResponse, UserRole};
use crate::models::meter::DEFAULT_PAGE_SIZE;
use crate::services::meter_store::StoreError;
use crate::services::user_store::{UserSearch, UserStore};

pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";
const BCRYPT_COST: u32 = 10;
pub const DUPLICATE_USERNAME_MESSAGE: &str = "ชื่อผู้ใช้งานนี้ถูกใช้ไปแล้ว";

#[derive(Debug, Clone, PartialEq)]
pub enum UserServiceError {
    Validation(String),
    NotFound,
    DuplicateUsername,
    /// Unknown username
    UnknownUser,
    WrongPassword,
    /// No users exist and no bootstrap password is configured
    BootstrapUnavailable,
    Store(StoreError),
    Hash(String),
}

impl std::fmt::Display for UserServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserServiceError::Validation(msg) => write!(f, "{}", msg),
            UserServiceError::NotFound => write!(f, "User not found"),
            UserServiceError::DuplicateUsername => write!(f, "{}", DUPLICATE_USERNAME_MESSAGE),
            UserServiceError::UnknownUser => write!(f, "ชื่อผู้ใช้งานไม่ถูกต้อง"),
            UserServiceError::WrongPassword => write!(f, "รหัสผ่านไม่ถูกต้อง"),
            UserServiceError::BootstrapUnavailable => write!(f, "ไม่ได้กำหนดรหัสผ่านเริ่มต้นสำหรับ Admin"),
            UserServiceError::Store(e) => write!(f, "{}", e),
            UserServiceError::Hash(msg) => write!(f, "Password hashing failed: {}", msg),
        }
    }
}

impl std::error::Error for UserServiceError {}

impl From<StoreError> for UserServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => UserServiceError::DuplicateUsername,
            StoreError::NotFound => UserServiceError::NotFound,
            other => UserServiceError::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    offset: FixedOffset,
    default_password: String,
    /// Password for the `admin` account recreated whenever the users table is empty
    admin_password: Option<String>,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        clock: Arc<dyn Clock + Send + Sync>,
        offset: FixedOffset,
        default_password: String,
    ) -> Self {
        Self {
            store,
            clock,
            offset,
            default_password,
            admin_password: None,
            bcrypt_cost: BCRYPT_COST,
        }
    }

    pub fn with_admin_password(mut self, password: Option<String>) -> Self {
        self.admin_password = password.filter(|p| !p.is_empty());
        self
    }

    /// Lower the bcrypt work factor (tests)
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub async fn hash_password(&self, password: &str) -> Result<String, UserServiceError> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| UserServiceError::Hash(e.to_string()))?
            .map_err(|e| UserServiceError::Hash(e.to_string()))
    }

    /// Create the bootstrap administrator when the users table is empty
    pub async fn ensure_admin(&self) -> Result<bool, UserServiceError> {
        if self.store.count_all().await? > 0 {
            return Ok(false);
        }
        let password = self
            .admin_password
            .as_deref()
            .ok_or(UserServiceError::BootstrapUnavailable)?;

        let now = self.clock.utc().with_timezone(&self.offset);
        let admin = users::Model {
            id: Uuid::new_v4(),
            username: BOOTSTRAP_ADMIN_USERNAME.to_string(),
            displayname: BOOTSTRAP_ADMIN_USERNAME.to_string(),
            password: self.hash_password(password).await?,
            role: UserRole::Admin.to_string(),
            created_at: now,
            updated_at: now,
        };
        match self.store.insert(admin).await {
            Ok(_) => {}
            // a concurrent login created it first
            Err(StoreError::Conflict(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(username = BOOTSTRAP_ADMIN_USERNAME, "Bootstrap administrator created");
        Ok(true)
    }

    /// Check a username/password pair, recreating `admin` first if no account exists
    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<UserResponse, UserServiceError> {
        self.ensure_admin().await?;

        let user = self
            .store
            .find_by_username(username.trim())
            .await?
            .ok_or(UserServiceError::UnknownUser)?;

        let hash = user.password.clone();
        let password = password.to_string();
        let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| UserServiceError::Hash(e.to_string()))?
            .unwrap_or(false);
        if !valid {
            return Err(UserServiceError::WrongPassword);
        }

        to_response(user)
    }

    pub async fn list_users(&self, query: &UserListQuery) -> Result<UserListResponse, UserServiceError> {
        query.validate().map_err(UserServiceError::Validation)?;
        let page = query.page.unwrap_or(1);
        let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        let search = UserSearch {
            username: query.search_username.clone(),
            role: query.role,
            sort_by: query.sort_by.unwrap_or_default(),
            sort_order: query.sort_order.unwrap_or_default(),
            offset: (page - 1).saturating_mul(page_size),
            limit: page_size,
        };
        let (rows, total_count) = self.store.search(&search).await?;

        Ok(UserListResponse {
            users: rows.into_iter().map(to_response).collect::<Result<_, _>>()?,
            total_count,
            current_page: page,
            page_size,
        })
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserResponse, UserServiceError> {
        let user = self.store.find_by_id(id).await?.ok_or(UserServiceError::NotFound)?;
        to_response(user)
    }

    /// Create an account with the configured initial password
    pub async fn create_user(&self, form: UserForm) -> Result<UserResponse, UserServiceError> {
        form.validate().map_err(UserServiceError::Validation)?;
        let username = form.username.trim().to_string();
        if self.store.find_by_username(&username).await?.is_some() {
            return Err(UserServiceError::DuplicateUsername);
        }

        let now = self.clock.utc().with_timezone(&self.offset);
        let user = users::Model {
            id: Uuid::new_v4(),
            username,
            displayname: form.displayname.trim().to_string(),
            password: self.hash_password(&self.default_password).await?,
            role: form.role.to_string(),
            created_at: now,
            updated_at: now,
        };
        let saved = self.store.insert(user).await?;
        tracing::info!(user_id = %saved.id, username = %saved.username, role = %saved.role, "User created");
        to_response(saved)
    }

    /// Update name and role; the password is left untouched
    pub async fn update_user(&self, id: Uuid, form: UserForm) -> Result<UserResponse, UserServiceError> {
        form.validate().map_err(UserServiceError::Validation)?;
        let mut user = self.store.find_by_id(id).await?.ok_or(UserServiceError::NotFound)?;

        let username = form.username.trim().to_string();
        if let Some(other) = self.store.find_by_username(&username).await? {
            if other.id != id {
                return Err(UserServiceError::DuplicateUsername);
            }
        }

        user.username = username;
        user.displayname = form.displayname.trim().to_string();
        user.role = form.role.to_string();
        user.updated_at = self.clock.utc().with_timezone(&self.offset);

        let saved = self.store.update(user).await?;
        tracing::info!(user_id = %saved.id, "User updated");
        to_response(saved)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<UserResponse, UserServiceError> {
        let removed = self.store.delete(id).await?.ok_or(UserServiceError::NotFound)?;
        tracing::info!(user_id = %removed.id, username = %removed.username, "User deleted");
        to_response(removed)
    }
}

fn to_response(user: users::Model) -> Result<UserResponse, UserServiceError> {
    UserResponse::try_from(user).map_err(|e| UserServiceError::Store(StoreError::Database(e)))
}
