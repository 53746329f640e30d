//! User account models for login and administration

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::users;

/// Roles known to the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    /// Utility staff
    Pea,
    /// Contracted installation crews
    Outsource,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "ADMIN"),
            UserRole::Pea => write!(f, "PEA"),
            UserRole::Outsource => write!(f, "OUTSOURCE"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(UserRole::Admin),
            "PEA" => Ok(UserRole::Pea),
            "OUTSOURCE" => Ok(UserRole::Outsource),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// User as returned by the API (no password hash)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub displayname: String,
    pub role: UserRole,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl TryFrom<users::Model> for UserResponse {
    type Error = String;

    fn try_from(model: users::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            username: model.username,
            displayname: model.displayname,
            role: model.role.parse()?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Payload for creating or updating a user; passwords are never set through it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserForm {
    pub username: String,
    pub displayname: String,
    pub role: UserRole,
}

impl UserForm {
    /// Validate lengths the same way the admin form does
    pub fn validate(&self) -> Result<(), String> {
        let mut problems = Vec::new();
        let username_len = self.username.trim().chars().count();
        if username_len < 3 {
            problems.push("ชื่อผู้ใช้งานต้องมีอย่างน้อย 3 ตัวอักษร");
        } else if username_len > 50 {
            problems.push("ชื่อผู้ใช้งานต้องไม่เกิน 50 ตัวอักษร");
        }
        let displayname_len = self.displayname.trim().chars().count();
        if displayname_len < 3 {
            problems.push("ชื่อที่แสดงต้องมีอย่างน้อย 3 ตัวอักษร");
        } else if displayname_len > 50 {
            problems.push("ชื่อที่แสดงต้องไม่เกิน 50 ตัวอักษร");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(format!("ข้อมูลไม่ถูกต้อง: {}", problems.join(", ")))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserSortBy {
    Username,
    #[default]
    CreatedAt,
}

/// Query parameters for GET /api/users
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub search_username: Option<String>,
    pub role: Option<UserRole>,
    pub sort_by: Option<UserSortBy>,
    pub sort_order: Option<crate::models::meter::SortOrder>,
}

impl UserListQuery {
    pub fn validate(&self) -> Result<(), String> {
        if self.page == Some(0) {
            return Err("page must be at least 1".to_string());
        }
        if let Some(page_size) = self.page_size {
            if page_size < 1 || page_size > crate::models::meter::MAX_PAGE_SIZE {
                return Err(format!(
                    "pageSize must be between 1 and {}",
                    crate::models::meter::MAX_PAGE_SIZE
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total_count: u64,
    pub current_page: u64,
    pub page_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}
