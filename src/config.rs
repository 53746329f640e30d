//! Environment configuration
//!
//! Values are read from the process environment after `dotenvy` has loaded
//! an optional `.env` file. Only `DATABASE_URL` is strictly required; the
//! outbound service settings fall back to the production endpoints.

use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
/// Asia/Bangkok, no DST
const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;
const DEFAULT_IMAGEKIT_UPLOAD_URL: &str = "https://upload.imagekit.io/api/v1/files/upload";
const DEFAULT_IMAGEKIT_API_URL: &str = "https://api.imagekit.io/v1";
const DEFAULT_GIS_QUERY_URL: &str =
    "https://giss3.pea.co.th/arcgis/rest/services/PEA_QUERY/MapServer/9/query";
const DEFAULT_GIS_ROOT_URL: &str = "https://giss3.pea.co.th/arcgis/rest/services/";
const DEFAULT_PDF_SERVICE_URL: &str = "http://localhost:8080";
const DEFAULT_USER_PASSWORD: &str = "12345678";

pub const PDF_TIMEOUT: Duration = Duration::from_secs(10);
pub const GIS_TIMEOUT: Duration = Duration::from_secs(15);
pub const PHOTO_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has invalid value '{}'", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    /// Offset used for "today", end-of-day and report formatting
    pub local_offset: FixedOffset,
    pub imagekit_token: String,
    pub imagekit_upload_url: String,
    pub imagekit_api_url: String,
    pub gis_query_url: String,
    pub gis_root_url: String,
    pub pdf_service_url: String,
    /// Initial password given to accounts created by an administrator
    pub default_password: String,
    /// Password for the `admin` account recreated whenever the users table is empty
    pub default_admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let offset_hours = match env::var("LOCAL_UTC_OFFSET_HOURS") {
            Ok(raw) => raw.trim().parse::<i32>().map_err(|_| ConfigError::Invalid {
                key: "LOCAL_UTC_OFFSET_HOURS",
                value: raw.clone(),
            })?,
            Err(_) => DEFAULT_UTC_OFFSET_HOURS,
        };
        let local_offset = offset_from_hours(offset_hours).ok_or(ConfigError::Invalid {
            key: "LOCAL_UTC_OFFSET_HOURS",
            value: offset_hours.to_string(),
        })?;

        let imagekit_token = env::var("IMAGEKIT_TOKEN").unwrap_or_default();
        if imagekit_token.is_empty() {
            tracing::warn!("IMAGEKIT_TOKEN is not set, photo uploads will be rejected upstream");
        }

        Ok(Self {
            database_url,
            bind_addr: env_or("BIND_ADDR", DEFAULT_BIND_ADDR),
            local_offset,
            imagekit_token,
            imagekit_upload_url: env_or("IMAGEKIT_UPLOAD_URL", DEFAULT_IMAGEKIT_UPLOAD_URL),
            imagekit_api_url: env_or("IMAGEKIT_API_URL", DEFAULT_IMAGEKIT_API_URL),
            gis_query_url: env_or("GIS_QUERY_URL", DEFAULT_GIS_QUERY_URL),
            gis_root_url: env_or("GIS_ROOT_URL", DEFAULT_GIS_ROOT_URL),
            pdf_service_url: env_or("PDF_SERVICE_URL", DEFAULT_PDF_SERVICE_URL),
            default_password: env_or("DEFAULT_PASSWORD", DEFAULT_USER_PASSWORD),
            default_admin_password: env::var("DEFAULT_ADMIN_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Build a fixed offset from whole hours east of UTC
pub fn offset_from_hours(hours: i32) -> Option<FixedOffset> {
    if !(-23..=23).contains(&hours) {
        return None;
    }
    FixedOffset::east_opt(hours * 3600)
}

/// Bangkok offset used when no configuration is available (tests, tools)
pub fn bangkok_offset() -> FixedOffset {
    offset_from_hours(DEFAULT_UTC_OFFSET_HOURS).unwrap_or_else(|| Utc.fix())
}
