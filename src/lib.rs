// src/lib.rs

use std::sync::Arc;

use chrono::FixedOffset;
use mockable::Clock;
use services::{
    auth::AuthService, gis::GisService, meter_service::MeterService, pdf::PdfService,
    user_service::UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub meters: MeterService,
    pub users: UserService,
    pub auth: AuthService,
    pub gis: GisService,
    pub pdf: PdfService,
    pub clock: Arc<dyn Clock + Send + Sync>,
    /// Offset for calendar days, plain-date query parameters and report dates
    pub local_offset: FixedOffset,
}

pub mod entities {
    pub mod prelude;
    pub mod meters;
    pub mod users;
}

pub mod services {
    pub mod meter_filter;
    pub mod meter_status;
    pub mod meter_store;
    pub mod meter_service;
    pub mod photo_storage;
    pub mod gis;
    pub mod pdf;
    pub mod csv_export;
    pub mod thai_date;
    pub mod user_store;
    pub mod user_service;
    pub mod auth;
}

pub mod handlers {
    pub mod auth;
    pub mod health;
    pub mod meter;
    pub mod user;
}

pub mod config;
pub mod models;
pub mod routes;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
