use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{auth, health, meter, user};
use crate::AppState;

/// Two photos at phone-camera resolution plus form fields
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/users", get(user::list_users).post(user::create_user))
        .route(
            "/api/users/{id}",
            get(user::get_user).put(user::update_user).delete(user::delete_user),
        )
        .route_layer(middleware::from_fn(auth::require_admin));

    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/meters", get(meter::list_meters).post(meter::create_meter))
        .route("/api/meters/export.csv", get(meter::export_meters_csv))
        .route("/api/meters/{id}", get(meter::get_meter).put(meter::update_meter))
        .route("/api/meters/{id}/installation", put(meter::record_installation))
        .route("/api/meters/{id}/gis", get(meter::meter_gis))
        .route("/api/meters/{id}/pdf", get(meter::meter_pdf))
        .route("/api/gis/status", get(health::gis_status))
        .route("/api/pdf/status", get(health::pdf_status))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_user));

    Router::new()
        .route("/", get(health::root))
        .route("/api/health", get(health::health))
        .route("/api/auth/login", post(auth::login))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
