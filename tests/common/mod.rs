#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use http_body_util::BodyExt;
use meter_tracker::{
    config::bangkok_offset,
    entities::meters,
    models::user::UserRole,
    routes::build_router,
    services::{
        auth::AuthService, gis::GisService, meter_service::MeterService, pdf::PdfService,
        user_service::UserService,
    },
    test_support::{user_fixture, FakePhotoStorage, FixedClock, InMemoryMeterStore, InMemoryUserStore},
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN: (&str, &str) = ("admin", "admin-pass");
pub const STAFF: (&str, &str) = ("somchai", "staff-pass");
pub const BOUNDARY: &str = "meter-test-boundary";

/// Every test runs at 2026-10-17 10:30 Bangkok time
pub fn now() -> DateTime<Utc> {
    bkk(17, 10, 30).with_timezone(&Utc)
}

pub fn bkk(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    bangkok_offset()
        .with_ymd_and_hms(2026, 10, day, hour, minute, 0)
        .single()
        .expect("valid fixture timestamp")
}

pub struct TestApp {
    pub router: Router,
    pub meters: Arc<InMemoryMeterStore>,
    pub photos: Arc<FakePhotoStorage>,
    pub users: Arc<InMemoryUserStore>,
}

/// Build the full router over in-memory stores, seeded with an admin and a staff user
pub fn build_test_app(rows: Vec<meters::Model>) -> TestApp {
    let hash = |password: &str| bcrypt::hash(password, 4).expect("bcrypt hash");
    let users = Arc::new(InMemoryUserStore::with_users(vec![
        user_fixture(ADMIN.0, UserRole::Admin, &hash(ADMIN.1)),
        user_fixture(STAFF.0, UserRole::Pea, &hash(STAFF.1)),
    ]));
    let meters = Arc::new(InMemoryMeterStore::with_rows(rows));
    let photos = Arc::new(FakePhotoStorage::new());
    let clock = Arc::new(FixedClock::new(now()));

    let user_service = UserService::new(users.clone(), clock.clone(), bangkok_offset(), "12345678".to_string())
        .with_bcrypt_cost(4)
        .with_admin_password(Some(ADMIN.1.to_string()));
    let meter_service = MeterService::new(meters.clone(), photos.clone(), clock.clone(), bangkok_offset());

    let state = AppState {
        meters: meter_service,
        auth: AuthService::new(user_service.clone()),
        users: user_service,
        // nothing listens here; upstream calls fail fast
        gis: GisService::new("http://127.0.0.1:9/query".to_string(), "http://127.0.0.1:9/".to_string()),
        pdf: PdfService::new("http://127.0.0.1:9".to_string()),
        clock,
        local_offset: bangkok_offset(),
    };

    TestApp {
        router: build_router(state),
        meters,
        photos,
        users,
    }
}

pub fn basic(credentials: (&str, &str)) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", credentials.0, credentials.1)))
}

pub fn get(uri: &str, credentials: Option<(&str, &str)>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(credentials) = credentials {
        builder = builder.header(header::AUTHORIZATION, basic(credentials));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, credentials: Option<(&str, &str)>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(credentials) = credentials {
        builder = builder.header(header::AUTHORIZATION, basic(credentials));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// `multipart/form-data` body with text fields and (name, file name, bytes) files
pub fn multipart_request(
    method: &str,
    uri: &str,
    credentials: (&str, &str),
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/jpeg\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic(credentials))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn send_raw(app: &TestApp, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, bytes) = send_raw(app, request).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
