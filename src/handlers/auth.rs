//! Authentication middleware and login endpoints
//!
//! `require_user` guards every `/api` route except health checks and puts
//! the caller into request extensions as [`AuthUser`]. `require_admin` runs
//! after it on `/api/users*`.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use tracing::{error, info, warn};

use crate::models::error::ErrorResponse;
use crate::models::user::{LoginRequest, UserResponse, UserRole};
use crate::services::auth::AuthError;
use crate::AppState;

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserResponse);

fn unauthorized(message: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"meter-tracker\", charset=\"UTF-8\"")],
        Json(ErrorResponse::new(message)),
    )
        .into_response()
}

pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match state.auth.authenticate(header_value.as_deref()).await {
        Ok(user) => {
            req.extensions_mut().insert(AuthUser(user));
            next.run(req).await
        }
        Err(AuthError::Internal(msg)) => {
            error!(error = %msg, "Authentication backend failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Authentication failed")),
            )
                .into_response()
        }
        Err(e) => {
            warn!(path = %req.uri().path(), error = %e, "Rejected unauthenticated request");
            unauthorized(e.to_string())
        }
    }
}

pub async fn require_admin(req: Request, next: Next) -> Response {
    let caller = req
        .extensions()
        .get::<AuthUser>()
        .map(|AuthUser(user)| (user.role, user.username.clone()));

    match caller {
        Some((UserRole::Admin, _)) => next.run(req).await,
        Some((_, username)) => {
            warn!(username = %username, path = %req.uri().path(), "Admin route refused");
            (
                StatusCode::FORBIDDEN,
                Json(ErrorResponse::new("ไม่มีสิทธิ์เข้าถึง")),
            )
                .into_response()
        }
        None => unauthorized("Authentication required".to_string()),
    }
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<UserResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.auth.login(&body.username, &body.password).await {
        Ok(user) => {
            info!(username = %user.username, "Login succeeded");
            Ok(Json(user))
        }
        Err(AuthError::Internal(msg)) => {
            error!(error = %msg, "Login failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Authentication failed")),
            ))
        }
        Err(e) => {
            warn!(username = %body.username, "Login rejected");
            Err((StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(e.to_string()))))
        }
    }
}

/// GET /api/auth/me
pub async fn me(Extension(AuthUser(user)): Extension<AuthUser>) -> Json<UserResponse> {
    Json(user)
}
