//! User administration endpoints (ADMIN only)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::error::ErrorResponse;
use crate::models::user::{UserForm, UserListQuery, UserListResponse, UserResponse};
use crate::services::user_service::UserServiceError;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn map_user_error(err: UserServiceError) -> ApiError {
    let status = match &err {
        UserServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        UserServiceError::NotFound => StatusCode::NOT_FOUND,
        UserServiceError::DuplicateUsername => StatusCode::CONFLICT,
        UserServiceError::UnknownUser | UserServiceError::WrongPassword => StatusCode::UNAUTHORIZED,
        UserServiceError::BootstrapUnavailable
        | UserServiceError::Store(_)
        | UserServiceError::Hash(_) => {
            error!(error = %err, "User operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse::new(err.to_string())))
}

/// GET /api/users
///
/// Query: `page`, `pageSize`, `searchUsername`, `role`, `sortBy`
/// (`username` | `createdAt`), `sortOrder`
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    if let Err(e) = query.validate() {
        warn!(error = %e, "Invalid query parameters");
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e))));
    }
    state.users.list_users(&query).await.map(Json).map_err(map_user_error)
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    state.users.get_user(id).await.map(Json).map_err(map_user_error)
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(form): Json<UserForm>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.users.create_user(form).await.map_err(map_user_error)?;
    info!(user_id = %user.id, "User created via API");
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /api/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(form): Json<UserForm>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.update_user(id, form).await.map_err(map_user_error)?;
    state.auth.invalidate_all();
    Ok(Json(user))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.delete_user(id).await.map_err(map_user_error)?;
    state.auth.invalidate_all();
    Ok(Json(user))
}
