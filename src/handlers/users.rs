use axum::{extract::State, http::StatusCode, response::Json};
use chrono::NaiveDateTime;
use model::entities::user;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{AuthUser, hash_password};
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request body for updating the current user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    /// New password, at least 8 characters
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub display_name: String,
    pub created_at: NaiveDateTime,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            display_name: model.display_name,
            created_at: model.created_at,
        }
    }
}

async fn load(state: &AppState, auth: &AuthUser) -> ApiResult<user::Model> {
    user::Entity::find_by_id(auth.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User", auth.id))
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering get_me function");
    let found = load(&state, &auth).await?;
    Ok(Json(ApiResponse::ok(UserResponse::from(found), "User retrieved successfully")))
}

/// Update the current user's display name or password
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering update_me function");
    request.validate()?;

    let mut active: user::ActiveModel = load(&state, &auth).await?.into();
    if let Some(display_name) = request.display_name {
        let display_name = display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(ApiError::Validation("display_name must not be blank".to_string()));
        }
        active.display_name = Set(display_name);
    }
    if let Some(password) = request.password {
        debug!("Resetting password for user {}", auth.id);
        active.password_hash = Set(hash_password(password, state.settings.bcrypt_cost).await?);
    }

    let updated = active.update(&state.db).await?;
    info!("User {} updated", updated.id);
    Ok(Json(ApiResponse::ok(UserResponse::from(updated), "User updated successfully")))
}

/// Delete the current user together with their transactions and categories
#[utoipa::path(
    delete,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<StatusCode> {
    trace!("Entering delete_me function");
    let found = load(&state, &auth).await?;
    found.delete(&state.db).await?;
    state.previews.discard(auth.id).await;

    info!("User {} deleted", auth.id);
    Ok(StatusCode::NO_CONTENT)
}
