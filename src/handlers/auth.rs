use axum::{extract::State, http::StatusCode, response::Json};
use model::entities::user;
use sea_orm::{ActiveModelTrait, DbErr, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::users::UserResponse;
use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request body for registering a new user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    /// Email address (unique, case-insensitive)
    #[validate(email)]
    pub email: String,
    /// Password, at least 8 characters
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    /// Name shown in the UI
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
}

/// Request body for logging in
#[derive(Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest").field("email", &self.email).finish_non_exhaustive()
    }
}

/// Issued bearer token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

fn is_unique_violation(err: &DbErr) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("unique") || message.contains("duplicate key")
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    trace!("Entering register function");
    request.validate()?;

    let display_name = request.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(ApiError::Validation("display_name must not be blank".to_string()));
    }

    let email = user::normalize_email(&request.email);
    if user::Entity::find_by_email(&state.db, &email).await?.is_some() {
        warn!("Registration attempt for existing email");
        return Err(ApiError::Conflict {
            code: "EMAIL_ALREADY_REGISTERED",
            message: "Email already registered".to_string(),
        });
    }

    let password_hash = hash_password(request.password, state.settings.bcrypt_cost).await?;
    let new_user = user::ActiveModel {
        email: Set(email),
        password_hash: Set(password_hash),
        display_name: Set(display_name),
        ..Default::default()
    };

    debug!("Inserting new user");
    let created = new_user.insert(&state.db).await.map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict {
                code: "EMAIL_ALREADY_REGISTERED",
                message: "Email already registered".to_string(),
            }
        } else {
            ApiError::Database(e)
        }
    })?;

    info!("User registered with ID: {}", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserResponse::from(created), "User registered successfully")),
    ))
}

/// Log in and receive a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<ApiResponse<TokenResponse>>> {
    trace!("Entering login function");
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let Some(found) = user::Entity::find_by_email(&state.db, &request.email).await? else {
        debug!("Login for unknown email");
        return Err(invalid());
    };
    if !verify_password(request.password, found.password_hash.clone()).await? {
        debug!("Wrong password for user {}", found.id);
        return Err(invalid());
    }

    let token = TokenResponse {
        access_token: state.auth.issue(found.id)?,
        token_type: "bearer".to_string(),
        expires_in: state.auth.ttl().num_seconds(),
    };
    info!("User {} logged in", found.id);
    Ok(Json(ApiResponse::ok(token, "Login successful")))
}
