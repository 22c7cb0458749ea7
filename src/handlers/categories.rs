use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use model::entities::category;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request structure for creating a new category
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateCategoryRequest {
    /// The name of the category (unique among the user's categories)
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    /// Optional description of what the category is for
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

/// Request structure for updating an existing category
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

/// Response structure for category operations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// System categories are shared by everyone and read-only
    pub is_system: bool,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            is_system: model.is_system(),
            name: model.name,
            description: model.description,
        }
    }
}

fn clean_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Category name must not be blank".to_string()));
    }
    Ok(name.to_string())
}

fn duplicate(name: &str) -> ApiError {
    ApiError::Conflict {
        code: "DUPLICATE_CATEGORY",
        message: format!("Category with name '{name}' already exists"),
    }
}

/// A category the user can see; others look like they do not exist.
async fn load_visible(state: &AppState, user_id: i32, id: i32) -> ApiResult<category::Model> {
    match category::Entity::find_by_id(id).one(&state.db).await? {
        Some(found) if found.is_visible_to(user_id) => Ok(found),
        _ => Err(ApiError::not_found("Category", id)),
    }
}

/// A category the user may change.
async fn load_mutable(state: &AppState, user_id: i32, id: i32) -> ApiResult<category::Model> {
    let found = load_visible(state, user_id, id).await?;
    if found.is_system() {
        warn!("User {} attempted to modify system category {}", user_id, id);
        return Err(ApiError::Forbidden("System categories are read-only".to_string()));
    }
    Ok(found)
}

/// Create a new category
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created successfully", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 409, description = "Category name already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CategoryResponse>>)> {
    debug!("Creating category with name: {}", request.name);
    request.validate()?;
    let name = clean_name(&request.name)?;

    if category::Entity::find_named(&state.db, Some(auth.id), &name).await?.is_some() {
        warn!("Category name '{}' already exists", name);
        return Err(duplicate(&name));
    }

    let new_category = category::ActiveModel {
        name: Set(name),
        description: Set(request.description),
        user_id: Set(Some(auth.id)),
        ..Default::default()
    };

    let created = new_category.insert(&state.db).await?;
    info!("Category created successfully with ID: {}", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(CategoryResponse::from(created), "Category created successfully")),
    ))
}

/// List system categories and the user's own
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "List of visible categories", body = ApiResponse<Vec<CategoryResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<CategoryResponse>>>> {
    trace!("Entering list_categories function");
    let categories = category::Entity::list_visible(&state.db, auth.id).await?;
    info!("Retrieved {} categories", categories.len());
    Ok(Json(ApiResponse::ok(
        categories.into_iter().map(CategoryResponse::from).collect(),
        "Categories retrieved successfully",
    )))
}

/// Get a single category by ID
#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category found", body = ApiResponse<CategoryResponse>),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<ApiResponse<CategoryResponse>>> {
    debug!("Fetching category with ID: {}", id);
    let found = load_visible(&state, auth.id, id).await?;
    Ok(Json(ApiResponse::ok(CategoryResponse::from(found), "Category retrieved successfully")))
}

/// Update a category
#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated successfully", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 403, description = "System categories are read-only", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "Category name already exists", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateCategoryRequest>,
) -> ApiResult<Json<ApiResponse<CategoryResponse>>> {
    debug!("Updating category with ID: {}", id);
    request.validate()?;
    let existing = load_mutable(&state, auth.id, id).await?;

    let mut active: category::ActiveModel = existing.into();
    if let Some(name) = request.name {
        let name = clean_name(&name)?;
        if let Some(other) = category::Entity::find_named(&state.db, Some(auth.id), &name).await? {
            if other.id != id {
                return Err(duplicate(&name));
            }
        }
        active.name = Set(name);
    }
    if request.description.is_some() {
        active.description = Set(request.description);
    }

    let updated = active.update(&state.db).await?;
    info!("Category {} updated successfully", id);
    Ok(Json(ApiResponse::ok(CategoryResponse::from(updated), "Category updated successfully")))
}

/// Delete a category; its transactions become uncategorized
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted successfully"),
        (status = 403, description = "System categories are read-only", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    debug!("Deleting category with ID: {}", id);
    let existing = load_mutable(&state, auth.id, id).await?;
    existing.delete(&state.db).await?;

    info!("Category {} deleted successfully", id);
    Ok(StatusCode::NO_CONTENT)
}
