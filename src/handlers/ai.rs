use axum::{extract::State, response::Json};
use common::{Insight, InsightPreset, QuerySuggestion};
use compute::insights::{InsightRequest, suggestions as suggested_queries};
use compute::records::load_records;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Most recent transactions the assistant looks at.
pub const INSIGHT_HISTORY_LIMIT: u64 = 500;

/// A question for the assistant, or one of the preset analyses
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct AiQueryRequest {
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub query: String,
    /// Answered locally without the hosted model when set
    pub preset: Option<InsightPreset>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<QuerySuggestion>,
}

impl AiQueryRequest {
    fn into_request(self) -> ApiResult<InsightRequest> {
        if let Some(preset) = self.preset {
            return Ok(InsightRequest::Preset(preset));
        }
        let query = self.query.trim();
        if query.is_empty() {
            return Err(ApiError::Validation("Either query or preset is required".to_string()));
        }
        Ok(InsightRequest::Query(query.to_string()))
    }
}

/// Ask the AI assistant about your finances
///
/// Model outages never fail the request; the answer then carries an
/// apology instead.
#[utoipa::path(
    post,
    path = "/api/v1/ai/query",
    tag = "ai",
    security(("bearer_auth" = [])),
    request_body = AiQueryRequest,
    responses(
        (status = 200, description = "Insight generated", body = ApiResponse<Insight>),
        (status = 400, description = "Neither query nor preset given", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn query(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<AiQueryRequest>,
) -> ApiResult<Json<ApiResponse<Insight>>> {
    trace!("Entering ai query function");
    request.validate()?;
    let request = request.into_request()?;

    let history = load_records(&state.db, auth.id, None, None, Some(INSIGHT_HISTORY_LIMIT)).await?;
    debug!("Answering with {} transactions of history", history.len());

    let insight = state.insights.answer(&request, &history).await;
    info!("Insight generated for user {}", auth.id);
    Ok(Json(ApiResponse::ok(insight, "Insight generated successfully")))
}

/// Suggested questions for the assistant
#[utoipa::path(
    get,
    path = "/api/v1/ai/suggestions",
    tag = "ai",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Suggested queries", body = ApiResponse<SuggestionsResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn suggestions(_auth: AuthUser) -> Json<ApiResponse<SuggestionsResponse>> {
    let response = SuggestionsResponse {
        suggestions: suggested_queries(),
    };
    Json(ApiResponse::ok(response, "Suggestions retrieved successfully"))
}
