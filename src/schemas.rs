use compute::ai::LanguageModel;
use compute::default_pipelines;
use compute::duplicates::DuplicatePolicy;
use compute::import::{PreviewStore, StatementImporter};
use compute::insights::InsightService;
use compute::receipt::{OcrEngine, ReceiptExtractor, ReceiptPreprocessor};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::auth::AuthKeys;
use crate::config::Settings;
use crate::handlers::{
    ai::{AiQueryRequest, SuggestionsResponse},
    auth::{LoginRequest, RegisterRequest, TokenResponse},
    categories::{CategoryResponse, CreateCategoryRequest, UpdateCategoryRequest},
    imports::{ConfirmImportResponse, ImportUploadResponse},
    transactions::{CreateTransactionRequest, TransactionPage, TransactionResponse, UpdateTransactionRequest},
    users::{UpdateUserRequest, UserResponse},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Pending statement imports, one per user
    pub previews: PreviewStore,
    pub importer: Arc<StatementImporter>,
    pub receipts: Arc<ReceiptExtractor>,
    pub insights: Arc<InsightService>,
    pub auth: AuthKeys,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        settings: Settings,
        model: Arc<dyn LanguageModel>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        let (importer, receipts) = default_pipelines(model.clone(), ocr, ReceiptPreprocessor::default());
        let insights = InsightService::new(model, settings.currency_format(), settings.chart_hints);

        Self {
            db,
            previews: PreviewStore::new(settings.preview_ttl()),
            importer: Arc::new(importer),
            receipts: Arc::new(receipts),
            insights: Arc::new(insights),
            auth: AuthKeys::new(&settings.jwt_secret, settings.jwt_ttl_hours),
            settings: Arc::new(settings),
        }
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.settings.duplicate_policy()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("db", &self.db)
            .field("bind_address", &self.settings.bind_address)
            .finish_non_exhaustive()
    }
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Registers the bearer token scheme referenced by the protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::users::get_me,
        crate::handlers::users::update_me,
        crate::handlers::users::delete_me,
        crate::handlers::transactions::create_transaction,
        crate::handlers::transactions::list_transactions,
        crate::handlers::transactions::get_transaction,
        crate::handlers::transactions::update_transaction,
        crate::handlers::transactions::delete_transaction,
        crate::handlers::categories::create_category,
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,
        crate::handlers::stats::summary,
        crate::handlers::stats::by_category,
        crate::handlers::stats::by_date,
        crate::handlers::receipts::extract_receipt,
        crate::handlers::imports::upload_bank_statement,
        crate::handlers::imports::get_preview,
        crate::handlers::imports::discard_preview,
        crate::handlers::imports::confirm_import,
        crate::handlers::ai::query,
        crate::handlers::ai::suggestions,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            RegisterRequest,
            LoginRequest,
            TokenResponse,
            UserResponse,
            UpdateUserRequest,
            CreateTransactionRequest,
            UpdateTransactionRequest,
            TransactionResponse,
            TransactionPage,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryResponse,
            ImportUploadResponse,
            crate::handlers::upload::FileUpload,
            ConfirmImportResponse,
            AiQueryRequest,
            SuggestionsResponse,
            common::TransactionKind,
            common::StatsSummary,
            common::CategoryTotal,
            common::DateBucket,
            common::DateBucketTotal,
            common::CandidateTransaction,
            common::ImportMethod,
            common::ImportPreview,
            common::ConfirmImportRequest,
            common::ReceiptCandidate,
            common::ReceiptExtraction,
            common::ReceiptMethod,
            common::Insight,
            common::InsightPreset,
            common::ChartSpec,
            common::ChartKind,
            common::ChartDataset,
            common::QuerySuggestion,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "The authenticated user's account"),
        (name = "transactions", description = "Income and expense transactions"),
        (name = "categories", description = "System and user categories"),
        (name = "stats", description = "Aggregated statistics"),
        (name = "receipts", description = "Receipt OCR extraction"),
        (name = "imports", description = "Bank statement import"),
        (name = "ai", description = "AI finance assistant"),
    ),
    info(
        title = "Finsight API",
        description = "Personal finance tracker with receipt OCR, bank statement import and an AI assistant",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
