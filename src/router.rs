use crate::handlers::{
    ai::{query as ai_query, suggestions},
    auth::{login, register},
    categories::{create_category, delete_category, get_category, list_categories, update_category},
    health::health_check,
    imports::{confirm_import, discard_preview, get_preview, upload_bank_statement},
    receipts::extract_receipt,
    stats::{by_category, by_date, summary},
    transactions::{create_transaction, delete_transaction, get_transaction, list_transactions, update_transaction},
    users::{delete_me, get_me, update_me},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Headroom over the largest file limit for multipart framing.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.settings.max_statement_bytes.max(state.settings.max_receipt_bytes) + BODY_LIMIT_SLACK;

    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Authentication
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        // Current user
        .route("/api/v1/users/me", get(get_me).put(update_me).delete(delete_me))
        // Transaction CRUD routes
        .route("/api/v1/transactions", post(create_transaction).get(list_transactions))
        .route(
            "/api/v1/transactions/:transaction_id",
            get(get_transaction).put(update_transaction).delete(delete_transaction),
        )
        // Category CRUD routes
        .route("/api/v1/categories", post(create_category).get(list_categories))
        .route(
            "/api/v1/categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
        // Statistics
        .route("/api/v1/stats/summary", get(summary))
        .route("/api/v1/stats/by-category", get(by_category))
        .route("/api/v1/stats/by-date", get(by_date))
        // Receipt OCR
        .route("/api/v1/receipts/extract", post(extract_receipt))
        // Bank statement import
        .route("/api/v1/imports/bank-statement", post(upload_bank_statement))
        .route("/api/v1/imports/preview", get(get_preview).delete(discard_preview))
        .route("/api/v1/imports/confirm", post(confirm_import))
        // AI assistant
        .route("/api/v1/ai/query", post(ai_query))
        .route("/api/v1/ai/suggestions", get(suggestions))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // A process-wide recorder can only be installed once, so tests run without it.
    #[cfg(not(test))]
    let router = {
        let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();
        router
            .route("/metrics", get(move || async move { metric_handle.render() }))
            .layer(prometheus_layer)
    };

    router
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(60)))
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
