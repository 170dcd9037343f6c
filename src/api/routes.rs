//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Unknown routes answer in the same `{code, error}` shape as handler errors
async fn fallback_handler(uri: axum::http::Uri) -> impl IntoResponse {
    let body = serde_json::json!({
        "code": "NotFound",
        "error": format!("no route for {}", uri.path()),
    });
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "application/json")],
        Body::from(body.to_string()),
    )
        .into_response()
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Typed request dispatch
        .route("/api/requests", post(handlers::dispatch))
        // Vaults
        .route(
            "/api/vaults",
            get(handlers::list_vaults).post(handlers::create_vault),
        )
        .route(
            "/api/vaults/{id}/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        // Drafts
        .route(
            "/api/transactions/{id}/signatures",
            get(handlers::list_signatures),
        )
        .route(
            "/api/transactions/{id}/sign",
            post(handlers::sign_transaction),
        )
        .route(
            "/api/transactions/{id}/status",
            get(handlers::transaction_status),
        )
        .route(
            "/api/transactions/{id}/execute",
            post(handlers::execute_transaction),
        )
        .fallback(fallback_handler)
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}

/// Bind and serve the API until the process stops
pub async fn serve(state: ApiState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(state)).await
}
