//! HTTP surface: feedback intake, ticket listing and the live ticket feed.

pub mod feedback;
pub mod health;
pub mod tickets;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// Maps each failure class to its own status so clients can tell "bad
/// input" from "could not classify" from "could not save".
pub fn error_response(err: &AppError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::Classification(_) => StatusCode::BAD_GATEWAY,
        AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.kind(),
        }),
    )
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let api_routes = Router::new()
        .route("/analyze", post(feedback::analyze_feedback))
        .route("/analyze/", post(feedback::analyze_feedback))
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/stream", get(tickets::stream_tickets));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health::get_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
