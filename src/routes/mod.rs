use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::SessionController,
};

pub mod session;

/// Shared router state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionController>,
}

impl AppState {
    pub fn new(session: SessionController) -> Self {
        Self {
            session: Arc::new(session),
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/session",
            get(session::snapshot).delete(session::reset),
        )
        .route("/session/preferences", put(session::update_preferences))
        .route("/session/batch-size", put(session::update_batch_size))
        .route("/session/generate", post(session::generate))
        .route("/session/items/:item_id/play", post(session::play))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
