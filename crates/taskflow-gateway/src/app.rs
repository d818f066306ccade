use std::sync::Arc;

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use taskflow_agent::orchestrator::TaskOrchestrator;
use taskflow_core::config::TaskflowConfig;
use tower_http::cors::{Any, CorsLayer};

/// Shared state handed to every handler as `Arc<AppState>`.
///
/// Holds nothing per-request: every task owns its own state inside the
/// stream returned by the orchestrator.
pub struct AppState {
    pub config: TaskflowConfig,
    pub orchestrator: TaskOrchestrator,
}

impl AppState {
    pub fn new(config: TaskflowConfig, orchestrator: TaskOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let chat = post(crate::http::chat::chat_handler).options(crate::http::chat::preflight);

    Router::new()
        .route("/", chat.clone())
        .route("/chat", chat)
        .route("/health", get(crate::http::health::health_handler))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(middleware::from_fn(preflight_no_content))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS preflights answered by the CORS layer come back as 200; clients
/// expect 204 with an empty body.
async fn preflight_no_content(req: Request, next: Next) -> Response {
    let is_options = req.method() == Method::OPTIONS;
    let mut response = next.run(req).await;
    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
