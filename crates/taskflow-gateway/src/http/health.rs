use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use taskflow_agent::skills::SkillKind;

use crate::app::AppState;

/// GET /health: liveness probe. Reports which skills have credentials.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let skills = state.orchestrator.skills();
    let text = skills.has(SkillKind::Text);
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "features": {
            "text": text,
            "vision": skills.has(SkillKind::Vision),
            "tools": text && state.config.tools.enabled,
        },
    }))
}
