pub mod chat;
pub mod health;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use taskflow_core::error::TaskflowError;
use taskflow_protocol::request::ErrorBody;

/// Request rejected before a task existed. Rendered as `{error: {message, code}}`.
#[derive(Debug)]
pub struct ApiError(pub TaskflowError);

impl From<TaskflowError> for ApiError {
    fn from(e: TaskflowError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TaskflowError::Config(_) | TaskflowError::Validation(_) => StatusCode::BAD_REQUEST,
            TaskflowError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            TaskflowError::Provider(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}
