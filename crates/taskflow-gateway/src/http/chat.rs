//! Task chat endpoint, POST / and POST /chat
//!
//! Request:  `{"messages": [{"role": "user", "content": "hi"}], "stream": true}`
//! Stream:   `data: {"type": "task", "data": {...}}\n\n` ... `data: [DONE]\n\n`
//! Buffered: `{"task": {...}, "chunks": [...]}` when `"stream": false`
//! Error:    `{"error": {"message": "...", "code": "INVALID_REQUEST"}}` (400, no task created)

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::{Stream, StreamExt};
use taskflow_agent::orchestrator::TaskEventStream;
use taskflow_core::error::TaskflowError;
use taskflow_core::types::TaskId;
use taskflow_protocol::events::TaskEvent;
use taskflow_protocol::request::{ChatRequestBody, ChatResponseBody};
use taskflow_protocol::sse::DONE_MARKER;
use taskflow_protocol::task::Task;
use tracing::{error, info, warn};

use super::ApiError;
use crate::app::AppState;

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequestBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected chat body");
        TaskflowError::Validation(rejection.body_text())
    })?;

    if let Err(e) = request
        .validate()
        .and_then(|()| state.orchestrator.check_ready(&request))
    {
        warn!(code = e.code(), error = %e, "chat request rejected");
        return Err(e.into());
    }

    let task = state.orchestrator.create_task(&request);
    let streaming = request.wants_stream();
    info!(task_id = %task.id, task_type = %task.task_type, streaming, "chat request accepted");

    let task_id = task.id.clone();
    let events = state.orchestrator.execute_task(task.clone(), request);

    if streaming {
        Ok(Sse::new(sse_events(task_id, events)).into_response())
    } else {
        Ok(Json(drain(task, events).await).into_response())
    }
}

/// OPTIONS / and /chat, answered without touching the orchestrator.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Write each event through as one `data:` frame, then `[DONE]`.
///
/// Dropping the returned stream (client went away) drops the orchestrator
/// stream with it, which stops the upstream read.
fn sse_events(
    task_id: TaskId,
    mut events: TaskEventStream,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut guard = DisconnectGuard { task_id, finished: false };

        while let Some(event) = events.next().await {
            let terminal = event.is_terminal();
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok(Event::default().data(json)),
                Err(e) => {
                    error!(task_id = %guard.task_id, error = %e, "failed to encode task event");
                    let fallback = TaskEvent::error(format!("failed to encode event: {e}"), None);
                    if let Ok(json) = serde_json::to_string(&fallback) {
                        yield Ok(Event::default().data(json));
                    }
                    break;
                }
            }
            if terminal {
                break;
            }
        }

        guard.finished = true;
        yield Ok(Event::default().data(DONE_MARKER));
    }
}

/// Non-streaming mode: collect every event, report the final task snapshot.
async fn drain(task: Task, events: TaskEventStream) -> ChatResponseBody {
    let chunks: Vec<TaskEvent> = events.collect().await;
    let task = chunks
        .iter()
        .rev()
        .find_map(TaskEvent::task_snapshot)
        .cloned()
        .unwrap_or(task);
    ChatResponseBody { task, chunks }
}

struct DisconnectGuard {
    task_id: TaskId,
    finished: bool,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.finished {
            info!(task_id = %self.task_id, "client disconnected, task stream torn down");
        }
    }
}
