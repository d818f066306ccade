//! Event dispatch from decoded SSE payloads to handler callbacks.

use serde::Deserialize;
use taskflow_protocol::events::{StepEventKind, TaskEvent, TaskEventKind};
use taskflow_protocol::sse::decode_event;
use taskflow_protocol::task::{Step, Task};
use tracing::{debug, warn};

/// Callbacks fired while a task stream is consumed. All default to no-ops.
pub trait StreamHandler {
    fn on_task_start(&mut self, _task: &Task) {}
    fn on_task_update(&mut self, _task: &Task) {}
    fn on_step_start(&mut self, _step: &Step) {}
    /// Fired for step `progress`, `complete` and `error` events.
    fn on_step_complete(&mut self, _step: &Step) {}
    fn on_content(&mut self, _content: &str) {}
    /// Genuine failures only. Never fired for cancellation.
    fn on_error(&mut self, _error: &str, _task: Option<&Task>) {}
    fn on_complete(&mut self, _task: &Task) {}
}

/// What one dispatched payload means for the stream as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Completed,
    Failed,
}

const KNOWN_TYPES: [&str; 5] = ["task", "step", "content", "error", "complete"];

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Decode one `data:` payload and invoke the matching callback.
///
/// Unknown `type` values are ignored. Payloads that fail to decode are
/// logged and skipped.
pub fn dispatch<H: StreamHandler + ?Sized>(handler: &mut H, data: &str) -> Dispatch {
    let envelope: Envelope = match serde_json::from_str(data) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "skipping malformed event frame");
            return Dispatch::Continue;
        }
    };
    if !KNOWN_TYPES.contains(&envelope.kind.as_str()) {
        debug!(kind = %envelope.kind, "ignoring unknown event type");
        return Dispatch::Continue;
    }

    let event = match decode_event(data) {
        Ok(event) => event,
        Err(e) => {
            warn!(kind = %envelope.kind, error = %e, "skipping undecodable event");
            return Dispatch::Continue;
        }
    };

    match event {
        TaskEvent::Task {
            task,
            event: TaskEventKind::Started,
        } => handler.on_task_start(&task),
        TaskEvent::Task { task, .. } => handler.on_task_update(&task),
        TaskEvent::Step {
            step,
            event: StepEventKind::Start,
        } => handler.on_step_start(&step),
        TaskEvent::Step { step, .. } => handler.on_step_complete(&step),
        TaskEvent::Content { content } => handler.on_content(&content),
        TaskEvent::Error { error, task } => {
            handler.on_error(&error, task.as_ref());
            return Dispatch::Failed;
        }
        TaskEvent::Complete { task } => {
            handler.on_complete(&task);
            return Dispatch::Completed;
        }
    }
    Dispatch::Continue
}
