use serde::{Deserialize, Serialize};

use crate::task::{Step, Task};

/// What happened to the task carried by a `task` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskEventKind {
    Started,
    Updated,
    Completed,
    Failed,
}

/// What happened to the step carried by a `step` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepEventKind {
    Start,
    Progress,
    Complete,
    Error,
}

/// The only channel between the orchestrator and a client.
///
/// Wire: `{ "type": "content", "data": { "content": "Hel" } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum TaskEvent {
    Task {
        task: Task,
        event: TaskEventKind,
    },
    Step {
        step: Step,
        event: StepEventKind,
    },
    Content {
        content: String,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task: Option<Task>,
    },
    Complete {
        task: Task,
    },
}

impl TaskEvent {
    pub fn task(task: &Task, event: TaskEventKind) -> Self {
        TaskEvent::Task {
            task: task.clone(),
            event,
        }
    }

    pub fn step(step: &Step, event: StepEventKind) -> Self {
        TaskEvent::Step {
            step: step.clone(),
            event,
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        TaskEvent::Content {
            content: content.into(),
        }
    }

    pub fn error(error: impl Into<String>, task: Option<&Task>) -> Self {
        TaskEvent::Error {
            error: error.into(),
            task: task.cloned(),
        }
    }

    pub fn complete(task: &Task) -> Self {
        TaskEvent::Complete { task: task.clone() }
    }

    /// Wire discriminator (`"task"`, `"step"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            TaskEvent::Task { .. } => "task",
            TaskEvent::Step { .. } => "step",
            TaskEvent::Content { .. } => "content",
            TaskEvent::Error { .. } => "error",
            TaskEvent::Complete { .. } => "complete",
        }
    }

    /// `complete` and `error` end a task's event sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::Complete { .. } | TaskEvent::Error { .. })
    }

    /// The most recent task snapshot carried by this event, if any.
    pub fn task_snapshot(&self) -> Option<&Task> {
        match self {
            TaskEvent::Task { task, .. } | TaskEvent::Complete { task } => Some(task),
            TaskEvent::Error { task, .. } => task.as_ref(),
            _ => None,
        }
    }
}
