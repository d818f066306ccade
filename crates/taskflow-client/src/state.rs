use std::collections::HashMap;

use taskflow_protocol::task::{Step, Task};

use crate::consumer::StreamHandler;

/// UI-side view of one task, rebuilt purely from its event stream.
///
/// Streamed text accumulates under the index of the message it will become,
/// so a chat view can render a placeholder before the task completes.
#[derive(Debug, Clone, Default)]
pub struct TaskStreamState {
    pub current_task: Option<Task>,
    pub current_steps: Vec<Step>,
    pub pending: HashMap<usize, String>,
    pub error: Option<String>,
    pending_index: usize,
}

impl TaskStreamState {
    pub fn new(pending_index: usize) -> Self {
        Self {
            pending_index,
            ..Self::default()
        }
    }

    /// Text streamed so far for the pending message.
    pub fn content(&self) -> &str {
        self.pending
            .get(&self.pending_index)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_completed(&self) -> bool {
        self.current_task
            .as_ref()
            .is_some_and(|t| t.result.is_some())
    }

    fn upsert_step(&mut self, step: &Step) {
        match self.current_steps.iter_mut().find(|s| s.id == step.id) {
            Some(existing) => *existing = step.clone(),
            None => self.current_steps.push(step.clone()),
        }
    }
}

impl StreamHandler for TaskStreamState {
    fn on_task_start(&mut self, task: &Task) {
        self.current_task = Some(task.clone());
        self.current_steps = task.steps.clone();
        self.error = None;
        self.pending.entry(self.pending_index).or_default();
    }

    fn on_task_update(&mut self, task: &Task) {
        self.current_task = Some(task.clone());
    }

    fn on_step_start(&mut self, step: &Step) {
        self.upsert_step(step);
    }

    fn on_step_complete(&mut self, step: &Step) {
        self.upsert_step(step);
    }

    fn on_content(&mut self, content: &str) {
        self.pending
            .entry(self.pending_index)
            .or_default()
            .push_str(content);
    }

    fn on_error(&mut self, error: &str, task: Option<&Task>) {
        self.error = Some(error.to_string());
        if let Some(task) = task {
            self.current_task = Some(task.clone());
            self.current_steps = task.steps.clone();
        }
    }

    fn on_complete(&mut self, task: &Task) {
        self.current_task = Some(task.clone());
        self.current_steps = task.steps.clone();
    }
}
