use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskflow_core::types::{StepId, StepStatus, StepType, TaskId, TaskStatus, TaskType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("task cannot move from {from} to {to}")]
    Task { from: TaskStatus, to: TaskStatus },

    #[error("step cannot move from {from} to {to}")]
    Step { from: StepStatus, to: StepStatus },

    #[error("no step at index {0}")]
    MissingStep(usize),
}

/// One end-to-end handling of a single chat request.
///
/// Wire: `{ "id": "...", "type": "chat", "status": "running", "userMessage": "hi",
///          "steps": [...], "createdAt": "...", "updatedAt": "..." }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub user_message: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(task_type: TaskType, user_message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            task_type,
            status: TaskStatus::Pending,
            user_message: user_message.into(),
            steps: Vec::new(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Running)
    }

    /// Terminal success. `result` is only ever set here.
    pub fn complete(&mut self, result: String) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(result);
        Ok(())
    }

    /// Terminal failure. `error` is only ever set here.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Append a step; returns its index. Insertion order is execution order.
    pub fn push_step(&mut self, step: Step) -> usize {
        self.steps.push(step);
        self.touch();
        self.steps.len() - 1
    }

    /// Mutate the step at `index`, refreshing `updated_at`.
    pub fn update_step<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut Step) -> Result<R, TransitionError>,
    ) -> Result<R, TransitionError> {
        let step = self
            .steps
            .get_mut(index)
            .ok_or(TransitionError::MissingStep(index))?;
        let out = f(step)?;
        self.touch();
        Ok(out)
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError::Task {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One pipeline stage within a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: StepId,
    pub task_id: TaskId,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub status: StepStatus,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    pub fn new(
        task_id: TaskId,
        step_type: StepType,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: StepId::new(),
            task_id,
            step_type,
            status: StepStatus::Pending,
            name: name.into(),
            description: description.into(),
            input: Value::Null,
            output: Value::Null,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self, input: Value) -> Result<(), TransitionError> {
        self.expect_status(StepStatus::Pending, StepStatus::Running)?;
        self.status = StepStatus::Running;
        self.input = input;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `running → completed`; mutually exclusive with [`Step::fail`].
    pub fn complete(&mut self, output: Value) -> Result<(), TransitionError> {
        self.expect_status(StepStatus::Running, StepStatus::Completed)?;
        self.status = StepStatus::Completed;
        self.output = output;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `running → failed`. Keeps whatever output was recorded and adds `error`.
    pub fn fail(&mut self, error: &str) -> Result<(), TransitionError> {
        self.expect_status(StepStatus::Running, StepStatus::Failed)?;
        self.status = StepStatus::Failed;
        match &mut self.output {
            Value::Object(map) => {
                map.insert("error".to_string(), Value::String(error.to_string()));
            }
            other => *other = serde_json::json!({ "error": error }),
        }
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn expect_status(&self, from: StepStatus, to: StepStatus) -> Result<(), TransitionError> {
        if self.status != from {
            return Err(TransitionError::Step {
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}
