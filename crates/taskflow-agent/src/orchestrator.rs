//! Task orchestrator: drives one task through plan → skill → respond and
//! turns every state change into a [`TaskEvent`].
//!
//! The event sequence always ends with exactly one `complete` or `error`
//! event. Nothing runs until the returned stream is polled, and dropping the
//! stream tears down the skill and its upstream connection.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use taskflow_core::config::AgentConfig;
use taskflow_core::error::TaskflowError;
use taskflow_core::types::StepType;
use taskflow_protocol::events::{StepEventKind, TaskEvent, TaskEventKind};
use taskflow_protocol::request::ChatRequestBody;
use taskflow_protocol::task::{Step, Task, TransitionError};
use tracing::{debug, info, warn};

use crate::skills::{select_kind, SkillInput, SkillKind, SkillSet};
use crate::stream::SkillChunk;

pub type TaskEventStream = Pin<Box<dyn Stream<Item = TaskEvent> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum TaskExecutionError {
    #[error("{0}")]
    SkillFailed(String),

    #[error("no output from skill for {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("no {0} provider is configured")]
    MissingSkill(SkillKind),

    #[error("skill stream ended without completing")]
    Truncated,
}

impl From<TaskExecutionError> for TaskflowError {
    fn from(e: TaskExecutionError) -> Self {
        match e {
            TaskExecutionError::MissingSkill(_) => TaskflowError::Config(e.to_string()),
            TaskExecutionError::Timeout(d) => TaskflowError::Timeout {
                ms: d.as_millis() as u64,
            },
            other => TaskflowError::Provider(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub default_temperature: f32,
    /// Longest wait for the next skill chunk.
    pub step_timeout: Option<Duration>,
    pub max_file_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for OrchestratorConfig {
    fn from(agent: &AgentConfig) -> Self {
        Self {
            default_temperature: agent.temperature,
            step_timeout: agent
                .step_timeout_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            max_file_chars: agent.max_file_chars,
        }
    }
}

/// Cheap to clone; one instance serves every request.
#[derive(Clone)]
pub struct TaskOrchestrator {
    skills: Arc<SkillSet>,
    config: OrchestratorConfig,
}

impl TaskOrchestrator {
    pub fn new(skills: SkillSet, config: OrchestratorConfig) -> Self {
        Self {
            skills: Arc::new(skills),
            config,
        }
    }

    pub fn skills(&self) -> &SkillSet {
        &self.skills
    }

    /// New pending task for a validated request.
    pub fn create_task(&self, request: &ChatRequestBody) -> Task {
        Task::new(request.task_type(), request.last_user_message())
    }

    /// Fail fast when the skill this request needs has no credentials.
    pub fn check_ready(&self, request: &ChatRequestBody) -> Result<(), TaskflowError> {
        let kind = select_kind(&request.images);
        if self.skills.has(kind) {
            Ok(())
        } else {
            Err(TaskExecutionError::MissingSkill(kind).into())
        }
    }

    pub fn execute_task(&self, task: Task, request: ChatRequestBody) -> TaskEventStream {
        let skills = Arc::clone(&self.skills);
        let config = self.config.clone();

        Box::pin(async_stream::stream! {
            let mut run = TaskRun { task };
            run.start();
            info!(task_id = %run.task.id, task_type = %run.task.task_type, "task started");
            yield TaskEvent::task(&run.task, TaskEventKind::Started);

            // plan
            let kind = select_kind(&request.images);
            let plan = run.begin(
                StepType::Plan,
                "plan",
                "Analyze the request",
                json!({
                    "messages": request.messages.len(),
                    "images": request.images.len(),
                    "files": request.files.len(),
                }),
            );
            yield run.event(plan, StepEventKind::Start);
            run.finish(
                plan,
                json!({
                    "needsMultimodal": kind == SkillKind::Vision,
                    "needsTools": request.enable_tools,
                    "skill": kind,
                }),
            );
            yield run.event(plan, StepEventKind::Complete);

            let skill = match skills.get(kind) {
                Some(skill) => Arc::clone(skill),
                None => {
                    let err = TaskExecutionError::MissingSkill(kind);
                    warn!(task_id = %run.task.id, error = %err, "task failed");
                    run.fail(&err.to_string());
                    yield TaskEvent::error(err.to_string(), Some(&run.task));
                    return;
                }
            };

            // skill
            let input = SkillInput::from_request(
                &request,
                config.default_temperature,
                config.max_file_chars,
            );
            let skill_step = run.begin(
                StepType::Skill,
                skill.name(),
                format!("Generate a response with {}", skill.model()),
                json!({
                    "provider": skill.provider(),
                    "model": skill.model(),
                    "temperature": input.temperature,
                    "messages": input.messages.len(),
                    "images": input.images.len(),
                }),
            );
            yield run.event(skill_step, StepEventKind::Start);

            let mut chunks = skill.execute(input);
            let mut buffer = String::new();
            let mut model = skill.model().to_string();
            let mut tool_step: Option<usize> = None;

            let failure = loop {
                let next = match config.step_timeout {
                    Some(limit) => match tokio::time::timeout(limit, chunks.next()).await {
                        Ok(next) => next,
                        Err(_) => break Some(TaskExecutionError::Timeout(limit)),
                    },
                    None => chunks.next().await,
                };

                match next {
                    Some(SkillChunk::Content { content }) => {
                        buffer.push_str(&content);
                        yield TaskEvent::content(content);
                    }
                    Some(SkillChunk::ToolCall { call }) => {
                        debug!(task_id = %run.task.id, tool = %call.tool, "tool call");
                        let idx = run.begin(
                            StepType::Mcp,
                            call.tool.clone(),
                            format!("Call tool {}", call.tool),
                            json!({ "tool": call.tool, "arguments": call.arguments }),
                        );
                        tool_step = Some(idx);
                        yield run.event(idx, StepEventKind::Start);
                    }
                    Some(SkillChunk::ToolResult { tool, result }) => match tool_step.take() {
                        Some(idx) => {
                            run.finish(
                                idx,
                                json!({ "content": result.content, "isError": result.is_error }),
                            );
                            yield run.event(idx, StepEventKind::Complete);
                        }
                        None => warn!(task_id = %run.task.id, tool = %tool, "tool result without a pending call"),
                    },
                    Some(SkillChunk::Error { error }) => break Some(TaskExecutionError::SkillFailed(error)),
                    Some(SkillChunk::Complete { model: reported }) => {
                        model = reported;
                        break None;
                    }
                    None => break Some(TaskExecutionError::Truncated),
                }
            };
            drop(chunks);

            if let Some(err) = failure {
                let message = err.to_string();
                warn!(task_id = %run.task.id, error = %message, "skill step failed");
                if let Some(idx) = tool_step.take() {
                    run.fail_step(idx, &message);
                    yield run.event(idx, StepEventKind::Error);
                }
                run.fail_step(skill_step, &message);
                yield run.event(skill_step, StepEventKind::Error);
                run.fail(&message);
                yield TaskEvent::error(message, Some(&run.task));
                return;
            }

            run.finish(
                skill_step,
                json!({
                    "skill": skill.name(),
                    "provider": skill.provider(),
                    "model": model,
                    "content": buffer,
                }),
            );
            yield run.event(skill_step, StepEventKind::Complete);

            // respond
            let respond = run.begin(
                StepType::Respond,
                "respond",
                "Assemble the final response",
                json!({ "length": buffer.chars().count() }),
            );
            yield run.event(respond, StepEventKind::Start);
            run.finish(respond, json!({ "content": buffer }));
            run.complete(buffer);
            yield run.event(respond, StepEventKind::Complete);

            info!(
                task_id = %run.task.id,
                steps = run.task.steps.len(),
                "task completed"
            );
            yield TaskEvent::complete(&run.task);
        })
    }
}

/// The task being executed. Transitions the orchestrator drives are always
/// legal; a rejected one is a bug and is only logged.
struct TaskRun {
    task: Task,
}

impl TaskRun {
    fn start(&mut self) {
        let result = self.task.start();
        self.check(result);
    }

    fn complete(&mut self, result: String) {
        let result = self.task.complete(result);
        self.check(result);
    }

    fn fail(&mut self, error: &str) {
        let result = self.task.fail(error);
        self.check(result);
    }

    /// Append a step and move it straight to `running`.
    fn begin(
        &mut self,
        step_type: StepType,
        name: impl Into<String>,
        description: impl Into<String>,
        input: Value,
    ) -> usize {
        let step = Step::new(self.task.id.clone(), step_type, name, description);
        let idx = self.task.push_step(step);
        let result = self.task.update_step(idx, |s| s.start(input));
        self.check(result);
        idx
    }

    fn finish(&mut self, idx: usize, output: Value) {
        let result = self.task.update_step(idx, |s| s.complete(output));
        self.check(result);
    }

    fn fail_step(&mut self, idx: usize, error: &str) {
        let result = self.task.update_step(idx, |s| s.fail(error));
        self.check(result);
    }

    fn event(&self, idx: usize, kind: StepEventKind) -> TaskEvent {
        TaskEvent::step(&self.task.steps[idx], kind)
    }

    fn check(&self, result: Result<(), TransitionError>) {
        if let Err(e) = result {
            warn!(task_id = %self.task.id, error = %e, "rejected state transition");
        }
    }
}
