use std::sync::Arc;

use crate::provider::{CompletionRequest, LlmProvider};
use crate::tools::ToolRegistry;

use super::{relay, wire_message, Skill, SkillInput, SkillStream};

/// Plain chat completion, optionally with inline tool calls.
pub struct TextSkill {
    provider: Arc<dyn LlmProvider>,
    model: String,
    tools: Option<Arc<ToolRegistry>>,
}

impl TextSkill {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            tools: None,
        }
    }

    /// Tools are only offered to requests that set `enableTools`.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }
}

impl Skill for TextSkill {
    fn name(&self) -> &str {
        "text"
    }

    fn provider(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn execute(&self, input: SkillInput) -> SkillStream {
        let tools = self.tools.clone().filter(|_| input.enable_tools);

        let mut messages = Vec::with_capacity(input.messages.len() + 1);
        if let Some(registry) = &tools {
            messages.push(serde_json::json!({ "role": "system", "content": registry.prompt() }));
        }
        messages.extend(input.messages.iter().map(wire_message));

        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: input.temperature,
            stream: true,
        };
        relay(Arc::clone(&self.provider), request, tools)
    }
}
