use std::sync::Arc;

use serde_json::{json, Value};
use taskflow_protocol::request::{ChatMessage, ImageAttachment, Role};

use crate::provider::{CompletionRequest, LlmProvider};

use super::{relay, wire_message, Skill, SkillInput, SkillStream};

/// Multimodal completion. Images ride on the last user message only.
pub struct VisionSkill {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl VisionSkill {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

impl Skill for VisionSkill {
    fn name(&self) -> &str {
        "vision"
    }

    fn provider(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn execute(&self, input: SkillInput) -> SkillStream {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: build_messages(&input.messages, &input.images),
            temperature: input.temperature,
            stream: true,
        };
        relay(Arc::clone(&self.provider), request, None)
    }
}

/// Image parts first, then one text part, on the last user turn. Earlier
/// turns stay plain text.
pub fn build_messages(messages: &[ChatMessage], images: &[ImageAttachment]) -> Vec<Value> {
    let last_user = messages.iter().rposition(|m| m.role == Role::User);
    let mut out: Vec<Value> = messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            if Some(i) == last_user {
                json!({ "role": m.role, "content": content_parts(&m.content, images) })
            } else {
                wire_message(m)
            }
        })
        .collect();

    if last_user.is_none() {
        out.push(json!({ "role": Role::User, "content": content_parts("", images) }));
    }
    out
}

fn content_parts(text: &str, images: &[ImageAttachment]) -> Vec<Value> {
    images
        .iter()
        .map(|img| json!({ "type": "image_url", "image_url": { "url": img.data_url() } }))
        .chain(std::iter::once(json!({ "type": "text", "text": text })))
        .collect()
}
