//! Skills: one provider call each, translated into a uniform chunk stream.
//!
//! The orchestrator never talks to providers directly. It picks a skill
//! with [`select_kind`], hands it a [`SkillInput`] and consumes the
//! resulting [`SkillStream`].

pub mod input;
pub mod text;
pub mod vision;

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use taskflow_protocol::request::{ChatMessage, ImageAttachment};

use crate::provider::{CompletionRequest, LlmProvider};
use crate::stream::{SkillChunk, StreamEvent};
use crate::tools::marker::MarkerScanner;
use crate::tools::{ToolRegistry, ToolResult};

pub use input::SkillInput;

/// Lazy chunk stream. Nothing is sent upstream until the first poll, and
/// dropping the stream drops the upstream connection.
pub type SkillStream = Pin<Box<dyn Stream<Item = SkillChunk> + Send>>;

pub trait Skill: Send + Sync {
    /// Skill name as reported in step output (`"text"`, `"vision"`).
    fn name(&self) -> &str;
    fn provider(&self) -> &str;
    fn model(&self) -> &str;

    /// Start the skill. The returned stream always ends with exactly one
    /// `Complete` or `Error` chunk.
    fn execute(&self, input: SkillInput) -> SkillStream;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillKind {
    Text,
    Vision,
}

impl SkillKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SkillKind::Text => "text",
            SkillKind::Vision => "vision",
        }
    }
}

impl std::fmt::Display for SkillKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Images route to the vision skill; everything else, files included, is text.
pub fn select_kind(images: &[ImageAttachment]) -> SkillKind {
    if images.is_empty() {
        SkillKind::Text
    } else {
        SkillKind::Vision
    }
}

/// The skills available to this process, fixed at startup.
#[derive(Clone, Default)]
pub struct SkillSet {
    text: Option<Arc<dyn Skill>>,
    vision: Option<Arc<dyn Skill>>,
}

impl SkillSet {
    pub fn new(text: Option<Arc<dyn Skill>>, vision: Option<Arc<dyn Skill>>) -> Self {
        Self { text, vision }
    }

    pub fn get(&self, kind: SkillKind) -> Option<&Arc<dyn Skill>> {
        match kind {
            SkillKind::Text => self.text.as_ref(),
            SkillKind::Vision => self.vision.as_ref(),
        }
    }

    pub fn has(&self, kind: SkillKind) -> bool {
        self.get(kind).is_some()
    }
}

/// Provider wire shape for a plain-text message.
pub(crate) fn wire_message(message: &ChatMessage) -> serde_json::Value {
    serde_json::json!({ "role": message.role, "content": message.content })
}

/// Open the provider stream and translate it into skill chunks.
///
/// With a tool registry, complete `<tool>` markers in the accumulated text
/// trigger a call whose output is injected as an extra content chunk.
pub(crate) fn relay(
    provider: Arc<dyn LlmProvider>,
    request: CompletionRequest,
    tools: Option<Arc<ToolRegistry>>,
) -> SkillStream {
    Box::pin(async_stream::stream! {
        let mut events = match provider.send_stream(&request).await {
            Ok(events) => events,
            Err(e) => {
                yield SkillChunk::error(e.to_string());
                return;
            }
        };
        let mut scanner = MarkerScanner::new();

        while let Some(event) = events.next().await {
            match event {
                Ok(StreamEvent::TextDelta { text }) => {
                    let calls = match tools {
                        Some(_) => scanner.feed(&text),
                        None => Vec::new(),
                    };
                    yield SkillChunk::content(text);

                    if let Some(registry) = &tools {
                        for call in calls {
                            yield SkillChunk::ToolCall { call: call.clone() };
                            let result = registry.call(&call).await;
                            let injected = tool_output_text(&call.tool, &result);
                            yield SkillChunk::ToolResult { tool: call.tool, result };
                            yield SkillChunk::content(injected);
                        }
                    }
                }
                Ok(StreamEvent::Done { model, .. }) => {
                    yield SkillChunk::Complete { model };
                    return;
                }
                Err(e) => {
                    yield SkillChunk::error(e.to_string());
                    return;
                }
            }
        }

        yield SkillChunk::Complete { model: request.model.clone() };
    })
}

fn tool_output_text(tool: &str, result: &ToolResult) -> String {
    if result.is_error {
        format!("\n[{tool} failed: {}]\n", result.content)
    } else {
        format!("\n[{tool} result: {}]\n", result.content)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageAttachment {
        ImageAttachment {
            id: "img-1".into(),
            base64: "aGVsbG8=".into(),
            mime_type: "image/png".into(),
            description: None,
        }
    }

    #[test]
    fn images_select_vision() {
        assert_eq!(select_kind(&[]), SkillKind::Text);
        assert_eq!(select_kind(&[image()]), SkillKind::Vision);
    }

    #[test]
    fn empty_skill_set_has_nothing() {
        let set = SkillSet::default();
        assert!(!set.has(SkillKind::Text));
        assert!(set.get(SkillKind::Vision).is_none());
    }

    #[test]
    fn tool_output_marks_failures() {
        assert_eq!(
            tool_output_text("calculate", &ToolResult::success("4")),
            "\n[calculate result: 4]\n"
        );
        assert!(tool_output_text("x", &ToolResult::error("nope")).contains("failed"));
    }
}
