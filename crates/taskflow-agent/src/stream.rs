use serde::{Deserialize, Serialize};

use crate::tools::{ToolCallRequest, ToolResult};

/// Events emitted by a provider while streaming a completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text content from the model.
    TextDelta { text: String },

    /// Stream completed successfully (`[DONE]` seen or body ended).
    Done { model: String, stop_reason: String },
}

/// Uniform output of every skill, whatever provider sits behind it.
///
/// Errors are values here: a skill never fails its stream with a panic or
/// an `Err`, it yields one `Error` chunk and stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkillChunk {
    Content { content: String },
    ToolCall { call: ToolCallRequest },
    ToolResult { tool: String, result: ToolResult },
    Error { error: String },
    Complete { model: String },
}

impl SkillChunk {
    pub fn content(content: impl Into<String>) -> Self {
        SkillChunk::Content {
            content: content.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        SkillChunk::Error {
            error: error.into(),
        }
    }
}
