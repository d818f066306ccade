//! HTTP request and response bodies for `POST /chat`.

use base64::Engine;
use serde::{Deserialize, Serialize};
use taskflow_core::error::TaskflowError;
use taskflow_core::types::TaskType;

use crate::events::TaskEvent;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub id: String,
    /// Raw base64 payload, without a `data:` URL prefix.
    pub base64: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ImageAttachment {
    /// `data:<mime>;base64,<payload>` form accepted by vision endpoints.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub id: String,
    pub name: String,
    pub content: String,
    pub mime_type: String,
    #[serde(default)]
    pub size: u64,
}

/// Request body.
///
/// Wire: `{ "messages": [{"role": "user", "content": "hi"}], "images": [], "stream": true }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub enable_tools: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatRequestBody {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            images: Vec::new(),
            files: Vec::new(),
            temperature: None,
            enable_tools: false,
            stream: None,
        }
    }

    /// Streaming is the default; only an explicit `false` opts out.
    pub fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(true)
    }

    pub fn task_type(&self) -> TaskType {
        TaskType::determine(
            !self.images.is_empty(),
            !self.files.is_empty(),
            self.enable_tools,
        )
    }

    /// Content of the last user-role message, or empty when there is none.
    pub fn last_user_message(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// Reject bodies that must never reach the orchestrator.
    pub fn validate(&self) -> Result<(), TaskflowError> {
        if self.messages.is_empty() {
            return Err(TaskflowError::Validation(
                "messages must not be empty".to_string(),
            ));
        }

        if let Some(t) = self.temperature {
            if !t.is_finite() || !(0.0..=2.0).contains(&t) {
                return Err(TaskflowError::Validation(format!(
                    "temperature must be between 0 and 2, got {t}"
                )));
            }
        }

        for image in &self.images {
            if !image.mime_type.starts_with("image/") {
                return Err(TaskflowError::Validation(format!(
                    "image '{}' has unsupported mime type '{}'",
                    image.id, image.mime_type
                )));
            }
            if image.base64.is_empty()
                || base64::engine::general_purpose::STANDARD
                    .decode(image.base64.as_bytes())
                    .is_err()
            {
                return Err(TaskflowError::Validation(format!(
                    "image '{}' is not valid base64",
                    image.id
                )));
            }
        }

        Ok(())
    }
}

/// Non-streaming response: every event the task produced, plus its final state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponseBody {
    pub task: Task,
    pub chunks: Vec<TaskEvent>,
}

/// `{ "error": { "message": "...", "code": "INVALID_REQUEST" } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorShape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub message: String,
    pub code: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorShape {
                message: message.into(),
                code: code.into(),
            },
        }
    }
}

impl From<&TaskflowError> for ErrorBody {
    fn from(err: &TaskflowError) -> Self {
        ErrorBody::new(err.code(), err.to_string())
    }
}
