use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::Serialize;

use crate::stream::StreamEvent;

/// Request to an OpenAI-compatible chat completions endpoint.
///
/// `messages` are already in provider wire shape so that multimodal skills
/// can attach content-part arrays.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<serde_json::Value>,
    pub temperature: f32,
    pub stream: bool,
}

/// Lazily-pulled provider events. The next upstream read only happens when
/// the consumer asks for the next item.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>>;

/// Common interface for upstream model providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and step output.
    fn name(&self) -> &str;

    /// Whether credentials are present. Unconfigured providers are never called.
    fn is_configured(&self) -> bool {
        true
    }

    /// Open a streaming completion.
    ///
    /// Errors returned here happened before any content was produced
    /// (connect failure, non-2xx status) and are safe to retry. Errors inside
    /// the returned stream happened mid-response.
    async fn send_stream(&self, req: &CompletionRequest) -> Result<EventStream, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Rate limits are surfaced immediately instead of being retried.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, ProviderError::RateLimited { .. })
    }
}
