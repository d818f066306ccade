//! HTTP client for the gateway's chat and health endpoints.

use futures_util::StreamExt;
use serde::Deserialize;
use taskflow_protocol::request::{ChatRequestBody, ChatResponseBody, ErrorBody};
use taskflow_protocol::sse::{SseFrame, SseLineBuffer};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::consumer::{dispatch, Dispatch, StreamHandler};
use crate::error::{ClientError, Result};

/// How a consumed task stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A `complete` event arrived.
    Completed,
    /// An `error` event arrived, or the stream ended without a terminal event.
    Failed,
    /// The caller cancelled. No callback fires after the cancellation point.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub features: Features,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Features {
    pub text: bool,
    pub vision: bool,
    pub tools: bool,
}

/// Gateway client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    /// Client for a gateway at `base_url`, e.g. `http://127.0.0.1:8787`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET /health
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self.http.get(self.url("/health")).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST /chat with `stream: false`; waits for the whole task.
    pub async fn send(&self, body: &ChatRequestBody) -> Result<ChatResponseBody> {
        let mut body = body.clone();
        body.stream = Some(false);
        let response = self.http.post(self.url("/chat")).json(&body).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST /chat and feed every event to `handler` as it arrives.
    ///
    /// Rejections before the stream opens call `on_error` and return
    /// [`ClientError::Api`]. Once `cancel` fires the stream is dropped and
    /// `Cancelled` is returned without invoking any further callback.
    pub async fn stream_chat<H: StreamHandler + ?Sized>(
        &self,
        body: &ChatRequestBody,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome> {
        let mut body = body.clone();
        body.stream = Some(true);

        let request = self.http.post(self.url("/chat")).json(&body).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            response = request => response,
        };

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                handler.on_error(&e.to_string(), None);
                return Err(e.into());
            }
        };
        let response = match check_status(response).await {
            Ok(r) => r,
            Err(e) => {
                let message = match &e {
                    ClientError::Api { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                handler.on_error(&message, None);
                return Err(e);
            }
        };

        let mut bytes = response.bytes_stream();
        let mut lines = SseLineBuffer::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("task stream cancelled");
                    return Ok(StreamOutcome::Cancelled);
                }
                next = bytes.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    let message = format!("stream interrupted: {e}");
                    handler.on_error(&message, None);
                    return Err(ClientError::Stream(message));
                }
                None => break,
            };

            for frame in lines.feed(&chunk) {
                if cancel.is_cancelled() {
                    return Ok(StreamOutcome::Cancelled);
                }
                if let Some(outcome) = handle_frame(handler, frame) {
                    return Ok(outcome);
                }
            }
        }

        if let Some(frame) = lines.finish() {
            if let Some(outcome) = handle_frame(handler, frame) {
                return Ok(outcome);
            }
        }

        handler.on_error("stream ended unexpectedly", None);
        Ok(StreamOutcome::Failed)
    }
}

/// `Some` when the frame ends the stream.
fn handle_frame<H: StreamHandler + ?Sized>(handler: &mut H, frame: SseFrame) -> Option<StreamOutcome> {
    match frame {
        SseFrame::Data(data) => match dispatch(handler, &data) {
            Dispatch::Continue => None,
            Dispatch::Completed => Some(StreamOutcome::Completed),
            Dispatch::Failed => Some(StreamOutcome::Failed),
        },
        SseFrame::Done => {
            handler.on_error("stream ended unexpectedly", None);
            Some(StreamOutcome::Failed)
        }
    }
}

/// Map a non-2xx response to [`ClientError::Api`] using the `{error: {message, code}}` body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error.code, body.error.message),
        Err(_) => (format!("HTTP_{}", status.as_u16()), text),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}
