use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use taskflow_core::config::ProviderConfig;
use taskflow_protocol::sse::{SseFrame, SseLineBuffer};
use tracing::{debug, warn};

use crate::provider::{CompletionRequest, EventStream, LlmProvider, ProviderError};
use crate::stream::StreamEvent;

/// Any OpenAI-compatible `/chat/completions` endpoint (OpenAI, DeepSeek,
/// Qwen, Groq, ...).
pub struct OpenAiProvider {
    client: reqwest::Client,
    name: String,
    api_key: Option<String>,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(name: impl Into<String>, api_key: Option<String>, endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: name.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint,
        }
    }

    pub fn from_config(name: impl Into<String>, config: &ProviderConfig) -> Self {
        Self::new(name, config.api_key.clone(), config.endpoint())
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send_stream(&self, req: &CompletionRequest) -> Result<EventStream, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::Unavailable(format!("no API key configured for {}", self.name))
        })?;

        debug!(provider = %self.name, model = %req.model, "sending streaming request");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000) // convert seconds to ms
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %text, "streaming API error");
            return Err(ProviderError::Api {
                status,
                message: extract_error_message(&text),
            });
        }

        Ok(Box::pin(parse_event_stream(
            resp.bytes_stream(),
            req.model.clone(),
        )))
    }
}

/// Turn a raw SSE byte stream into provider events.
///
/// Lines that fail to parse are skipped; only successfully parsed
/// `choices[0].delta.content` values become text. A `data: [DONE]` line or
/// the end of the body finishes the stream.
pub fn parse_event_stream<S, B, E>(
    bytes: S,
    model: String,
) -> impl Stream<Item = Result<StreamEvent, ProviderError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    async_stream::stream! {
        let mut line_buf = SseLineBuffer::new();
        let mut stop_reason = String::new();
        let mut bytes = Box::pin(bytes);

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(ProviderError::Stream(format!("stream interrupted: {e}")));
                    return;
                }
            };

            for frame in line_buf.feed(chunk.as_ref()) {
                match frame {
                    SseFrame::Done => {
                        yield Ok(StreamEvent::Done { model, stop_reason });
                        return;
                    }
                    SseFrame::Data(data) => match parse_data(&data) {
                        Parsed::Text { text, finish_reason } => {
                            if let Some(reason) = finish_reason {
                                stop_reason = reason;
                            }
                            if !text.is_empty() {
                                yield Ok(StreamEvent::TextDelta { text });
                            }
                        }
                        Parsed::Error(message) => {
                            yield Err(ProviderError::Stream(message));
                            return;
                        }
                        Parsed::Skip => {}
                    },
                }
            }
        }

        // body ended without [DONE]; flush a trailing unterminated line
        if let Some(SseFrame::Data(data)) = line_buf.finish() {
            match parse_data(&data) {
                Parsed::Text { text, .. } if !text.is_empty() => {
                    yield Ok(StreamEvent::TextDelta { text });
                }
                Parsed::Error(message) => {
                    yield Err(ProviderError::Stream(message));
                    return;
                }
                _ => {}
            }
        }

        yield Ok(StreamEvent::Done { model, stop_reason });
    }
}

enum Parsed {
    Text {
        text: String,
        finish_reason: Option<String>,
    },
    Error(String),
    Skip,
}

fn parse_data(data: &str) -> Parsed {
    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "skipping malformed stream line");
            return Parsed::Skip;
        }
    };

    if let Some(err) = chunk.error {
        return Parsed::Error(err.message.unwrap_or_else(|| "upstream error".to_string()));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Parsed::Skip;
    };
    Parsed::Text {
        text: choice.delta.and_then(|d| d.content).unwrap_or_default(),
        finish_reason: choice.finish_reason.filter(|r| !r.is_empty()),
    }
}

/// Pull `error.message` out of an OpenAI-style error body, falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error.message)
        .unwrap_or_else(|| body.to_string())
}

// OpenAI streaming chunk types (deserialization only)

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    async fn collect(chunks: &[&str]) -> Vec<Result<StreamEvent, ProviderError>> {
        let owned: Vec<Result<Vec<u8>, std::io::Error>> =
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        parse_event_stream(stream::iter(owned), "m".into())
            .collect()
            .await
    }

    fn texts(events: &[Result<StreamEvent, ProviderError>]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                Ok(StreamEvent::TextDelta { text }) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn extracts_delta_content_until_done() {
        let body = format!("{}{}data: [DONE]\n\n{}", delta("Hel"), delta("lo"), delta("ignored"));
        let events = collect(&[body.as_str()]).await;

        assert_eq!(texts(&events), "Hello");
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Done { .. }))));
    }

    #[tokio::test]
    async fn split_json_is_reassembled() {
        let events = collect(&[
            "data: {\"choices\":[{\"delta\":{\"cont",
            "ent\":\"split me\"}}]}\n\ndata: [DONE]\n\n",
        ])
        .await;
        assert_eq!(texts(&events), "split me");
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let events = collect(&[
            "data: {not json}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;
        assert_eq!(texts(&events), "ok");
        assert!(events.iter().all(|e| e.is_ok()));
    }

    #[tokio::test]
    async fn error_chunk_ends_stream() {
        let events = collect(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"overloaded\"}}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        ])
        .await;
        assert_eq!(texts(&events), "a");
        assert!(matches!(events.last(), Some(Err(ProviderError::Stream(m))) if m == "overloaded"));
    }

    #[tokio::test]
    async fn body_without_done_still_finishes() {
        let events = collect(&["data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}"]).await;
        assert_eq!(texts(&events), "x");
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Done { .. }))));
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-test".into(),
            messages: vec![serde_json::json!({"role": "user", "content": "hi"})],
            temperature: 0.7,
            stream: true,
        }
    }

    #[tokio::test]
    async fn streams_from_http_endpoint() {
        let server = MockServer::start().await;
        let body = format!("{}{}data: [DONE]\n\n", delta("Hi "), delta("there"));
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(
            "text",
            Some("sk-test".into()),
            format!("{}/v1/chat/completions", server.uri()),
        );
        let events: Vec<_> = provider
            .send_stream(&request())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(texts(&events), "Hi there");
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_raw(r#"{"error":{"message":"boom"}}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new("text", Some("sk".into()), server.uri());
        let err = provider.send_stream(&request()).await.err().unwrap();
        assert!(matches!(err, ProviderError::Api { status: 500, ref message } if message == "boom"));
    }

    #[tokio::test]
    async fn missing_key_never_calls_upstream() {
        let provider = OpenAiProvider::new("text", Some("  ".into()), "http://127.0.0.1:9".into());
        assert!(!provider.is_configured());
        let err = provider.send_stream(&request()).await.err().unwrap();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
