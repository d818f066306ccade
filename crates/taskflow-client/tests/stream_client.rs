//! Client behavior against a mocked gateway.

use std::time::Duration;

use serde_json::json;
use taskflow_client::{ChatClient, ClientError, StreamHandler, StreamOutcome, TaskStreamState};
use taskflow_core::types::{StepType, TaskType};
use taskflow_protocol::events::{StepEventKind, TaskEvent, TaskEventKind};
use taskflow_protocol::request::{ChatMessage, ChatRequestBody};
use taskflow_protocol::sse::{encode_frame, DONE_FRAME};
use taskflow_protocol::task::{Step, Task};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Calls {
    log: Vec<String>,
    cancel_on_content: Option<CancellationToken>,
}

impl StreamHandler for Calls {
    fn on_task_start(&mut self, _task: &Task) {
        self.log.push("task_start".into());
    }
    fn on_step_start(&mut self, step: &Step) {
        self.log.push(format!("step_start:{}", step.name));
    }
    fn on_step_complete(&mut self, step: &Step) {
        self.log.push(format!("step_done:{}", step.name));
    }
    fn on_content(&mut self, content: &str) {
        self.log.push(format!("content:{content}"));
        if let Some(token) = &self.cancel_on_content {
            token.cancel();
        }
    }
    fn on_error(&mut self, error: &str, _task: Option<&Task>) {
        self.log.push(format!("error:{error}"));
    }
    fn on_complete(&mut self, _task: &Task) {
        self.log.push("complete".into());
    }
}

fn request() -> ChatRequestBody {
    ChatRequestBody::new(vec![ChatMessage::user("hi")])
}

/// A successful run: task start, one step, two content deltas, complete.
fn happy_events() -> Vec<TaskEvent> {
    let mut task = Task::new(TaskType::Chat, "hi");
    task.start().unwrap();
    let started = TaskEvent::task(&task, TaskEventKind::Started);

    let mut step = Step::new(task.id.clone(), StepType::Skill, "text", "Generate reply");
    step.start(json!({})).unwrap();
    let step_start = TaskEvent::step(&step, StepEventKind::Start);
    step.complete(json!({"content": "Hello"})).unwrap();
    let step_done = TaskEvent::step(&step, StepEventKind::Complete);

    task.complete("Hello".into()).unwrap();
    vec![
        started,
        step_start,
        TaskEvent::content("Hel"),
        TaskEvent::content("lo"),
        step_done,
        TaskEvent::complete(&task),
    ]
}

fn sse_body(events: &[TaskEvent], done: bool) -> String {
    let mut body: String = events.iter().map(|e| encode_frame(e).unwrap()).collect();
    if done {
        body.push_str(DONE_FRAME);
    }
    body
}

async fn mount_sse(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_stream_rebuilds_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&happy_events(), true), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = ChatClient::new(server.uri());
    let mut state = TaskStreamState::new(1);
    let outcome = client
        .stream_chat(&request(), &mut state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(state.content(), "Hello");
    assert!(state.is_completed());
    assert_eq!(
        state.current_task.as_ref().and_then(|t| t.result.as_deref()),
        Some(state.content())
    );
    assert!(state.error.is_none());
}

#[tokio::test]
async fn callbacks_fire_in_stream_order() {
    let server = MockServer::start().await;
    mount_sse(&server, sse_body(&happy_events(), true)).await;

    let mut calls = Calls::default();
    let outcome = ChatClient::new(server.uri())
        .stream_chat(&request(), &mut calls, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(
        calls.log,
        [
            "task_start",
            "step_start:text",
            "content:Hel",
            "content:lo",
            "step_done:text",
            "complete",
        ]
    );
}

#[tokio::test]
async fn rejected_request_reports_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "messages must not be empty", "code": "INVALID_REQUEST"}
        })))
        .mount(&server)
        .await;

    let mut calls = Calls::default();
    let err = ChatClient::new(server.uri())
        .stream_chat(
            &ChatRequestBody::new(vec![]),
            &mut calls,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.is_invalid_request());
    assert!(matches!(err, ClientError::Api { status: 400, .. }));
    assert_eq!(calls.log, ["error:messages must not be empty"]);
}

#[tokio::test]
async fn error_event_fails_stream() {
    let mut task = Task::new(TaskType::Chat, "hi");
    task.start().unwrap();
    let started = TaskEvent::task(&task, TaskEventKind::Started);
    task.fail("upstream 500").unwrap();
    let body = sse_body(&[started, TaskEvent::error("upstream 500", Some(&task))], true);

    let server = MockServer::start().await;
    mount_sse(&server, body).await;

    let mut state = TaskStreamState::new(0);
    let outcome = ChatClient::new(server.uri())
        .stream_chat(&request(), &mut state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Failed);
    assert_eq!(state.error.as_deref(), Some("upstream 500"));
    assert!(!state.is_completed());
}

#[tokio::test]
async fn truncated_stream_is_a_failure() {
    let events = happy_events();
    let server = MockServer::start().await;
    mount_sse(&server, sse_body(&events[..3], false)).await;

    let mut calls = Calls::default();
    let outcome = ChatClient::new(server.uri())
        .stream_chat(&request(), &mut calls, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Failed);
    assert_eq!(calls.log.last().map(String::as_str), Some("error:stream ended unexpectedly"));
}

#[tokio::test]
async fn unknown_event_types_are_ignored() {
    let events = happy_events();
    let mut body = encode_frame(&events[0]).unwrap();
    body.push_str("data: {\"type\":\"heartbeat\",\"data\":{}}\n\n");
    body.push_str(": keep-alive\n\n");
    body.push_str(&sse_body(&events[2..], true));

    let server = MockServer::start().await;
    mount_sse(&server, body).await;

    let mut state = TaskStreamState::new(0);
    let outcome = ChatClient::new(server.uri())
        .stream_chat(&request(), &mut state, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(state.content(), "Hello");
}

#[tokio::test]
async fn cancel_before_response_is_silent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&happy_events(), true), "text/event-stream")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let mut calls = Calls::default();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        ChatClient::new(server.uri()).stream_chat(&request(), &mut calls, &cancel),
    )
    .await
    .expect("cancellation should end the call promptly")
    .unwrap();

    assert_eq!(outcome, StreamOutcome::Cancelled);
    assert!(calls.log.is_empty());
}

/// Gateway that sends a task start and one delta, then holds the connection open.
async fn stalling_gateway() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let events = happy_events();
    let body = sse_body(&events[..3], false);

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;
        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn cancel_mid_stream_stops_callbacks() {
    let base = stalling_gateway().await;
    let cancel = CancellationToken::new();
    let mut calls = Calls {
        cancel_on_content: Some(cancel.clone()),
        ..Calls::default()
    };

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        ChatClient::new(base).stream_chat(&request(), &mut calls, &cancel),
    )
    .await
    .expect("cancellation should end the call promptly")
    .unwrap();

    assert_eq!(outcome, StreamOutcome::Cancelled);
    assert_eq!(calls.log.last().map(String::as_str), Some("content:Hel"));
    assert!(!calls.log.iter().any(|c| c.starts_with("error") || c == "complete"));
}

#[tokio::test]
async fn send_returns_buffered_response() {
    let events = happy_events();
    let task = events.last().and_then(|e| e.task_snapshot()).cloned().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": task,
            "chunks": events,
        })))
        .mount(&server)
        .await;

    let response = ChatClient::new(server.uri()).send(&request()).await.unwrap();
    assert_eq!(response.task.result.as_deref(), Some("Hello"));
    assert_eq!(response.chunks.len(), 6);
}

#[tokio::test]
async fn health_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "version": "0.1.0",
            "features": {"text": true, "vision": false, "tools": true}
        })))
        .mount(&server)
        .await;

    let health = ChatClient::new(format!("{}/", server.uri()))
        .health()
        .await
        .unwrap();
    assert_eq!(health.status, "ok");
    assert!(health.features.text);
    assert!(!health.features.vision);
}

#[tokio::test]
async fn non_json_error_body_gets_status_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = ChatClient::new(server.uri()).send(&request()).await.unwrap_err();
    match err {
        ClientError::Api {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 503);
            assert_eq!(code, "HTTP_503");
            assert_eq!(message, "overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
