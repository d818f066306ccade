// Verify the wire format clients parse.
// These tests ensure the event protocol is never broken.

use serde_json::json;
use taskflow_core::types::{StepType, TaskType};
use taskflow_protocol::events::{StepEventKind, TaskEvent, TaskEventKind};
use taskflow_protocol::sse::{decode_event, encode_frame, SseFrame, SseLineBuffer, DONE_FRAME};
use taskflow_protocol::task::{Step, Task};

fn sample_task() -> Task {
    let mut task = Task::new(TaskType::Chat, "hi");
    task.start().unwrap();
    let mut step = Step::new(task.id.clone(), StepType::Skill, "text", "stream text");
    step.start(json!({"temperature": 0.7})).unwrap();
    task.push_step(step);
    task
}

fn sample_events() -> Vec<TaskEvent> {
    let task = sample_task();
    let step = task.steps[0].clone();
    let mut done = task.clone();
    done.complete("Hello, world".into()).unwrap();
    let mut failed = task.clone();
    failed.fail("upstream returned 500").unwrap();

    vec![
        TaskEvent::task(&task, TaskEventKind::Started),
        TaskEvent::step(&step, StepEventKind::Start),
        TaskEvent::content("Hello, "),
        TaskEvent::content("world"),
        TaskEvent::error("upstream returned 500", Some(&failed)),
        TaskEvent::error("bad", None),
        TaskEvent::complete(&done),
    ]
}

fn decode_all(frames: Vec<SseFrame>) -> (Vec<TaskEvent>, bool) {
    let mut events = Vec::new();
    let mut done = false;
    for frame in frames {
        match frame {
            SseFrame::Data(data) => events.push(decode_event(&data).unwrap()),
            SseFrame::Done => done = true,
        }
    }
    (events, done)
}

#[test]
fn content_event_shape() {
    let frame = encode_frame(&TaskEvent::content("Hel")).unwrap();
    assert_eq!(frame, "data: {\"type\":\"content\",\"data\":{\"content\":\"Hel\"}}\n\n");
}

#[test]
fn task_event_shape() {
    let task = sample_task();
    let value = serde_json::to_value(TaskEvent::task(&task, TaskEventKind::Started)).unwrap();
    assert_eq!(value["type"], "task");
    assert_eq!(value["data"]["event"], "started");
    assert_eq!(value["data"]["task"]["status"], "running");
    assert_eq!(value["data"]["task"]["steps"][0]["taskId"], task.id.as_str());
}

#[test]
fn error_event_omits_missing_task() {
    let value = serde_json::to_value(TaskEvent::error("boom", None)).unwrap();
    assert_eq!(value, json!({"type": "error", "data": {"error": "boom"}}));
}

#[test]
fn every_event_survives_encode_decode() {
    for event in sample_events() {
        let frame = encode_frame(&event).unwrap();
        let mut buf = SseLineBuffer::new();
        let (decoded, done) = decode_all(buf.feed(frame.as_bytes()));
        assert!(!done);
        assert_eq!(decoded, vec![event]);
    }
}

#[test]
fn done_frame_is_end_of_stream() {
    let mut buf = SseLineBuffer::new();
    let (events, done) = decode_all(buf.feed(DONE_FRAME.as_bytes()));
    assert!(events.is_empty(), "[DONE] must never decode to an event");
    assert!(done);
}

#[test]
fn arbitrary_split_points_yield_identical_events() {
    let mut payload = String::new();
    for event in sample_events() {
        payload.push_str(&encode_frame(&event).unwrap());
    }
    payload.push_str(DONE_FRAME);
    let bytes = payload.as_bytes();

    let mut whole = SseLineBuffer::new();
    let expected = whole.feed(bytes);

    // every two-way split
    for split in 0..=bytes.len() {
        let mut buf = SseLineBuffer::new();
        let mut frames = buf.feed(&bytes[..split]);
        frames.extend(buf.feed(&bytes[split..]));
        assert_eq!(frames, expected, "split at byte {split}");
    }

    // many small reads of varying size
    for chunk_size in [1, 2, 3, 7, 64] {
        let mut buf = SseLineBuffer::new();
        let mut frames = Vec::new();
        for chunk in bytes.chunks(chunk_size) {
            frames.extend(buf.feed(chunk));
        }
        assert_eq!(frames, expected, "chunk size {chunk_size}");
    }
}

#[test]
fn unknown_event_type_is_rejected_by_typed_decode() {
    assert!(decode_event(r#"{"type":"heartbeat","data":{}}"#).is_err());
}
