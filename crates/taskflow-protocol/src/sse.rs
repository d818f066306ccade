//! Server-Sent Events framing.
//!
//! Both directions use the same line discipline: a frame is `data: <payload>\n\n`,
//! the literal payload `[DONE]` ends the stream, and a network read may stop
//! anywhere (even inside a UTF-8 sequence), so unterminated bytes are carried
//! over into the next read.

use crate::events::TaskEvent;

/// Payload that marks end-of-stream.
pub const DONE_MARKER: &str = "[DONE]";

/// The complete end-of-stream frame.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Encode one event as `data: <compact-json>\n\n`.
pub fn encode_frame(event: &TaskEvent) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(event)?;
    Ok(format!("data: {json}\n\n"))
}

/// Decode the payload of a `data:` line into an event.
pub fn decode_event(data: &str) -> Result<TaskEvent, serde_json::Error> {
    serde_json::from_str(data)
}

/// One meaningful line pulled out of an SSE byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Payload of a `data:` line.
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Line buffer with carry-over between reads.
///
/// Only `data:` lines are surfaced; `event:`, `id:`, comments and blank
/// separators are dropped.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a network read and return every frame it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Some(frame) = parse_line(&self.pending[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.pending.drain(..start);
        frames
    }

    /// Flush an unterminated final line once the byte stream has ended.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.pending);
        parse_line(&rest)
    }

    /// Bytes still waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn parse_line(raw: &[u8]) -> Option<SseFrame> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);

    if data.trim() == DONE_MARKER {
        return Some(SseFrame::Done);
    }
    if data.trim().is_empty() {
        return None;
    }
    Some(SseFrame::Data(data.to_string()))
}
