//! Incremental detection of inline `<tool>{json}</tool>` markers in streamed text.

use tracing::debug;

use super::ToolCallRequest;

const OPEN: &str = "<tool>";
const CLOSE: &str = "</tool>";

/// Scans the cumulative text of a response for complete marker pairs.
///
/// Each pair is reported exactly once, no matter how the text was split
/// across deltas. A pair whose payload is not a valid `{tool, arguments}`
/// object is consumed and dropped.
#[derive(Debug, Default)]
pub struct MarkerScanner {
    text: String,
    cursor: usize,
    /// Where the search for `</tool>` resumes while an opening tag is unclosed.
    close_from: usize,
}

impl MarkerScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta and return calls whose closing tag arrived with it.
    pub fn feed(&mut self, delta: &str) -> Vec<ToolCallRequest> {
        self.text.push_str(delta);
        let mut calls = Vec::new();

        loop {
            let rest = &self.text[self.cursor..];
            let Some(open) = rest.find(OPEN) else {
                // keep a tail that could still grow into an opening tag
                let tail = self.text.len().saturating_sub(OPEN.len() - 1);
                self.cursor = floor_char_boundary(&self.text, tail).max(self.cursor);
                break;
            };
            let payload_start = self.cursor + open + OPEN.len();
            let search_from = self.close_from.max(payload_start);
            let Some(close) = self.text[search_from..].find(CLOSE) else {
                self.cursor += open;
                // only a suffix shorter than the closing tag can still complete it
                let tail = self.text.len().saturating_sub(CLOSE.len() - 1);
                self.close_from = floor_char_boundary(&self.text, tail).max(payload_start);
                break;
            };
            let payload_end = search_from + close;
            let payload = self.text[payload_start..payload_end].trim();

            match serde_json::from_str::<ToolCallRequest>(payload) {
                Ok(call) => calls.push(call),
                Err(e) => debug!(error = %e, "ignoring malformed tool marker"),
            }
            self.cursor = payload_end + CLOSE.len();
            self.close_from = self.cursor;
        }

        calls
    }

    /// Full text seen so far.
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
