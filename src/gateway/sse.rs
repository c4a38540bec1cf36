//! Line-buffered Server-Sent Events decoder.
//!
//! Raw chunks from the HTTP body are appended to a byte buffer and every
//! complete line is decoded as UTF-8. A chunk may end inside a multi-byte
//! character; the partial bytes wait in the buffer with the rest of the line. `data:` lines and bare JSON object lines are parsed as
//! [`RealtimeEvent`] envelopes. Blank lines, comments (`:`) and other SSE
//! fields (`event:`, `id:`, `retry:`) are skipped.

use crate::shared::event::RealtimeEvent;

/// Incremental SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect the envelopes it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RealtimeEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(event) = parse_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Bytes still waiting for a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn parse_line(line: &str) -> Option<RealtimeEvent> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    if let Some(data) = line.strip_prefix("data:") {
        let data = data.trim_start();
        return match serde_json::from_str::<RealtimeEvent>(data) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("[Gateway] Failed to parse SSE data: {} | data: {}", e, data);
                None
            }
        };
    }

    if line.starts_with('{') && line.ends_with('}') {
        return match serde_json::from_str::<RealtimeEvent>(line) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("[Gateway] Failed to parse JSON line: {} | line: {}", e, line);
                None
            }
        };
    }

    None
}
