use bytes::Bytes;
use futures::stream::{self, StreamExt};

use crate::application::ports::ByteStream;

/// Strips server-sent-event framing from a byte stream, yielding the `data`
/// payload of each event. Multi-line data is joined with `\n`; comments and
/// other fields (`event:`, `id:`, `retry:`) are dropped.
///
/// Works on raw bytes so a character split across chunks passes through intact
/// for the decoder to reassemble.
#[derive(Debug, Default)]
pub struct EventStreamUnwrapper {
    line: Vec<u8>,
    data: Vec<u8>,
    has_data: bool,
}

impl EventStreamUnwrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut events = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                let mut line = std::mem::take(&mut self.line);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if let Some(event) = self.process_line(&line) {
                    events.push(event);
                }
            } else {
                self.line.push(byte);
            }
        }
        events
    }

    /// Drops an event left open when the transport closed, since only a blank
    /// line dispatches one. Returns whether anything was discarded.
    pub fn finish(&mut self) -> bool {
        let discarded = self.has_data || !self.line.is_empty();
        self.line.clear();
        self.data.clear();
        self.has_data = false;
        if discarded {
            tracing::debug!("Discarding unterminated event at end of stream");
        }
        discarded
    }

    fn process_line(&mut self, line: &[u8]) -> Option<Bytes> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(b":") {
            return None;
        }
        if let Some(value) = line.strip_prefix(b"data:") {
            let value = value.strip_prefix(b" ").unwrap_or(value);
            if self.has_data {
                self.data.push(b'\n');
            }
            self.data.extend_from_slice(value);
            self.has_data = true;
        }
        None
    }

    fn dispatch(&mut self) -> Option<Bytes> {
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(Bytes::from(std::mem::take(&mut self.data)))
    }
}

/// Wraps `inner` so that it yields event payloads instead of framed bytes.
pub fn unwrap_event_stream(inner: ByteStream) -> ByteStream {
    let state = (Some(inner), EventStreamUnwrapper::new());
    let payloads = stream::unfold(state, |(inner, mut unwrapper)| async move {
        let mut inner = inner?;
        match inner.next().await {
            Some(Ok(chunk)) => {
                let events = unwrapper.push(&chunk);
                let items: Vec<_> = events.into_iter().map(Ok).collect();
                Some((items, (Some(inner), unwrapper)))
            }
            Some(Err(e)) => Some((vec![Err(e)], (None, unwrapper))),
            None => {
                unwrapper.finish();
                None
            }
        }
    });
    Box::pin(payloads.flat_map(stream::iter))
}
