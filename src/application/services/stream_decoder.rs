use futures::stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ByteStream, ChatBackendError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid UTF-8 at byte {offset} of the stream")]
    InvalidUtf8 { offset: usize },
    #[error("stream ended inside a multi-byte character ({pending_bytes} bytes pending)")]
    Truncated { pending_bytes: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("transport: {0}")]
    Transport(#[from] ChatBackendError),
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
}

/// Pull-based UTF-8 decoder over a completion byte stream.
///
/// Each call to [`StreamDecoder::next_fragment`] suspends until at least one
/// complete character is available. Bytes of a character split across chunks
/// are held back until the rest arrives. The sequence is finite: after the
/// stream ends, fails or is cancelled, the transport is released and every
/// later call returns `None`.
pub struct StreamDecoder {
    stream: Option<ByteStream>,
    pending: Vec<u8>,
    consumed: usize,
    deferred: Option<DecodeError>,
    cancel: CancellationToken,
}

impl StreamDecoder {
    pub fn new(stream: ByteStream, cancel: CancellationToken) -> Self {
        Self {
            stream: Some(stream),
            pending: Vec::new(),
            consumed: 0,
            deferred: None,
            cancel,
        }
    }

    pub async fn next_fragment(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            if let Some(e) = self.deferred.take() {
                self.release();
                self.pending.clear();
                if self.cancel.is_cancelled() {
                    return None;
                }
                return Some(Err(e.into()));
            }

            let stream = self.stream.as_mut()?;

            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = stream.next() => Some(next),
            };

            let Some(next) = polled else {
                tracing::debug!("Completion stream cancelled");
                self.release();
                self.pending.clear();
                return None;
            };

            match next {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    self.pending.extend_from_slice(&chunk);
                    match self.take_complete_text() {
                        Ok(Some(text)) => return Some(Ok(text)),
                        Ok(None) => continue,
                        Err(e) => {
                            self.release();
                            return Some(Err(e.into()));
                        }
                    }
                }
                Some(Err(e)) => {
                    self.release();
                    return Some(Err(e.into()));
                }
                None => {
                    self.release();
                    if self.pending.is_empty() {
                        return None;
                    }
                    let pending_bytes = self.pending.len();
                    self.pending.clear();
                    return Some(Err(DecodeError::Truncated { pending_bytes }.into()));
                }
            }
        }
    }

    /// Stops the session and drops the underlying transport stream.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.release();
    }

    pub fn is_finished(&self) -> bool {
        self.stream.is_none()
    }

    fn release(&mut self) {
        self.stream = None;
    }

    /// Splits off the longest valid prefix of `pending`, leaving an incomplete
    /// trailing sequence (at most three bytes) for the next chunk.
    ///
    /// Text decoded ahead of an invalid byte is still returned; the error is
    /// reported by the following pull.
    fn take_complete_text(&mut self) -> Result<Option<String>, DecodeError> {
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) => {
                if e.error_len().is_some() {
                    let invalid = DecodeError::InvalidUtf8 {
                        offset: self.consumed + e.valid_up_to(),
                    };
                    if e.valid_up_to() == 0 {
                        return Err(invalid);
                    }
                    self.deferred = Some(invalid);
                }
                e.valid_up_to()
            }
        };

        if valid_up_to == 0 {
            return Ok(None);
        }

        let rest = self.pending.split_off(valid_up_to);
        let complete = std::mem::replace(&mut self.pending, rest);
        self.consumed += complete.len();

        String::from_utf8(complete)
            .map(Some)
            .map_err(|e| DecodeError::InvalidUtf8 {
                offset: self.consumed + e.utf8_error().valid_up_to(),
            })
    }
}
