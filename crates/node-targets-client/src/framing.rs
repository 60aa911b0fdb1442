//! Watch response framing
//!
//! A watch response body is a sequence of JSON objects, one per line:
//! `{"type": "ADDED", "object": {...}}`. The codec turns each line into a
//! [`MembershipEvent`]. Lines that fail to decode become
//! [`MembershipEvent::Malformed`] rather than errors; only `ERROR` events and
//! transport problems end the stream.

use crate::wire::{Node, RawWatchEvent, Status};
use bytes::{Buf, BytesMut};
use node_targets_core::MembershipEvent;
use thiserror::Error;
use tokio_util::codec::Decoder;

/// Maximum line size (4 MB)
const MAX_LINE_SIZE: usize = 4 * 1024 * 1024;

/// Framing errors
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Watch line too large: {0} bytes (max {MAX_LINE_SIZE})")]
    TooLarge(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Watch error event {code}: {message}")]
    Status { code: u16, message: String },
}

/// Codec for newline-delimited watch events
pub struct WatchEventCodec {
    /// Bytes of the buffer already searched for a newline
    scanned: usize,
    max_line_bytes: usize,
}

impl WatchEventCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_SIZE)
    }

    /// Create codec with a custom line limit
    pub fn with_max_line(max_line_bytes: usize) -> Self {
        Self {
            scanned: 0,
            max_line_bytes,
        }
    }
}

impl Default for WatchEventCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for WatchEventCodec {
    type Item = MembershipEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = src[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = src.len();
                if src.len() > self.max_line_bytes {
                    return Err(FrameError::TooLarge(src.len()));
                }
                return Ok(None);
            };

            let end = self.scanned + offset;
            self.scanned = 0;
            if end > self.max_line_bytes {
                return Err(FrameError::TooLarge(end));
            }

            let line = src.split_to(end);
            src.advance(1);

            if is_blank(&line) {
                continue;
            }
            return decode_line(&line).map(Some);
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }

        // Final line without a trailing newline
        self.scanned = 0;
        let line = src.split_to(src.len());
        if is_blank(&line) {
            return Ok(None);
        }
        decode_line(&line).map(Some)
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Decode one watch line into a membership event
fn decode_line(line: &[u8]) -> Result<MembershipEvent, FrameError> {
    let raw: RawWatchEvent = match serde_json::from_slice(line) {
        Ok(raw) => raw,
        Err(e) => {
            return Ok(MembershipEvent::Malformed {
                reason: format!("undecodable watch event: {}", e),
            })
        }
    };

    let event = match raw.kind.as_str() {
        "ADDED" => match serde_json::from_value::<Node>(raw.object) {
            Ok(node) => match node.into_record() {
                Ok(record) => MembershipEvent::Added(record),
                Err(e) => MembershipEvent::Malformed {
                    reason: e.to_string(),
                },
            },
            Err(e) => MembershipEvent::Malformed {
                reason: format!("undecodable node: {}", e),
            },
        },
        "DELETED" => match serde_json::from_value::<Node>(raw.object) {
            Ok(node) if !node.metadata.name.is_empty() => MembershipEvent::Removed(node.identity()),
            Ok(_) => MembershipEvent::Malformed {
                reason: "deleted node has no name".to_string(),
            },
            Err(e) => MembershipEvent::Malformed {
                reason: format!("undecodable node: {}", e),
            },
        },
        "ERROR" => {
            let status: Status = serde_json::from_value(raw.object).unwrap_or_default();
            return Err(FrameError::Status {
                code: status.code.unwrap_or(0),
                message: status.describe(),
            });
        }
        other => MembershipEvent::Other {
            kind: other.to_string(),
        },
    };

    Ok(event)
}
