//! Incremental frame decoder for server-sent event streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] so the carry-over buffer for a
//! not-yet-terminated line lives in the caller's [`BytesMut`]; chunk
//! boundaries may fall anywhere, including inside a multi-byte character.
//!
//! # Usage
//!
//! Use [`FrameDecoder`] as the codec parameter for
//! [`tokio_util::codec::FramedRead`], or feed it directly through
//! [`decode_chunks`].
//!
//! # Line handling
//!
//! | Line                | Effect                                               |
//! |---------------------|------------------------------------------------------|
//! | `event: <type>`     | Sets the event type for the frame being assembled    |
//! | `data: <json>`      | Emits a [`Frame`] with the current event type        |
//! | `data:` (empty)     | Ignored                                              |
//! | *(blank line)*      | Ends the frame; event type resets to unset           |
//! | `: comment`         | Ignored                                              |
//! | *(anything else)*   | Ignored; logged at `DEBUG`                           |

use bytes::BytesMut;
use serde_json::Value;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use crate::stream::events::{Frame, DEFAULT_EVENT_TYPE};
use crate::{AppError, Result};

/// Maximum line length accepted by the decoder: 1 MiB.
///
/// Longer lines are discarded up to the next newline and decoding resumes;
/// they never terminate the stream.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Frame decoder for `event:`/`data:` line streams.
///
/// Holds no state beyond the event type of the frame being assembled and
/// the line codec's discard flag. Build a fresh decoder for every stream.
#[derive(Debug)]
pub struct FrameDecoder {
    lines: LinesCodec,
    event_type: Option<String>,
}

impl FrameDecoder {
    /// Create a new decoder with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_BYTES)
    }

    /// Create a decoder with a custom per-line limit.
    #[must_use]
    pub fn with_max_line_length(max: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max),
            event_type: None,
        }
    }

    /// Process one complete line, returning a frame when it completes one.
    fn process_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            self.event_type = None;
            return None;
        }

        if line.starts_with(':') {
            return None;
        }

        if let Some(value) = line.strip_prefix("event:") {
            let value = value.trim();
            self.event_type = (!value.is_empty()).then(|| value.to_owned());
            return None;
        }

        if let Some(value) = line.strip_prefix("data:") {
            let payload = value.trim();
            if payload.is_empty() {
                return None;
            }

            let event_type = self
                .event_type
                .clone()
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_owned());

            return match serde_json::from_str::<Value>(payload) {
                Ok(data) => Some(Frame { event_type, data }),
                Err(e) => {
                    debug!(
                        event_type,
                        error = %e,
                        "frame decoder: dropping unparseable payload"
                    );
                    None
                }
            };
        }

        debug!(line, "frame decoder: ignoring unrecognised line");
        None
    }

    /// Pull lines out of `src` until one completes a frame.
    fn drain(&mut self, src: &mut BytesMut, eof: bool) -> Option<Frame> {
        loop {
            let next = if eof {
                self.lines.decode_eof(src)
            } else {
                self.lines.decode(src)
            };

            match next {
                Ok(Some(line)) => {
                    if let Some(frame) = self.process_line(&line) {
                        return Some(frame);
                    }
                }
                Ok(None) => return None,
                // Content errors are non-fatal: the codec discards the
                // offending line and resumes at the next newline.
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!("frame decoder: line too long: exceeded {MAX_LINE_BYTES} bytes, skipping");
                }
                Err(LinesCodecError::Io(e)) => {
                    warn!(error = %e, "frame decoder: undecodable line, skipping");
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameDecoder {
    type Item = Frame;
    type Error = AppError;

    /// Decode the next frame from `src`.
    ///
    /// Returns `Ok(None)` when `src` holds no complete frame yet; the trailing
    /// partial line stays in `src` for the next call.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        Ok(self.drain(src, false))
    }

    /// Decode remaining frames when the stream reaches EOF.
    ///
    /// An unterminated final line is processed as if it were terminated.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        Ok(self.drain(src, true))
    }
}

/// Decode a sequence of text chunks into frames, flushing at the end.
///
/// Equivalent to driving a [`FramedRead`](tokio_util::codec::FramedRead)
/// over the same chunks.
#[must_use]
pub fn decode_chunks<I, S>(chunks: I) -> Vec<Frame>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = BytesMut::new();
    let mut frames = Vec::new();

    for chunk in chunks {
        buf.extend_from_slice(chunk.as_ref());
        while let Some(frame) = decoder.drain(&mut buf, false) {
            frames.push(frame);
        }
    }

    while let Some(frame) = decoder.drain(&mut buf, true) {
        frames.push(frame);
    }

    frames
}
