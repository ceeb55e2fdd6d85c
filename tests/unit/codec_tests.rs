//! Unit tests for the incremental frame decoder.
//!
//! Covers:
//! - frames split across chunks at every byte offset decode identically
//! - a payload with no `event:` line is typed `message`
//! - blank lines reset the event type
//! - `\r\n` terminators, comments, and empty `data:` lines
//! - malformed payloads and over-long lines are dropped without ending the stream
//! - an unterminated final line is flushed at EOF

use bytes::BytesMut;
use serde_json::json;
use tokio_util::codec::Decoder;

use agent_stream::stream::codec::{decode_chunks, FrameDecoder};
use agent_stream::stream::events::Frame;

const SAMPLE: &str = concat!(
    "event: thinking\n",
    "data: {\"message\":\"Analyzing…\"}\n",
    "\n",
    "event: llm_response\n",
    "data: {\"content\":\"Hello there\"}\n",
    "\n",
    "event: code_executing\n",
    "data: {\"code\":\"1+1\"}\n",
    "\n",
    "event: code_result\n",
    "data: {\"success\":true,\"stdout\":\"2\"}\n",
    "\n",
    "event: done\n",
    "data: {}\n",
    "\n",
);

fn sample_frames() -> Vec<Frame> {
    vec![
        Frame::new("thinking", json!({"message": "Analyzing…"})),
        Frame::new("llm_response", json!({"content": "Hello there"})),
        Frame::new("code_executing", json!({"code": "1+1"})),
        Frame::new("code_result", json!({"success": true, "stdout": "2"})),
        Frame::new("done", json!({})),
    ]
}

// ── Chunk-boundary invariance ───────────────────────────────────────────────

/// Splitting the stream into two chunks at any byte offset, including inside
/// a multi-byte character, yields the same frames as the unsplit stream.
#[test]
fn every_two_way_split_yields_identical_frames() {
    let bytes = SAMPLE.as_bytes();
    let expected = decode_chunks([bytes]);
    assert_eq!(expected, sample_frames());

    for offset in 0..=bytes.len() {
        let (head, tail) = bytes.split_at(offset);
        let frames = decode_chunks([head, tail]);
        assert_eq!(frames, expected, "split at offset {offset} changed the frames");
    }
}

/// Delivering the stream one byte at a time yields the same frames.
#[test]
fn byte_at_a_time_delivery_yields_identical_frames() {
    let chunks: Vec<&[u8]> = SAMPLE.as_bytes().chunks(1).collect();
    assert_eq!(decode_chunks(chunks), sample_frames());
}

/// Three-way splits at a stride cover splits that land inside fields.
#[test]
fn three_way_splits_yield_identical_frames() {
    let bytes = SAMPLE.as_bytes();
    for first in (0..bytes.len()).step_by(7) {
        for second in (first..bytes.len()).step_by(11) {
            let frames = decode_chunks([&bytes[..first], &bytes[first..second], &bytes[second..]]);
            assert_eq!(frames, sample_frames(), "split at {first}/{second}");
        }
    }
}

// ── Partial lines ───────────────────────────────────────────────────────────

/// A `data:` line without its newline is held back until the newline arrives.
#[test]
fn partial_line_is_buffered_until_newline() {
    let mut decoder = FrameDecoder::new();
    let mut buf = BytesMut::from("event: thinking\ndata: {\"message\":\"wo");

    let first = decoder.decode(&mut buf).expect("decode never errors");
    assert!(first.is_none(), "incomplete line must not produce a frame");
    assert!(!buf.is_empty(), "partial line must stay buffered");

    buf.extend_from_slice(b"rking\"}\n");
    let frame = decoder
        .decode(&mut buf)
        .expect("decode never errors")
        .expect("completed line must produce a frame");
    assert_eq!(frame, Frame::new("thinking", json!({"message": "working"})));
}

/// An unterminated final line is processed when the stream ends.
#[test]
fn unterminated_final_line_is_flushed_at_eof() {
    let frames = decode_chunks(["event: done\ndata: {}"]);
    assert_eq!(frames, vec![Frame::new("done", json!({}))]);
}

// ── Event type handling ─────────────────────────────────────────────────────

/// A payload with no preceding `event:` line is typed `message`.
#[test]
fn payload_without_event_line_is_typed_message() {
    let frames = decode_chunks(["data: {\"x\":1}\n\n"]);
    assert_eq!(frames, vec![Frame::new("message", json!({"x": 1}))]);
}

/// A blank line ends the frame; a later bare `data:` line is typed `message`.
#[test]
fn blank_line_resets_event_type() {
    let frames = decode_chunks(["event: thinking\ndata: {\"message\":\"a\"}\n\ndata: {\"message\":\"b\"}\n"]);
    assert_eq!(
        frames,
        vec![
            Frame::new("thinking", json!({"message": "a"})),
            Frame::new("message", json!({"message": "b"})),
        ]
    );
}

/// Several `data:` lines after one `event:` line each emit a frame of that type.
#[test]
fn multiple_data_lines_share_the_event_type() {
    let frames = decode_chunks(["event: llm_response\ndata: {\"content\":\"a\"}\ndata: {\"content\":\"b\"}\n"]);
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|frame| frame.event_type == "llm_response"));
}

/// `\r\n` terminators are accepted.
#[test]
fn crlf_terminators_are_accepted() {
    let frames = decode_chunks(["event: done\r\ndata: {}\r\n\r\n"]);
    assert_eq!(frames, vec![Frame::new("done", json!({}))]);
}

// ── Ignored and malformed input ─────────────────────────────────────────────

/// Comments, unknown fields, and empty `data:` lines produce nothing.
#[test]
fn comments_unknown_fields_and_empty_data_are_ignored() {
    let frames = decode_chunks([": keep-alive\nid: 7\nretry: 100\nevent: thinking\ndata:\ndata:   \n\n"]);
    assert!(frames.is_empty(), "no frame expected, got {frames:?}");
}

/// A malformed payload is dropped and decoding continues with the next frame.
#[test]
fn malformed_payload_is_dropped_and_stream_continues() {
    let frames = decode_chunks(["event: thinking\ndata: {not json\n\nevent: done\ndata: {}\n"]);
    assert_eq!(frames, vec![Frame::new("done", json!({}))]);
}

/// A line longer than the limit is skipped up to its newline; the next frame
/// still decodes.
#[test]
fn over_long_line_is_skipped_without_ending_the_stream() {
    let mut decoder = FrameDecoder::with_max_line_length(64);
    let long_payload = format!("data: {{\"message\":\"{}\"}}\n", "x".repeat(200));
    let mut buf = BytesMut::from(long_payload.as_str());
    buf.extend_from_slice(b"event: done\ndata: {}\n");

    let mut frames = Vec::new();
    while let Some(frame) = decoder.decode(&mut buf).expect("decode never errors") {
        frames.push(frame);
    }

    assert_eq!(frames, vec![Frame::new("done", json!({}))]);
}

/// An `event:` line with an empty value leaves the type unset.
#[test]
fn empty_event_value_falls_back_to_message() {
    let frames = decode_chunks(["event:\ndata: {}\n"]);
    assert_eq!(frames, vec![Frame::new("message", json!({}))]);
}
