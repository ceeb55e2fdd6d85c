//! Server-sent event stream handling.
//!
//! Turns the raw bytes of one message stream (or one push connection) into
//! an ordered sequence of normalized domain events.
//!
//! - `codec`: [`FrameDecoder`](codec::FrameDecoder), line framing into `(event-type, payload)` frames.
//! - `events`: [`Frame`](events::Frame) and the closed [`DomainEvent`](events::DomainEvent) set.
//! - `normalizer`: frame to domain event mapping.
//! - `reader`: consumer loop with cancellation and synthesized completion.

pub mod codec;
pub mod events;
pub mod normalizer;
pub mod reader;
