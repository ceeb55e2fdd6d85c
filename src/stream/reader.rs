//! Stream consumer loop.
//!
//! Drives a [`FramedRead`] backed by [`FrameDecoder`] over the transport's
//! byte stream, normalizes each frame, and hands the resulting
//! [`DomainEvent`]s to an [`EventSink`] in arrival order.
//!
//! Undecodable frames are logged and skipped; they never terminate the loop.

use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::stream::codec::FrameDecoder;
use crate::stream::events::DomainEvent;
use crate::stream::normalizer::normalize;

/// How the reader treats terminal events and end of stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMode {
    /// One stream per sent message: stop at `done`/`error`, and synthesize
    /// [`DomainEvent::StreamComplete`] on a clean EOF without `done`.
    PerMessage,
    /// Long-lived push connection: terminal events end a turn, not the
    /// stream; EOF is an unexpected drop.
    Persistent,
}

/// Why the reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// `done` observed, or synthesized at clean EOF.
    Completed,
    /// The agent sent an `error` event.
    Failed(String),
    /// The cancellation token fired.
    Cancelled,
    /// The underlying connection failed or closed unexpectedly.
    Dropped(String),
    /// The sink stopped accepting events.
    SinkClosed,
}

/// Consumer of normalized events.
///
/// Returning `false` from [`deliver`](Self::deliver) stops the reader.
pub trait EventSink: Send {
    /// Deliver one event.
    fn deliver(&mut self, event: DomainEvent) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

impl EventSink for mpsc::Sender<DomainEvent> {
    fn deliver(&mut self, event: DomainEvent) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.send(event).await.is_ok() })
    }
}

/// Reader loop: decode `source`, normalize frames, and deliver events.
///
/// # Cancellation
///
/// Raced against every read and every delivery, so a sink that applies
/// backpressure cannot hold the reader past cancellation. When `cancel`
/// fires the reader returns [`StreamEnd::Cancelled`] without emitting a
/// terminal event; dropping the source closes the connection.
pub async fn run_reader<S, K>(
    session_id: &str,
    source: S,
    mode: ReaderMode,
    cancel: &CancellationToken,
    sink: &mut K,
) -> StreamEnd
where
    S: Stream<Item = io::Result<Bytes>> + Unpin + Send,
    K: EventSink + ?Sized,
{
    let mut framed = FramedRead::new(StreamReader::new(source), FrameDecoder::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, "stream reader: cancellation received, stopping");
                return StreamEnd::Cancelled;
            }

            item = framed.next() => {
                match item {
                    None => {
                        return match mode {
                            ReaderMode::PerMessage => {
                                debug!(session_id, "stream reader: EOF without done, synthesizing completion");
                                match deliver(session_id, sink, DomainEvent::StreamComplete, cancel).await {
                                    Some(end) => end,
                                    None => StreamEnd::Completed,
                                }
                            }
                            ReaderMode::Persistent => {
                                debug!(session_id, "stream reader: push connection closed");
                                StreamEnd::Dropped("stream closed".to_owned())
                            }
                        };
                    }

                    Some(Err(e)) => {
                        warn!(session_id, error = %e, "stream reader: transport error, stopping");
                        return StreamEnd::Dropped(e.to_string());
                    }

                    Some(Ok(frame)) => {
                        let event_type = frame.event_type.clone();
                        let event = match normalize(session_id, frame) {
                            Ok(Some(event)) => event,
                            Ok(None) => continue,
                            Err(e) => {
                                warn!(
                                    session_id,
                                    event_type,
                                    error = %e,
                                    "stream reader: dropping frame"
                                );
                                continue;
                            }
                        };

                        let end = match (&event, mode) {
                            (DomainEvent::StreamComplete, ReaderMode::PerMessage) => {
                                Some(StreamEnd::Completed)
                            }
                            (DomainEvent::StreamError { message }, ReaderMode::PerMessage) => {
                                Some(StreamEnd::Failed(message.clone()))
                            }
                            _ => None,
                        };

                        if let Some(stopped) = deliver(session_id, sink, event, cancel).await {
                            return stopped;
                        }

                        if let Some(end) = end {
                            return end;
                        }
                    }
                }
            }
        }
    }
}

/// Deliver one event unless `cancel` fires first.
///
/// Returns the reason to stop, or `None` when the event was accepted.
async fn deliver<K>(
    session_id: &str,
    sink: &mut K,
    event: DomainEvent,
    cancel: &CancellationToken,
) -> Option<StreamEnd>
where
    K: EventSink + ?Sized,
{
    tokio::select! {
        biased;

        () = cancel.cancelled() => {
            debug!(session_id, "stream reader: cancelled while delivering");
            Some(StreamEnd::Cancelled)
        }

        accepted = sink.deliver(event) => {
            if accepted {
                None
            } else {
                debug!(session_id, "stream reader: sink closed, stopping");
                Some(StreamEnd::SinkClosed)
            }
        }
    }
}
