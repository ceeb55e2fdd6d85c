//! Protocol-agnostic transport abstraction.
//!
//! The [`Transport`] trait decouples the client core (decoder, normalizer,
//! state, HITL coordination) from the network. The request/response model
//! opens one byte stream per sent message; the persistent model obtains a
//! long-lived byte stream from a [`Connector`] and reconnects on drops.
//!
//! Neither trait mutates session, plan, or turn state.

pub mod http;
pub mod socket;

use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use crate::models::hitl::HitlResponse;
use crate::models::session::{Session, SessionUpdate};
use crate::models::turn::HistoryMessage;
use crate::Result;

/// Raw byte stream yielded by a transport, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Boxed future returned by transport methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Request/response interface to the remote agent service.
pub trait Transport: Send + Sync {
    /// Send `message` to the session and open its response event stream.
    ///
    /// `cancel` is checked while the request is in flight; dropping the
    /// returned stream closes the connection.
    ///
    /// # Errors
    ///
    /// - [`AppError::Protocol`](crate::AppError::Protocol) for an HTTP status of 400 or above,
    ///   carrying the response body. Never retried.
    /// - [`AppError::Transport`](crate::AppError::Transport) when the connection fails.
    /// - [`AppError::Cancelled`](crate::AppError::Cancelled) when `cancel` fires first.
    fn open_stream<'a>(
        &'a self,
        session_id: &'a str,
        message: &'a str,
        cancel: CancellationToken,
    ) -> TransportFuture<'a, ByteStream>;

    /// Deliver a HITL decision to the paused agent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`](crate::AppError::Protocol) or
    /// [`AppError::Transport`](crate::AppError::Transport) on failure.
    fn send_hitl_response<'a>(
        &'a self,
        session_id: &'a str,
        response: &'a HitlResponse,
    ) -> TransportFuture<'a, ()>;

    /// Apply a partial session update.
    ///
    /// Returns the server's session, or `None` when the server acknowledges
    /// the update without a body.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`](crate::AppError::Protocol) or
    /// [`AppError::Transport`](crate::AppError::Transport) on failure.
    fn update_session<'a>(
        &'a self,
        session_id: &'a str,
        update: &'a SessionUpdate,
    ) -> TransportFuture<'a, Option<Session>>;

    /// Fetch the stored messages of a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`](crate::AppError::Protocol) or
    /// [`AppError::Transport`](crate::AppError::Transport) on failure.
    fn fetch_history<'a>(&'a self, session_id: &'a str) -> TransportFuture<'a, Vec<HistoryMessage>>;
}

/// Source of persistent push connections.
pub trait Connector: Send + Sync {
    /// Open a push connection for the session.
    ///
    /// # Errors
    ///
    /// Recoverable failures are reported as
    /// [`AppError::Transport`](crate::AppError::Transport); anything else stops
    /// the reconnection loop.
    fn connect<'a>(&'a self, session_id: &'a str) -> TransportFuture<'a, ByteStream>;
}
