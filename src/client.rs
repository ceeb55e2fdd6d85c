//! The session client.
//!
//! [`AgentClient`] is an owned, explicitly constructed object bound to one
//! session at a time. It runs at most one message stream: sending while a
//! stream is in flight cancels the previous one (supersede) before the new
//! request is opened. Normalized events flow through a
//! [`SessionPipeline`] into the conversation state and HITL coordinator and
//! are then forwarded on the channel returned by [`AgentClient::new`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::ClientConfig;
use crate::models::hitl::{HitlAction, HitlPayload, HitlRequest};
use crate::models::session::{Session, SessionUpdate};
use crate::session::conversation::ConversationState;
use crate::session::hitl::{validate_response, HitlCoordinator, HitlState};
use crate::session::pipeline::SessionPipeline;
use crate::session::reconnect::{Backoff, ConnectionState};
use crate::stream::events::DomainEvent;
use crate::stream::reader::{run_reader, EventSink, ReaderMode, StreamEnd};
use crate::transport::http::HttpTransport;
use crate::transport::{Connector, Transport};
use crate::{AppError, Result};

/// How a message stream ended. Exactly one outcome per sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `done` observed, or synthesized at a clean end of stream.
    Completed,
    /// The request or stream failed; no automatic retry is attempted.
    Failed(AppError),
    /// Superseded by a newer send, or cancelled by the caller.
    Cancelled,
}

/// Caller-side handle for one sent message.
#[derive(Debug)]
pub struct StreamHandle {
    cancel: CancellationToken,
    outcome: oneshot::Receiver<StreamOutcome>,
}

impl StreamHandle {
    /// Cancel the stream. The wait resolves with [`StreamOutcome::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the stream has been cancelled or superseded.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the stream to end.
    pub async fn wait(self) -> StreamOutcome {
        self.outcome.await.unwrap_or(StreamOutcome::Cancelled)
    }
}

struct InFlight {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Owned client for one remote agent session.
pub struct AgentClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    session_id: String,
    state: Arc<RwLock<ConversationState>>,
    hitl: Arc<Mutex<HitlCoordinator>>,
    hitl_rx: watch::Receiver<HitlState>,
    responding: Mutex<()>,
    connection: watch::Sender<ConnectionState>,
    events: mpsc::Sender<DomainEvent>,
    inflight: Mutex<Option<InFlight>>,
    scope: CancellationToken,
    closed: AtomicBool,
}

impl AgentClient {
    /// Construct a client bound to `session`.
    ///
    /// Returns the client and the receiving end of its outbound event
    /// channel, sized by `config.event_buffer`.
    #[must_use]
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        session: Session,
    ) -> (Self, mpsc::Receiver<DomainEvent>) {
        let (events, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        let coordinator = HitlCoordinator::new(session.id.as_str());
        let hitl_rx = coordinator.subscribe();

        let client = Self {
            session_id: session.id.clone(),
            config,
            transport,
            state: Arc::new(RwLock::new(ConversationState::new(session))),
            hitl: Arc::new(Mutex::new(coordinator)),
            hitl_rx,
            responding: Mutex::new(()),
            connection,
            events,
            inflight: Mutex::new(None),
            scope: CancellationToken::new(),
            closed: AtomicBool::new(false),
        };
        (client, events_rx)
    }

    /// Construct a client over the HTTP transport described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the transport cannot be built.
    pub fn over_http(
        config: ClientConfig,
        session: Session,
    ) -> Result<(Self, mpsc::Receiver<DomainEvent>)> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::new(config, transport, session))
    }

    /// Identifier of the bound session.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    // ── Message streams ───────────────────────────────────────────────────────

    /// Send `message` and start consuming its response stream.
    ///
    /// Any stream still in flight is cancelled first and fully wound down
    /// before the new request is opened; it resolves as
    /// [`StreamOutcome::Cancelled`] and is never retried.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cancelled` if the client has been disconnected.
    pub async fn send_message(&self, message: impl Into<String>) -> Result<StreamHandle> {
        self.ensure_open()?;
        let message = message.into();
        let cancel = self.scope.child_token();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let mut inflight = self.inflight.lock().await;
        let previous = inflight.take().map(|prev| {
            if !prev.join.is_finished() {
                info!(session_id = %self.session_id, "superseding in-flight stream");
            }
            prev.cancel.cancel();
            prev.join
        });

        let task = StreamTask {
            session_id: self.session_id.clone(),
            message,
            transport: Arc::clone(&self.transport),
            state: Arc::clone(&self.state),
            pipeline: self.pipeline(),
            cancel: cancel.clone(),
            previous,
        };
        let join = tokio::spawn(
            task.run(outcome_tx)
                .instrument(info_span!("stream_consumer", session_id = %self.session_id)),
        );
        *inflight = Some(InFlight {
            cancel: cancel.clone(),
            join,
        });

        Ok(StreamHandle {
            cancel,
            outcome: outcome_rx,
        })
    }

    /// Cancel the in-flight stream, if any, and wait for it to wind down.
    pub async fn cancel_stream(&self) {
        let previous = self.inflight.lock().await.take();
        if let Some(prev) = previous {
            prev.cancel.cancel();
            if let Err(err) = prev.join.await {
                warn!(session_id = %self.session_id, error = %err, "stream task ended abnormally");
            }
        }
    }

    // ── HITL ──────────────────────────────────────────────────────────────────

    /// Answer the outstanding HITL request.
    ///
    /// The payload is checked against the request kind before anything is
    /// sent; a violation leaves the request outstanding. On success the
    /// coordinator returns to idle.
    ///
    /// # Errors
    ///
    /// - `AppError::HitlViolation` when no request is outstanding or the
    ///   payload does not fit the request kind. No network call is made.
    /// - `AppError::Protocol` / `AppError::Transport` when delivery fails;
    ///   the request stays outstanding.
    pub async fn respond(&self, action: HitlAction, payload: HitlPayload) -> Result<()> {
        self.ensure_open()?;
        // One response on the wire at a time; the coordinator lock is not held across the call.
        let _responding = self.responding.lock().await;
        let request = self.hitl.lock().await.pending().ok_or_else(|| {
            AppError::HitlViolation("no hitl request is outstanding".into())
        })?;
        let response = validate_response(&request, action, payload)?;

        self.transport
            .send_hitl_response(&self.session_id, &response)
            .await?;
        self.hitl.lock().await.complete(&request.id);

        info!(
            session_id = %self.session_id,
            request_id = %request.id,
            kind = request.kind.as_str(),
            action = action.as_str(),
            "hitl decision sent"
        );
        Ok(())
    }

    /// Receiver observing HITL state changes.
    #[must_use]
    pub fn hitl_state(&self) -> watch::Receiver<HitlState> {
        self.hitl_rx.clone()
    }

    /// The outstanding HITL request, if any.
    pub async fn pending_hitl(&self) -> Option<HitlRequest> {
        self.hitl.lock().await.pending()
    }

    /// Requests displaced by a newer one while still outstanding, oldest first.
    pub async fn superseded_hitl(&self) -> Vec<HitlRequest> {
        self.hitl.lock().await.superseded()
    }

    // ── Session ───────────────────────────────────────────────────────────────

    /// Apply a partial session update and merge the server's result.
    ///
    /// An empty update makes no call and returns the local session view.
    /// When the server acknowledges without echoing the session, the update
    /// is applied to the local view as sent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` / `AppError::Transport` when the call fails.
    pub async fn update_session(&self, update: SessionUpdate) -> Result<Session> {
        self.ensure_open()?;
        if update.is_empty() {
            debug!(session_id = %self.session_id, "empty session update, nothing to send");
            return Ok(self.state.read().await.session().clone());
        }

        let echoed = self
            .transport
            .update_session(&self.session_id, &update)
            .await?;

        let mut state = self.state.write().await;
        match echoed {
            Some(session) => state.merge_session(session),
            None => state.apply_session_update(&update),
        }
        let session = state.session().clone();
        info!(session_id = %self.session_id, hitl_mode = ?session.hitl_mode, "session updated");
        Ok(session)
    }

    /// Fetch stored messages and rebuild the turn history from them.
    ///
    /// Returns the number of replayed turns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` / `AppError::Transport` when the call
    /// fails; local history is left untouched.
    pub async fn load_history(&self) -> Result<usize> {
        self.ensure_open()?;
        let messages = self.transport.fetch_history(&self.session_id).await?;
        let mut state = self.state.write().await;
        state.replay(messages);
        Ok(state.turns().len())
    }

    /// Read-only snapshot of the conversation state.
    pub async fn snapshot(&self) -> ConversationState {
        self.state.read().await.clone()
    }

    /// Rebind the client to another session.
    ///
    /// Cancels the in-flight stream and any running listener, abandons the
    /// outstanding HITL request without responding, and starts from an empty
    /// conversation state. Re-opens a disconnected client.
    pub async fn switch_session(&mut self, session: Session) {
        info!(from = %self.session_id, to = %session.id, "switching session");
        self.scope.cancel();
        self.cancel_stream().await;

        self.hitl.lock().await.rebind(session.id.as_str());
        self.session_id.clone_from(&session.id);
        {
            let mut state = self.state.write().await;
            state.clear();
            state.merge_session(session);
        }

        self.scope = CancellationToken::new();
        self.connection.send_replace(ConnectionState::Disconnected);
        self.closed.store(false, Ordering::SeqCst);
    }

    /// Tear the client down locally.
    ///
    /// Cancels the in-flight stream and any running listener and abandons
    /// the outstanding HITL request; the remote agent's own timeout governs
    /// what happens to it server-side. Later calls fail with
    /// `AppError::Cancelled`.
    pub async fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(session_id = %self.session_id, "disconnecting");
        self.scope.cancel();
        self.cancel_stream().await;
        self.hitl.lock().await.abandon();
        self.connection.send_replace(ConnectionState::Disconnected);
    }

    // ── Persistent listener ───────────────────────────────────────────────────

    /// Receiver observing the push connection state.
    #[must_use]
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Keep a push connection open and apply its events until `cancel` fires.
    ///
    /// Unexpected drops and recoverable connect failures are retried with
    /// exponential backoff per the configured policy; a successful connection
    /// resets the attempt counter.
    ///
    /// # Errors
    ///
    /// - `AppError::ReconnectFailed` once attempts are exhausted.
    /// - Any non-recoverable connect error (e.g. `AppError::Protocol`).
    pub async fn listen(&self, connector: &dyn Connector, cancel: &CancellationToken) -> Result<()> {
        self.ensure_open()?;
        let stop = self.scope.child_token();
        let link = {
            let stop = stop.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                stop.cancel();
            })
        };

        let result = self
            .listen_loop(connector, &stop)
            .instrument(info_span!("push_listener", session_id = %self.session_id))
            .await;
        link.abort();
        result
    }

    async fn listen_loop(&self, connector: &dyn Connector, stop: &CancellationToken) -> Result<()> {
        let mut backoff = Backoff::new(self.config.reconnect_policy());
        let mut pipeline = self.pipeline();

        loop {
            let connected = tokio::select! {
                biased;
                () = stop.cancelled() => {
                    self.set_connection(ConnectionState::Disconnected);
                    return Ok(());
                }
                result = connector.connect(&self.session_id) => result,
            };

            match connected {
                Ok(stream) => {
                    backoff.reset();
                    self.set_connection(ConnectionState::Connected);
                    let end = run_reader(
                        &self.session_id,
                        stream,
                        ReaderMode::Persistent,
                        stop,
                        &mut pipeline,
                    )
                    .await;
                    self.set_connection(ConnectionState::Disconnected);
                    match end {
                        StreamEnd::Cancelled | StreamEnd::SinkClosed => return Ok(()),
                        other => warn!(end = ?other, "push connection dropped"),
                    }
                }
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "push connection attempt failed");
                    self.set_connection(ConnectionState::Disconnected);
                }
                Err(err) => {
                    error!(error = %err, "push connection rejected, not retrying");
                    self.set_connection(ConnectionState::Disconnected);
                    return Err(err);
                }
            }

            let Some(delay) = backoff.next_delay() else {
                let attempts = backoff.attempt();
                error!(attempts, "reconnect attempts exhausted");
                self.set_connection(ConnectionState::ReconnectFailed { attempts });
                return Err(AppError::ReconnectFailed { attempts });
            };

            let attempt = backoff.attempt();
            info!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnecting push connection"
            );
            self.set_connection(ConnectionState::Reconnecting { attempt, delay });

            tokio::select! {
                biased;
                () = stop.cancelled() => {
                    self.set_connection(ConnectionState::Disconnected);
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn pipeline(&self) -> SessionPipeline {
        SessionPipeline::new(
            self.session_id.as_str(),
            Arc::clone(&self.state),
            Arc::clone(&self.hitl),
            self.events.clone(),
        )
    }

    fn set_connection(&self, state: ConnectionState) {
        self.connection.send_replace(state);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }
}

impl Drop for AgentClient {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

/// One message stream, consumed on its own task.
struct StreamTask {
    session_id: String,
    message: String,
    transport: Arc<dyn Transport>,
    state: Arc<RwLock<ConversationState>>,
    pipeline: SessionPipeline,
    cancel: CancellationToken,
    previous: Option<JoinHandle<()>>,
}

impl StreamTask {
    async fn run(mut self, outcome_tx: oneshot::Sender<StreamOutcome>) {
        if let Some(previous) = self.previous.take() {
            if let Err(err) = previous.await {
                warn!(error = %err, "superseded stream task ended abnormally");
            }
        }

        let outcome = if self.cancel.is_cancelled() {
            StreamOutcome::Cancelled
        } else {
            self.state.write().await.begin_turn(&self.message);
            self.consume().await
        };

        debug!(outcome = ?outcome, "message stream finished");
        if outcome_tx.send(outcome).is_err() {
            debug!("stream handle dropped before completion");
        }
    }

    async fn consume(&mut self) -> StreamOutcome {
        let opened = self
            .transport
            .open_stream(&self.session_id, &self.message, self.cancel.clone())
            .await;

        let stream = match opened {
            Ok(stream) => stream,
            Err(AppError::Cancelled) => {
                self.state.write().await.interrupt_turn();
                return StreamOutcome::Cancelled;
            }
            Err(err) => {
                warn!(error = %err, "message stream could not be opened");
                self.fail_turn(err.to_string()).await;
                return StreamOutcome::Failed(err);
            }
        };

        let end = run_reader(
            &self.session_id,
            stream,
            ReaderMode::PerMessage,
            &self.cancel,
            &mut self.pipeline,
        )
        .await;

        match end {
            StreamEnd::Completed => StreamOutcome::Completed,
            StreamEnd::Failed(message) => StreamOutcome::Failed(AppError::Application(message)),
            StreamEnd::Cancelled => {
                self.state.write().await.interrupt_turn();
                StreamOutcome::Cancelled
            }
            StreamEnd::Dropped(reason) => {
                warn!(reason = %reason, "message stream dropped");
                self.fail_turn(format!("stream dropped: {reason}")).await;
                StreamOutcome::Failed(AppError::Transport(reason))
            }
            StreamEnd::SinkClosed => {
                self.state.write().await.interrupt_turn();
                StreamOutcome::Failed(AppError::Transport("event sink closed".into()))
            }
        }
    }

    /// Surface a failure as the turn's terminal error event.
    async fn fail_turn(&mut self, message: String) {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(session_id = %self.session_id, "stream error not delivered, cancelled");
            }
            _ = self.pipeline.deliver(DomainEvent::StreamError { message }) => {}
        }
    }
}
