//! Fan-out of normalized events to the named observers of a session.
//!
//! Every event is applied, in this order, to the HITL coordinator (for
//! `HitlRequested`), the conversation state, and finally forwarded on the
//! outbound channel for external observers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, trace};

use crate::session::conversation::ConversationState;
use crate::session::hitl::HitlCoordinator;
use crate::stream::events::DomainEvent;
use crate::stream::reader::EventSink;

/// [`EventSink`] that updates session state before notifying observers.
#[derive(Debug, Clone)]
pub struct SessionPipeline {
    session_id: String,
    state: Arc<RwLock<ConversationState>>,
    hitl: Arc<Mutex<HitlCoordinator>>,
    outbound: mpsc::Sender<DomainEvent>,
}

impl SessionPipeline {
    /// Bind a pipeline to shared session state and the outbound channel.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        state: Arc<RwLock<ConversationState>>,
        hitl: Arc<Mutex<HitlCoordinator>>,
        outbound: mpsc::Sender<DomainEvent>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            state,
            hitl,
            outbound,
        }
    }

    async fn dispatch(&self, event: DomainEvent) {
        trace!(session_id = %self.session_id, event = event.name(), "pipeline: dispatching");

        if let DomainEvent::HitlRequested { request } = &event {
            self.hitl.lock().await.on_request(request.clone());
        }

        self.state.write().await.apply(&event);

        // Observers are optional; a dropped receiver must not stop state updates.
        if self.outbound.send(event).await.is_err() {
            debug!(session_id = %self.session_id, "pipeline: no outbound observer");
        }
    }
}

impl EventSink for SessionPipeline {
    fn deliver(&mut self, event: DomainEvent) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            self.dispatch(event).await;
            true
        })
    }
}
