//! Human-in-the-loop coordinator.
//!
//! A two-state machine: [`HitlState::Idle`] or
//! [`HitlState::AwaitingDecision`]. At most one request is outstanding per
//! session; the state enum makes a second concurrent request
//! unrepresentable.
//!
//! # Overlapping requests
//!
//! A `hitl_request` that arrives while another is still outstanding
//! replaces it (latest request wins). The displaced request is logged at
//! `WARN`, counted, and kept in a bounded log so it is never lost silently.
//! No response is ever sent for a displaced request.

use std::collections::VecDeque;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::hitl::{HitlAction, HitlKind, HitlPayload, HitlRequest, HitlResponse};
use crate::{AppError, Result};

/// Displaced requests retained for inspection.
pub const SUPERSEDED_LOG_CAPACITY: usize = 16;

/// Observable coordinator state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HitlState {
    /// No decision outstanding.
    #[default]
    Idle,
    /// The remote agent is paused awaiting a decision on this request.
    AwaitingDecision(HitlRequest),
}

impl HitlState {
    /// The outstanding request, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&HitlRequest> {
        match self {
            Self::Idle => None,
            Self::AwaitingDecision(request) => Some(request),
        }
    }
}

/// Per-session HITL state machine.
#[derive(Debug)]
pub struct HitlCoordinator {
    session_id: String,
    state: watch::Sender<HitlState>,
    superseded: VecDeque<HitlRequest>,
    superseded_total: u64,
}

impl HitlCoordinator {
    /// Create an idle coordinator for `session_id`.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(HitlState::Idle);
        Self {
            session_id: session_id.into(),
            state,
            superseded: VecDeque::with_capacity(SUPERSEDED_LOG_CAPACITY),
            superseded_total: 0,
        }
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HitlState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> HitlState {
        self.state.borrow().clone()
    }

    /// The outstanding request, cloned.
    #[must_use]
    pub fn pending(&self) -> Option<HitlRequest> {
        self.state.borrow().pending().cloned()
    }

    /// Record an incoming request, moving to `AwaitingDecision`.
    ///
    /// Returns the request it displaced, if one was outstanding.
    pub fn on_request(&mut self, request: HitlRequest) -> Option<HitlRequest> {
        info!(
            session_id = %self.session_id,
            request_id = %request.id,
            kind = request.kind.as_str(),
            "hitl: agent awaiting decision"
        );

        let previous = self.state.send_replace(HitlState::AwaitingDecision(request));
        let HitlState::AwaitingDecision(displaced) = previous else {
            return None;
        };

        warn!(
            session_id = %self.session_id,
            displaced_id = %displaced.id,
            displaced_kind = displaced.kind.as_str(),
            "hitl: new request arrived while one was outstanding, latest wins"
        );
        if self.superseded.len() == SUPERSEDED_LOG_CAPACITY {
            self.superseded.pop_front();
        }
        self.superseded.push_back(displaced.clone());
        self.superseded_total += 1;
        Some(displaced)
    }

    /// Return to `Idle` after the response for `request_id` was delivered.
    ///
    /// A mismatched id means a newer request arrived while the response was
    /// in flight; that newer request stays outstanding.
    pub fn complete(&mut self, request_id: &str) -> bool {
        let matches = self
            .state
            .borrow()
            .pending()
            .is_some_and(|pending| pending.id == request_id);

        if matches {
            self.state.send_replace(HitlState::Idle);
            debug!(session_id = %self.session_id, request_id, "hitl: decision delivered");
        } else {
            debug!(
                session_id = %self.session_id,
                request_id,
                "hitl: completed request no longer outstanding"
            );
        }
        matches
    }

    /// Drop the outstanding request without responding.
    ///
    /// Used on disconnect or session switch; the remote agent's own timeout
    /// governs what happens server-side.
    pub fn abandon(&mut self) -> Option<HitlRequest> {
        let previous = self.state.send_replace(HitlState::Idle);
        let HitlState::AwaitingDecision(request) = previous else {
            return None;
        };
        info!(
            session_id = %self.session_id,
            request_id = %request.id,
            "hitl: outstanding request abandoned"
        );
        Some(request)
    }

    /// Abandon any outstanding request and bind to another session.
    pub fn rebind(&mut self, session_id: impl Into<String>) -> Option<HitlRequest> {
        let abandoned = self.abandon();
        self.session_id = session_id.into();
        self.superseded.clear();
        self.superseded_total = 0;
        abandoned
    }

    /// Recently displaced requests, oldest first.
    #[must_use]
    pub fn superseded(&self) -> Vec<HitlRequest> {
        self.superseded.iter().cloned().collect()
    }

    /// Total number of requests displaced since creation.
    #[must_use]
    pub fn superseded_total(&self) -> u64 {
        self.superseded_total
    }
}

/// Check `action` and `payload` against the outstanding `request`.
///
/// # Rules
///
/// - `modify` on a plan request must carry a non-empty `modified_plan` and
///   no `modified_code`; on a code request the reverse. Answer and error
///   requests cannot be modified.
/// - `feedback` must carry a non-empty message.
/// - `approve`, `reject`, `retry` and `skip` carry an optional message only.
///
/// # Errors
///
/// Returns [`AppError::HitlViolation`] describing the first broken rule.
pub fn validate_response(
    request: &HitlRequest,
    action: HitlAction,
    payload: HitlPayload,
) -> Result<HitlResponse> {
    let HitlPayload {
        message,
        modified_plan,
        modified_code,
    } = payload;
    let message = message.filter(|text| !text.trim().is_empty());

    match action {
        HitlAction::Modify => match request.kind {
            HitlKind::Plan => {
                if modified_code.is_some() {
                    return Err(violation("modify on a plan request cannot carry modified code"));
                }
                if is_blank(modified_plan.as_deref()) {
                    return Err(violation("modify on a plan request requires modified plan text"));
                }
            }
            HitlKind::Code => {
                if modified_plan.is_some() {
                    return Err(violation("modify on a code request cannot carry a modified plan"));
                }
                if is_blank(modified_code.as_deref()) {
                    return Err(violation("modify on a code request requires modified code text"));
                }
            }
            kind @ (HitlKind::Answer | HitlKind::Error) => {
                return Err(AppError::HitlViolation(format!(
                    "modify is not accepted for {} requests",
                    kind.as_str()
                )));
            }
        },
        HitlAction::Feedback => {
            if message.is_none() {
                return Err(violation("feedback requires a non-empty message"));
            }
            if modified_plan.is_some() || modified_code.is_some() {
                return Err(violation("feedback carries a message only"));
            }
        }
        HitlAction::Approve | HitlAction::Reject | HitlAction::Retry | HitlAction::Skip => {
            if modified_plan.is_some() || modified_code.is_some() {
                return Err(AppError::HitlViolation(format!(
                    "{} carries an optional message only",
                    action.as_str()
                )));
            }
        }
    }

    Ok(HitlResponse {
        action,
        message,
        modified_plan,
        modified_code,
    })
}

fn violation(msg: &str) -> AppError {
    AppError::HitlViolation(msg.to_owned())
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|text| text.trim().is_empty())
}
