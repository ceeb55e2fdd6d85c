//! Decoded frames and the closed set of domain events derived from them.

use serde::Serialize;
use serde_json::Value;

use crate::models::execution::ExecutionResult;
use crate::models::hitl::HitlRequest;
use crate::models::plan::PlanState;

/// Event type assigned to a payload that arrives without an `event:` line.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// One decoded `(event-type, payload)` unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Value of the most recent `event:` line, or [`DEFAULT_EVENT_TYPE`].
    pub event_type: String,
    /// Parsed JSON payload of the `data:` line.
    pub data: Value,
}

impl Frame {
    /// Construct a frame.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

/// Normalized events emitted to observers, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Transient status text; never persisted to turn history.
    Thinking {
        /// Status message.
        message: String,
    },
    /// Live narrative content for the current turn.
    AssistantText {
        /// Narrative text.
        content: String,
    },
    /// The plan was replaced wholesale.
    PlanUpdated {
        /// New plan.
        plan: PlanState,
    },
    /// A code sub-turn was opened.
    CodeStarted {
        /// Code sent for execution.
        code: String,
    },
    /// The most recently opened code sub-turn was closed.
    CodeFinished {
        /// Execution outcome.
        result: ExecutionResult,
    },
    /// The round produced a final answer.
    AnswerReady {
        /// Answer text.
        answer: String,
    },
    /// No further frames are expected on this stream.
    StreamComplete,
    /// The stream failed; terminal for the current turn.
    StreamError {
        /// Failure description.
        message: String,
    },
    /// The remote agent paused awaiting a local decision.
    HitlRequested {
        /// The pending request.
        request: HitlRequest,
    },
}

impl DomainEvent {
    /// Whether the event ends a per-message stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StreamComplete | Self::StreamError { .. })
    }

    /// Short name used in log fields.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::AssistantText { .. } => "assistant_text",
            Self::PlanUpdated { .. } => "plan_updated",
            Self::CodeStarted { .. } => "code_started",
            Self::CodeFinished { .. } => "code_finished",
            Self::AnswerReady { .. } => "answer_ready",
            Self::StreamComplete => "stream_complete",
            Self::StreamError { .. } => "stream_error",
            Self::HitlRequested { .. } => "hitl_requested",
        }
    }
}
