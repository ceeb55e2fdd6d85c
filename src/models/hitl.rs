//! Human-in-the-loop request and response model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::plan::PlanState;

/// The kind of decision the remote agent is waiting for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HitlKind {
    /// Approve the proposed plan.
    Plan,
    /// Approve code before it runs.
    Code,
    /// Approve the final answer.
    Answer,
    /// Decide how to proceed after a failure.
    Error,
}

impl HitlKind {
    /// Parse the wire `request_type` value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "plan" => Self::Plan,
            "code" => Self::Code,
            "answer" => Self::Answer,
            "error" => Self::Error,
            _ => return None,
        })
    }

    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Code => "code",
            Self::Answer => "answer",
            Self::Error => "error",
        }
    }
}

/// The artifact under review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HitlArtifact {
    /// Plan snapshot.
    Plan(PlanState),
    /// Code text.
    Code(String),
    /// Answer text.
    Answer(String),
    /// Error text.
    Error(String),
}

/// A pending request for a local decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HitlRequest {
    /// Locally assigned correlation identifier.
    pub id: String,
    /// Decision kind.
    pub kind: HitlKind,
    /// Artifact under review.
    pub artifact: HitlArtifact,
    /// Optional human-readable prompt from the agent.
    pub prompt: Option<String>,
    /// When the request was received.
    pub received_at: DateTime<Utc>,
}

impl HitlRequest {
    /// Construct a request with a fresh identifier.
    #[must_use]
    pub fn new(kind: HitlKind, artifact: HitlArtifact, prompt: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            artifact,
            prompt,
            received_at: Utc::now(),
        }
    }
}

/// Decision taken by the human.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HitlAction {
    /// Let the agent continue as proposed.
    Approve,
    /// Refuse the proposal.
    Reject,
    /// Continue with an edited plan or edited code.
    Modify,
    /// Ask the agent to try again.
    Retry,
    /// Skip the current step.
    Skip,
    /// Send free-text guidance.
    Feedback,
}

impl HitlAction {
    /// Parse a decision keyword.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "approve" => Self::Approve,
            "reject" => Self::Reject,
            "modify" => Self::Modify,
            "retry" => Self::Retry,
            "skip" => Self::Skip,
            "feedback" => Self::Feedback,
            _ => return None,
        })
    }

    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Modify => "modify",
            Self::Retry => "retry",
            Self::Skip => "skip",
            Self::Feedback => "feedback",
        }
    }
}

/// Action-specific payload accompanying a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HitlPayload {
    /// Free-text message.
    pub message: Option<String>,
    /// Edited plan text, for `modify` on a plan request.
    pub modified_plan: Option<String>,
    /// Edited code text, for `modify` on a code request.
    pub modified_code: Option<String>,
}

impl HitlPayload {
    /// Payload with only a free-text message.
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::default()
        }
    }

    /// Payload carrying an edited plan.
    #[must_use]
    pub fn modified_plan(plan: impl Into<String>) -> Self {
        Self {
            modified_plan: Some(plan.into()),
            ..Self::default()
        }
    }

    /// Payload carrying edited code.
    #[must_use]
    pub fn modified_code(code: impl Into<String>) -> Self {
        Self {
            modified_code: Some(code.into()),
            ..Self::default()
        }
    }
}

/// Outbound response consuming the outstanding request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HitlResponse {
    /// Decision taken.
    pub action: HitlAction,
    /// Free-text message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Edited plan text, only for `modify` on a plan request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_plan: Option<String>,
    /// Edited code text, only for `modify` on a code request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_code: Option<String>,
}
