//! Conversation turns and historical messages.

use serde::{Deserialize, Serialize};

use crate::models::execution::{CodeExecution, ExecutionResult};
use crate::models::plan::PlanState;

/// One round of the conversation. Append-only once completed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Turn {
    /// Message the user sent to start the round.
    #[serde(default)]
    pub user_message: Option<String>,
    /// Narrative content written by the assistant.
    #[serde(default)]
    pub assistant_content: Option<String>,
    /// Code sub-turns in the order they were opened.
    #[serde(default)]
    pub executions: Vec<CodeExecution>,
    /// Plan snapshot current when the round ended.
    #[serde(default)]
    pub plan: Option<PlanState>,
    /// Whether the round has finished.
    #[serde(default)]
    pub is_complete: bool,
    /// Application error that ended the round, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Turn {
    /// Start a round with the user's message.
    #[must_use]
    pub fn with_user_message(message: impl Into<String>) -> Self {
        Self {
            user_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Speaker of a stored message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Sent by the user.
    User,
    /// Written by the agent.
    Assistant,
}

/// A persisted message returned by the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HistoryMessage {
    /// Speaker.
    pub role: MessageRole,
    /// Text content.
    #[serde(default)]
    pub content: String,
    /// Code executed in this message, if any.
    #[serde(default)]
    pub code: Option<String>,
    /// Result of `code`, if it ran.
    #[serde(default)]
    pub result: Option<ExecutionResult>,
    /// Plan snapshot attached to the message.
    #[serde(default)]
    pub plan: Option<PlanState>,
}
