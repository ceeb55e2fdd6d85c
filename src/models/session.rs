//! Session model and partial-update helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status for a remote agent session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session accepting messages.
    #[default]
    Active,
    /// Session finished its work.
    Completed,
    /// Session ended in an unrecoverable error.
    Error,
    /// Session retained read-only.
    Archived,
}

/// When the remote agent must pause for a local decision.
///
/// Stored on the session; a change applies to subsequent agent rounds only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HitlMode {
    /// Never pause.
    #[default]
    None,
    /// Pause for plan approval only.
    PlanOnly,
    /// Pause for plans, code, and answers.
    Full,
    /// Pause for plans and final answers.
    PlanAndAnswer,
    /// Pause only when execution fails.
    OnError,
}

/// Session identity and server-authoritative settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    /// Opaque server-assigned identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Current lifecycle status.
    #[serde(default)]
    pub status: SessionStatus,
    /// Model identifier the agent runs with.
    #[serde(default)]
    pub model: Option<String>,
    /// Approval mode for subsequent rounds.
    #[serde(default)]
    pub hitl_mode: HitlMode,
    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Construct a local view of an existing remote session.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            status: SessionStatus::Active,
            model: None,
            hitl_mode: HitlMode::None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge the present fields of `update` into this session.
    pub fn apply_update(&mut self, update: &SessionUpdate) {
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(model) = &update.model {
            self.model = Some(model.clone());
        }
        if let Some(mode) = update.hitl_mode {
            self.hitl_mode = mode;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial session update; only present fields change server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionUpdate {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New lifecycle status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    /// New model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// New approval mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hitl_mode: Option<HitlMode>,
}

impl SessionUpdate {
    /// Whether the update carries no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.status.is_none()
            && self.model.is_none()
            && self.hitl_mode.is_none()
    }
}
