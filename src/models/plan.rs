//! Execution plan snapshot.

use serde::{Deserialize, Serialize};

/// A single step of the agent's plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PlanStep {
    /// 1-based position in the plan.
    pub number: u32,
    /// What the agent intends to do.
    pub description: String,
    /// Whether the step has finished.
    #[serde(default)]
    pub completed: bool,
}

/// The agent's current plan, replaced wholesale on every `plan` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PlanState {
    /// Ordered steps.
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    /// Plan as the agent wrote it.
    #[serde(default)]
    pub raw_text: String,
    /// Number of finished steps as reported by the agent.
    #[serde(default)]
    pub completed_steps: u32,
    /// Total number of steps as reported by the agent.
    #[serde(default)]
    pub total_steps: u32,
}

impl PlanState {
    /// Build a plan that only carries its textual form.
    #[must_use]
    pub fn from_raw_text(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            ..Self::default()
        }
    }

    /// Completion fraction in `[0.0, 1.0]`; an empty plan reports `0.0`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        let done = self.completed_steps.min(self.total_steps);
        f64::from(done) / f64::from(self.total_steps)
    }

    /// Whether every step has been completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.total_steps > 0 && self.completed_steps >= self.total_steps
    }
}
