//! Helpers for the `agent-stream` command-line surface.
//!
//! Kept in the library so decision parsing is testable without a terminal.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::hitl::{HitlAction, HitlKind, HitlPayload};

/// Log output format selected with `--log-format`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines. Default.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Parse a decision typed at the HITL prompt.
///
/// Accepted forms: `approve [msg]`, `reject [msg]`, `retry [msg]`,
/// `skip [msg]`, `feedback <text>`, and `modify <text>`. For `modify` the
/// text becomes the edited plan or edited code depending on `kind`; the
/// coordinator still has the final say on whether the pair is valid.
///
/// Returns `None` for an empty line or unknown keyword.
#[must_use]
pub fn parse_decision(line: &str, kind: HitlKind) -> Option<(HitlAction, HitlPayload)> {
    let line = line.trim();
    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    };
    let action = HitlAction::parse(&keyword.to_ascii_lowercase())?;
    let text = (!rest.is_empty()).then(|| rest.to_owned());

    let payload = match (action, kind) {
        (HitlAction::Modify, HitlKind::Plan) => HitlPayload {
            modified_plan: text,
            ..HitlPayload::default()
        },
        (HitlAction::Modify, _) => HitlPayload {
            modified_code: text,
            ..HitlPayload::default()
        },
        _ => HitlPayload {
            message: text,
            ..HitlPayload::default()
        },
    };
    Some((action, payload))
}
