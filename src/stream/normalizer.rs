//! Maps decoded frames onto the closed set of [`DomainEvent`]s.
//!
//! # Known wire types
//!
//! | Wire type        | Maps to                                            |
//! |------------------|----------------------------------------------------|
//! | `thinking`       | [`DomainEvent::Thinking`]                          |
//! | `llm_response`   | [`DomainEvent::AssistantText`]                     |
//! | `plan`           | [`DomainEvent::PlanUpdated`]                       |
//! | `code_executing` | [`DomainEvent::CodeStarted`]                       |
//! | `code_result`    | [`DomainEvent::CodeFinished`]                      |
//! | `round_complete` | [`DomainEvent::AnswerReady`] when an answer exists |
//! | `done`           | [`DomainEvent::StreamComplete`]                    |
//! | `error`          | [`DomainEvent::StreamError`]                       |
//! | `hitl_request`   | [`DomainEvent::HitlRequested`]                     |
//! | *(any other)*    | Skipped; logged at `DEBUG`                         |

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::models::execution::{ExecutionResult, InlineImage};
use crate::models::hitl::{HitlArtifact, HitlKind, HitlRequest};
use crate::models::plan::PlanState;
use crate::stream::events::{DomainEvent, Frame};
use crate::{AppError, Result};

// ── Wire payloads ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ThinkingParams {
    message: String,
}

#[derive(Debug, Deserialize)]
struct LlmResponseParams {
    content: String,
}

#[derive(Debug, Deserialize)]
struct CodeExecutingParams {
    code: String,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    mime: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct CodeResultParams {
    success: bool,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    images: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
struct RoundCompleteParams {
    #[serde(default)]
    has_answer: bool,
    #[serde(default)]
    answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorParams {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HitlParams {
    request_type: String,
    #[serde(default)]
    plan: Option<Value>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Normalize a single frame into a [`DomainEvent`].
///
/// # Return value
///
/// - `Ok(Some(event))`: the frame maps onto a domain event.
/// - `Ok(None)`: unknown event type, or a `round_complete` without an answer.
/// - `Err(AppError::Decode(...))`: a known type whose payload is missing a
///   required field. Callers drop the frame and keep reading.
///
/// # Errors
///
/// Returns [`AppError::Decode`] when a known payload cannot be interpreted.
pub fn normalize(session_id: &str, frame: Frame) -> Result<Option<DomainEvent>> {
    let Frame { event_type, data } = frame;

    match event_type.as_str() {
        "thinking" => {
            let params: ThinkingParams = parse_params("thinking", data)?;
            Ok(Some(DomainEvent::Thinking {
                message: params.message,
            }))
        }
        "llm_response" => {
            let params: LlmResponseParams = parse_params("llm_response", data)?;
            Ok(Some(DomainEvent::AssistantText {
                content: params.content,
            }))
        }
        "plan" => {
            let plan: PlanState = parse_params("plan", data)?;
            Ok(Some(DomainEvent::PlanUpdated { plan }))
        }
        "code_executing" => {
            let params: CodeExecutingParams = parse_params("code_executing", data)?;
            Ok(Some(DomainEvent::CodeStarted { code: params.code }))
        }
        "code_result" => {
            let params: CodeResultParams = parse_params("code_result", data)?;
            Ok(Some(DomainEvent::CodeFinished {
                result: execution_result(session_id, params),
            }))
        }
        "round_complete" => {
            let params: RoundCompleteParams = parse_params("round_complete", data)?;
            Ok(match params.answer {
                Some(answer) if params.has_answer && !answer.trim().is_empty() => {
                    Some(DomainEvent::AnswerReady { answer })
                }
                _ => None,
            })
        }
        "done" => Ok(Some(DomainEvent::StreamComplete)),
        "error" => {
            let params: ErrorParams = parse_params("error", data)?;
            let message = params
                .error
                .or(params.message)
                .filter(|msg| !msg.trim().is_empty())
                .unwrap_or_else(|| "agent reported an error".to_owned());
            Ok(Some(DomainEvent::StreamError { message }))
        }
        "hitl_request" => {
            let params: HitlParams = parse_params("hitl_request", data)?;
            hitl_request(params).map(|request| Some(DomainEvent::HitlRequested { request }))
        }
        other => {
            debug!(
                event_type = other,
                session_id, "normalizer: skipping unknown event type"
            );
            Ok(None)
        }
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn parse_params<T>(event_type: &str, data: Value) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(data)
        .map_err(|e| AppError::Decode(format!("invalid {event_type} payload: {e}")))
}

/// Build an [`ExecutionResult`], dropping images whose payload is not base64.
fn execution_result(session_id: &str, params: CodeResultParams) -> ExecutionResult {
    let images = params
        .images
        .into_iter()
        .filter_map(|image| {
            let decoded = InlineImage::from_base64(image.mime.as_str(), &image.data);
            if decoded.is_none() {
                debug!(
                    session_id,
                    mime = image.mime.as_str(),
                    "normalizer: dropping undecodable inline image"
                );
            }
            decoded
        })
        .collect();

    ExecutionResult {
        success: params.success,
        stdout: params.stdout,
        error: params.error.filter(|err| !err.is_empty()),
        images,
    }
}

/// Build a [`HitlRequest`]; a missing artifact yields an empty one rather than
/// dropping the request, since the agent stays paused until it hears back.
fn hitl_request(params: HitlParams) -> Result<HitlRequest> {
    let kind = HitlKind::parse(&params.request_type).ok_or_else(|| {
        AppError::Decode(format!(
            "invalid hitl_request payload: unknown request_type `{}`",
            params.request_type
        ))
    })?;

    let artifact = match kind {
        HitlKind::Plan => HitlArtifact::Plan(match params.plan {
            Some(Value::String(text)) => PlanState::from_raw_text(text),
            Some(value @ Value::Object(_)) => serde_json::from_value(value).map_err(|e| {
                AppError::Decode(format!("invalid hitl_request payload: plan: {e}"))
            })?,
            _ => PlanState::default(),
        }),
        HitlKind::Code => HitlArtifact::Code(params.code.unwrap_or_default()),
        HitlKind::Answer => HitlArtifact::Answer(params.answer.unwrap_or_default()),
        HitlKind::Error => HitlArtifact::Error(params.error.unwrap_or_default()),
    };

    Ok(HitlRequest::new(kind, artifact, params.message))
}
