//! Unit tests for frame to domain event mapping.

use serde_json::json;

use agent_stream::models::hitl::{HitlArtifact, HitlKind};
use agent_stream::stream::events::{DomainEvent, Frame};
use agent_stream::stream::normalizer::normalize;
use agent_stream::AppError;

fn map(event_type: &str, data: serde_json::Value) -> Option<DomainEvent> {
    normalize("s1", Frame::new(event_type, data)).expect("frame must normalize")
}

// ── Known wire types ────────────────────────────────────────────────────────

#[test]
fn thinking_maps_to_thinking() {
    assert_eq!(
        map("thinking", json!({"message": "Analyzing"})),
        Some(DomainEvent::Thinking {
            message: "Analyzing".into()
        })
    );
}

#[test]
fn llm_response_maps_to_assistant_text() {
    assert_eq!(
        map("llm_response", json!({"content": "Hi"})),
        Some(DomainEvent::AssistantText { content: "Hi".into() })
    );
}

#[test]
fn plan_maps_to_plan_updated_with_all_fields() {
    let event = map(
        "plan",
        json!({
            "steps": [
                {"number": 1, "description": "load", "completed": true},
                {"number": 2, "description": "fit"}
            ],
            "raw_text": "1. load\n2. fit",
            "completed_steps": 1,
            "total_steps": 2
        }),
    );

    let Some(DomainEvent::PlanUpdated { plan }) = event else {
        panic!("expected PlanUpdated, got {event:?}");
    };
    assert_eq!(plan.steps.len(), 2);
    assert!(plan.steps[0].completed);
    assert!(!plan.steps[1].completed);
    assert_eq!(plan.raw_text, "1. load\n2. fit");
    assert!((plan.progress() - 0.5).abs() < f64::EPSILON);
}

#[test]
fn code_executing_maps_to_code_started() {
    assert_eq!(
        map("code_executing", json!({"code": "1+1"})),
        Some(DomainEvent::CodeStarted { code: "1+1".into() })
    );
}

#[test]
fn code_result_maps_to_code_finished() {
    let event = map("code_result", json!({"success": true, "stdout": "2"}));
    let Some(DomainEvent::CodeFinished { result }) = event else {
        panic!("expected CodeFinished, got {event:?}");
    };
    assert!(result.success);
    assert_eq!(result.stdout, "2");
    assert!(result.error.is_none());
    assert!(result.images.is_empty());
}

/// Images are base64-decoded; an undecodable image is dropped and the rest
/// of the result is kept.
#[test]
fn code_result_decodes_images_and_drops_bad_ones() {
    let event = map(
        "code_result",
        json!({
            "success": false,
            "stdout": "",
            "error": "ZeroDivisionError",
            "images": [
                {"mime": "image/png", "data": "iVBORw0KGgo="},
                {"mime": "image/png", "data": "***not base64***"}
            ]
        }),
    );
    let Some(DomainEvent::CodeFinished { result }) = event else {
        panic!("expected CodeFinished, got {event:?}");
    };
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("ZeroDivisionError"));
    assert_eq!(result.images.len(), 1);
    assert_eq!(result.images[0].mime, "image/png");
    assert_eq!(result.images[0].data, b"\x89PNG\r\n\x1a\n".to_vec());
}

#[test]
fn round_complete_with_answer_maps_to_answer_ready() {
    assert_eq!(
        map("round_complete", json!({"has_answer": true, "answer": "42"})),
        Some(DomainEvent::AnswerReady { answer: "42".into() })
    );
}

#[test]
fn round_complete_without_answer_maps_to_nothing() {
    assert_eq!(map("round_complete", json!({"has_answer": false})), None);
    assert_eq!(map("round_complete", json!({"has_answer": true, "answer": "  "})), None);
    assert_eq!(map("round_complete", json!({"has_answer": false, "answer": "ignored"})), None);
}

#[test]
fn done_maps_to_stream_complete() {
    assert_eq!(map("done", json!({})), Some(DomainEvent::StreamComplete));
}

#[test]
fn error_uses_error_field_then_message_then_fallback() {
    assert_eq!(
        map("error", json!({"error": "quota exceeded"})),
        Some(DomainEvent::StreamError {
            message: "quota exceeded".into()
        })
    );
    assert_eq!(
        map("error", json!({"message": "kernel died"})),
        Some(DomainEvent::StreamError {
            message: "kernel died".into()
        })
    );
    assert_eq!(
        map("error", json!({})),
        Some(DomainEvent::StreamError {
            message: "agent reported an error".into()
        })
    );
}

// ── HITL requests ───────────────────────────────────────────────────────────

#[test]
fn hitl_request_for_code_carries_code_and_prompt() {
    let event = map(
        "hitl_request",
        json!({"request_type": "code", "code": "rm -rf /tmp/x", "message": "Run this?"}),
    );
    let Some(DomainEvent::HitlRequested { request }) = event else {
        panic!("expected HitlRequested, got {event:?}");
    };
    assert_eq!(request.kind, HitlKind::Code);
    assert_eq!(request.artifact, HitlArtifact::Code("rm -rf /tmp/x".into()));
    assert_eq!(request.prompt.as_deref(), Some("Run this?"));
    assert!(!request.id.is_empty());
}

#[test]
fn hitl_request_plan_accepts_text_or_object() {
    let from_text = map("hitl_request", json!({"request_type": "plan", "plan": "1. a\n2. b"}));
    let Some(DomainEvent::HitlRequested { request }) = from_text else {
        panic!("expected HitlRequested");
    };
    let HitlArtifact::Plan(plan) = request.artifact else {
        panic!("expected plan artifact");
    };
    assert_eq!(plan.raw_text, "1. a\n2. b");

    let from_object = map(
        "hitl_request",
        json!({"request_type": "plan", "plan": {"raw_text": "x", "total_steps": 1}}),
    );
    let Some(DomainEvent::HitlRequested { request }) = from_object else {
        panic!("expected HitlRequested");
    };
    let HitlArtifact::Plan(plan) = request.artifact else {
        panic!("expected plan artifact");
    };
    assert_eq!(plan.total_steps, 1);
}

#[test]
fn hitl_request_error_kind_carries_error_text() {
    let event = map("hitl_request", json!({"request_type": "error", "error": "NameError"}));
    let Some(DomainEvent::HitlRequested { request }) = event else {
        panic!("expected HitlRequested");
    };
    assert_eq!(request.kind, HitlKind::Error);
    assert_eq!(request.artifact, HitlArtifact::Error("NameError".into()));
}

#[test]
fn hitl_request_with_unknown_kind_is_a_decode_error() {
    let err = normalize(
        "s1",
        Frame::new("hitl_request", json!({"request_type": "vibes"})),
    )
    .expect_err("unknown request_type must fail");
    assert!(matches!(err, AppError::Decode(_)));
}

// ── Unknown and malformed ───────────────────────────────────────────────────

#[test]
fn unknown_type_is_skipped() {
    assert_eq!(map("message", json!({"x": 1})), None);
    assert_eq!(map("heartbeat", json!({})), None);
}

#[test]
fn missing_required_field_is_a_decode_error() {
    let err = normalize("s1", Frame::new("llm_response", json!({"text": "wrong key"})))
        .expect_err("missing content must fail");
    assert!(matches!(err, AppError::Decode(msg) if msg.contains("llm_response")));
}
