//! Unit tests for plan, session, turn, and execution models.

use agent_stream::models::execution::{CodeExecution, ExecutionResult, InlineImage};
use agent_stream::models::hitl::{HitlAction, HitlKind};
use agent_stream::models::plan::PlanState;
use agent_stream::models::session::{HitlMode, Session, SessionStatus, SessionUpdate};
use agent_stream::models::turn::Turn;

fn plan(completed: u32, total: u32) -> PlanState {
    PlanState {
        completed_steps: completed,
        total_steps: total,
        ..PlanState::default()
    }
}

// ── PlanState ───────────────────────────────────────────────────────────────

#[test]
fn progress_is_completed_over_total() {
    assert!((plan(2, 3).progress() - 2.0 / 3.0).abs() < f64::EPSILON);
}

#[test]
fn empty_plan_reports_zero_progress() {
    assert!(plan(0, 0).progress().abs() < f64::EPSILON);
    assert!(!plan(0, 0).is_finished());
}

#[test]
fn progress_is_clamped_to_one() {
    assert!((plan(5, 3).progress() - 1.0).abs() < f64::EPSILON);
    assert!(plan(3, 3).is_finished());
}

#[test]
fn raw_text_plan_has_no_steps() {
    let plan = PlanState::from_raw_text("1. think");
    assert_eq!(plan.raw_text, "1. think");
    assert!(plan.steps.is_empty());
}

// ── Session ─────────────────────────────────────────────────────────────────

#[test]
fn new_session_defaults() {
    let session = Session::new("abc", "demo");
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.hitl_mode, HitlMode::None);
    assert!(session.model.is_none());
}

#[test]
fn apply_update_changes_only_present_fields() {
    let mut session = Session::new("abc", "demo");
    session.model = Some("m1".into());

    session.apply_update(&SessionUpdate {
        hitl_mode: Some(HitlMode::PlanAndAnswer),
        ..SessionUpdate::default()
    });

    assert_eq!(session.name, "demo");
    assert_eq!(session.model.as_deref(), Some("m1"));
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.hitl_mode, HitlMode::PlanAndAnswer);
}

#[test]
fn empty_update_is_detected() {
    assert!(SessionUpdate::default().is_empty());
    assert!(!SessionUpdate {
        name: Some("x".into()),
        ..SessionUpdate::default()
    }
    .is_empty());
}

// ── Turn and execution ──────────────────────────────────────────────────────

#[test]
fn sub_turns_close_independently() {
    let mut turn = Turn::with_user_message("run it");
    turn.executions.push(CodeExecution::started("a = 1"));
    turn.executions.push(CodeExecution {
        code: "1+1".into(),
        result: Some(ExecutionResult {
            success: true,
            stdout: "2".into(),
            ..ExecutionResult::default()
        }),
    });

    let last = turn.executions.last().expect("two sub-turns");
    assert_eq!(last.code, "1+1");
    assert_eq!(last.result.as_ref().map(|r| r.stdout.as_str()), Some("2"));
    assert!(!turn.executions[0].is_finished());
    assert!(turn.executions[1].is_finished());
}

#[test]
fn inline_image_rejects_invalid_base64() {
    assert!(InlineImage::from_base64("image/png", "%%%").is_none());
    let image = InlineImage::from_base64("image/png", "aGk=").expect("valid base64");
    assert_eq!(image.data, b"hi");
}

#[test]
fn inline_image_serializes_data_as_base64() {
    let image = InlineImage {
        mime: "image/png".into(),
        data: b"hi".to_vec(),
    };
    let json = serde_json::to_value(&image).expect("serialize");
    assert_eq!(json["data"], "aGk=");
}

// ── HITL enums ──────────────────────────────────────────────────────────────

#[test]
fn hitl_keywords_parse() {
    assert_eq!(HitlKind::parse("plan"), Some(HitlKind::Plan));
    assert_eq!(HitlKind::parse("PLAN"), None);
    assert_eq!(HitlAction::parse("feedback"), Some(HitlAction::Feedback));
    assert_eq!(HitlAction::parse("yes"), None);
    assert_eq!(HitlAction::Modify.as_str(), "modify");
}
