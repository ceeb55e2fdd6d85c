//! Session and conversation state derived from domain events.
//!
//! [`ConversationState`] owns the session view, the current plan, and the
//! turn history. It is mutated only by [`apply`](ConversationState::apply)
//! (live events), [`replay`](ConversationState::replay) (history), and the
//! turn boundaries the client drives. Observers read cloned snapshots.

use tracing::{debug, warn};

use crate::models::execution::CodeExecution;
use crate::models::plan::PlanState;
use crate::models::session::{Session, SessionUpdate};
use crate::models::turn::{HistoryMessage, MessageRole, Turn};
use crate::stream::events::DomainEvent;

/// Separator placed between successive narrative fragments of one turn.
const CONTENT_SEPARATOR: &str = "\n\n";

/// Client-owned state of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    session: Session,
    plan: Option<PlanState>,
    turns: Vec<Turn>,
    current: Option<Turn>,
    thinking: Option<String>,
}

impl ConversationState {
    /// Empty state for `session`.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session,
            plan: None,
            turns: Vec::new(),
            current: None,
            thinking: None,
        }
    }

    /// Session view.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current plan, replaced wholesale on every plan event.
    #[must_use]
    pub fn plan(&self) -> Option<&PlanState> {
        self.plan.as_ref()
    }

    /// Finished turns, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turn being assembled from the live stream.
    #[must_use]
    pub fn current_turn(&self) -> Option<&Turn> {
        self.current.as_ref()
    }

    /// Latest transient status text.
    #[must_use]
    pub fn thinking(&self) -> Option<&str> {
        self.thinking.as_deref()
    }

    /// Open a turn for a message the user just sent.
    ///
    /// A turn still open from an earlier stream is archived as incomplete.
    pub fn begin_turn(&mut self, user_message: &str) {
        self.archive_current();
        self.current = Some(Turn::with_user_message(user_message));
        self.thinking = None;
    }

    /// Archive the open turn as incomplete after a cancelled stream.
    pub fn interrupt_turn(&mut self) {
        self.archive_current();
        self.thinking = None;
    }

    /// Merge a server-confirmed session update.
    pub fn merge_session(&mut self, session: Session) {
        self.session = session;
    }

    /// Apply a partial update locally.
    pub fn apply_session_update(&mut self, update: &SessionUpdate) {
        self.session.apply_update(update);
    }

    /// Apply one live event in arrival order.
    pub fn apply(&mut self, event: &DomainEvent) {
        match event {
            DomainEvent::Thinking { message } => {
                self.thinking = Some(message.clone());
            }
            DomainEvent::AssistantText { content } => {
                append_content(self.current_mut(), content);
            }
            DomainEvent::PlanUpdated { plan } => {
                self.plan = Some(plan.clone());
                self.current_mut().plan = Some(plan.clone());
            }
            DomainEvent::CodeStarted { code } => {
                self.current_mut().executions.push(CodeExecution::started(code.as_str()));
            }
            DomainEvent::CodeFinished { result } => {
                let session_id = self.session.id.clone();
                let turn = self.current_mut();
                if let Some(open) = turn.executions.iter_mut().rev().find(|exec| !exec.is_finished()) {
                    open.result = Some(result.clone());
                } else {
                    warn!(session_id, "conversation: code result without an open code sub-turn");
                    turn.executions.push(CodeExecution {
                        code: String::new(),
                        result: Some(result.clone()),
                    });
                }
            }
            DomainEvent::AnswerReady { answer } => {
                let turn = self.current_mut();
                // Only a whole trailing fragment counts.
                let already_present = turn.assistant_content.as_deref().is_some_and(|content| {
                    content == answer.as_str()
                        || content
                            .strip_suffix(answer.as_str())
                            .is_some_and(|head| head.ends_with(CONTENT_SEPARATOR))
                });
                if !already_present {
                    append_content(turn, answer);
                }
            }
            DomainEvent::StreamComplete => {
                if let Some(mut turn) = self.current.take() {
                    turn.is_complete = true;
                    self.turns.push(turn);
                }
                self.thinking = None;
            }
            DomainEvent::StreamError { message } => {
                let turn = self.current_mut();
                turn.error = Some(message.clone());
                self.archive_current();
                self.thinking = None;
            }
            DomainEvent::HitlRequested { .. } => {
                debug!(session_id = %self.session.id, "conversation: agent paused for a decision");
            }
        }
    }

    /// Rebuild the turn history from stored messages.
    ///
    /// A user message opens a turn; assistant messages fill it in. Every
    /// replayed turn is complete. Replaces any existing history.
    pub fn replay(&mut self, messages: Vec<HistoryMessage>) {
        self.turns.clear();
        self.current = None;
        self.thinking = None;

        let mut open: Option<Turn> = None;
        for message in messages {
            match message.role {
                MessageRole::User => {
                    if let Some(mut turn) = open.take() {
                        turn.is_complete = true;
                        self.turns.push(turn);
                    }
                    open = Some(Turn::with_user_message(message.content));
                }
                MessageRole::Assistant => {
                    let turn = open.get_or_insert_with(Turn::default);
                    if !message.content.trim().is_empty() {
                        append_content(turn, &message.content);
                    }
                    if let Some(code) = message.code {
                        turn.executions.push(CodeExecution {
                            code,
                            result: message.result,
                        });
                    } else if let Some(result) = message.result {
                        turn.executions.push(CodeExecution {
                            code: String::new(),
                            result: Some(result),
                        });
                    }
                    if let Some(plan) = message.plan {
                        self.plan = Some(plan.clone());
                        turn.plan = Some(plan);
                    }
                }
            }
        }

        if let Some(mut turn) = open {
            turn.is_complete = true;
            self.turns.push(turn);
        }
        debug!(session_id = %self.session.id, turns = self.turns.len(), "conversation: history replayed");
    }

    /// Drop all turns and the plan, keeping the session view.
    pub fn clear(&mut self) {
        self.plan = None;
        self.turns.clear();
        self.current = None;
        self.thinking = None;
    }

    fn current_mut(&mut self) -> &mut Turn {
        self.current.get_or_insert_with(Turn::default)
    }

    fn archive_current(&mut self) {
        if let Some(turn) = self.current.take() {
            self.turns.push(turn);
        }
    }
}

fn append_content(turn: &mut Turn, text: &str) {
    match turn.assistant_content.as_mut() {
        Some(existing) if !existing.is_empty() => {
            existing.push_str(CONTENT_SEPARATOR);
            existing.push_str(text);
        }
        _ => turn.assistant_content = Some(text.to_owned()),
    }
}
