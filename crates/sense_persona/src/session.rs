//! One trainee-vs-persona conversation.
//!
//! `ACTIVE` until an end reason is recorded, then terminal. Each trainee turn
//! runs the full pipeline: count, fire events, ask the oracle, parse
//! leniently, update trust and concerns, check success, check the low-trust
//! walk-away, then classify the end in fixed priority order.

use crate::events;
use crate::goals::SuccessCheck;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sense_core::{
    Difficulty, GoalsConfig, MentalState, Profile, Scenario, ScenarioEvent, MAX_TRUST, MIN_TRUST,
};
use sense_reasoning::{
    is_diagnostic, parse_reply, ChatMessage, OpeningReply, Oracle, OracleBudget, ParsedReply,
    PersonaContext, PersonaReply, PromptBuilder,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Initial trust for every new session.
pub const INITIAL_TRUST: i32 = 1;

/// `quit_reason` attached when trust falls to the walk-away floor.
pub const LOW_TRUST_QUIT: &str = "lost_interest_low_trust";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Success,
    UserQuit,
    TrustFull,
    ConcernsFull,
    MaxTurns,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Success => "success",
            EndReason::UserQuit => "user_quit",
            EndReason::TrustFull => "trust_full",
            EndReason::ConcernsFull => "concerns_full",
            EndReason::MaxTurns => "max_turns",
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured context for the end reason. Only the fields relevant to the
/// reason are filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quit_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quit_explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_trust: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trust_change: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concerns_addressed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_concerns: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
}

impl EndDetail {
    pub fn is_empty(&self) -> bool {
        *self == EndDetail::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Trainee,
    Persona,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_thought: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_change: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    fn trainee(content: &str) -> Self {
        Self {
            speaker: Speaker::Trainee,
            content: content.to_string(),
            inner_thought: None,
            trust_change: None,
            timestamp: Utc::now(),
        }
    }

    fn persona(content: &str, inner_thought: &str, trust_change: Option<i32>) -> Self {
        Self {
            speaker: Speaker::Persona,
            content: content.to_string(),
            inner_thought: Some(inner_thought.to_string()),
            trust_change,
            timestamp: Utc::now(),
        }
    }

    fn as_chat_message(&self) -> ChatMessage {
        match self.speaker {
            Speaker::Trainee => ChatMessage::user(&self.content),
            Speaker::Persona => ChatMessage::assistant(&self.content),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("消息不能为空")]
    EmptyMessage,
    #[error("会话已结束（{0}）")]
    Ended(EndReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpeningLine {
    pub response: String,
    pub inner_thought: String,
    /// False when the template fallback was used.
    pub generated: bool,
}

/// Everything a front end needs after one trainee turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub response: String,
    pub inner_thought: String,
    pub trust_change: i32,
    pub concern_addressed: Option<String>,
    pub is_ended: bool,
    pub end_reason: Option<EndReason>,
    pub end_detail: EndDetail,
    /// Events that became active on this turn.
    pub triggered_events: Vec<String>,
    /// False when the oracle reply could not be parsed and the neutral reply was used.
    #[serde(skip)]
    pub parsed: bool,
}

impl TurnOutcome {
    /// Neutral reply substituted when a turn faults unexpectedly.
    pub fn interrupted() -> Self {
        Self {
            response: "嗯...让我想想...".to_string(),
            inner_thought: "（系统处理中）".to_string(),
            trust_change: 0,
            concern_addressed: None,
            is_ended: false,
            end_reason: None,
            end_detail: EndDetail::default(),
            triggered_events: Vec::new(),
            parsed: false,
        }
    }
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub profile: Profile,
    pub scenario: Option<Scenario>,
    pub mental_state: Option<MentalState>,
    pub turn_count: u32,
    pub trust_level: i32,
    pub trust_threshold: i32,
    pub concerns_addressed: Vec<String>,
    pub total_concerns: usize,
    pub is_convinced: bool,
    pub messages: Vec<HistoryEntry>,
    pub end_reason: Option<EndReason>,
    pub end_detail: EndDetail,
    pub difficulty_level: Difficulty,
    pub active_events: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub struct TrainingSession {
    id: Uuid,
    profile: Arc<Profile>,
    scenario: Option<Arc<Scenario>>,
    mental_state: Option<Arc<MentalState>>,
    difficulty: Difficulty,
    goals: GoalsConfig,
    budget: OracleBudget,
    trust_level: i32,
    turn_count: u32,
    concerns_addressed: Vec<String>,
    active_events: Vec<String>,
    is_convinced: bool,
    end_reason: Option<EndReason>,
    end_detail: EndDetail,
    history: Vec<HistoryEntry>,
    rng: Box<dyn RngCore + Send + Sync>,
    created_at: DateTime<Utc>,
}

impl fmt::Debug for TrainingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingSession")
            .field("id", &self.id)
            .field("profile", &self.profile.name)
            .field("difficulty", &self.difficulty)
            .field("trust_level", &self.trust_level)
            .field("turn_count", &self.turn_count)
            .field("end_reason", &self.end_reason)
            .finish()
    }
}

/// Clamp a trust update to the trust scale.
pub fn apply_trust_change(current: i32, delta: i32) -> i32 {
    current.saturating_add(delta).clamp(MIN_TRUST, MAX_TRUST)
}

/// Deterministic walk-away sentence citing the trust level.
pub fn low_trust_explanation(trust_level: i32) -> String {
    format!(
        "信任度降到{trust_level}/10，我感觉你的回答没解决我的核心疑问/太难理解，所以先不聊了。"
    )
}

impl TrainingSession {
    /// Bind a profile (plus optional scenario and mental state) to a new
    /// session. Difficulty and the effective goals are fixed here.
    pub fn new(
        profile: Arc<Profile>,
        scenario: Option<Arc<Scenario>>,
        mental_state: Option<Arc<MentalState>>,
        goals: &GoalsConfig,
    ) -> Self {
        let difficulty = profile.difficulty();
        Self {
            id: Uuid::new_v4(),
            goals: goals.effective_for(difficulty),
            difficulty,
            profile,
            scenario,
            mental_state,
            budget: OracleBudget::default(),
            trust_level: INITIAL_TRUST,
            turn_count: 0,
            concerns_addressed: Vec::new(),
            active_events: Vec::new(),
            is_convinced: false,
            end_reason: None,
            end_detail: EndDetail::default(),
            history: Vec::new(),
            rng: Box::new(StdRng::from_entropy()),
            created_at: Utc::now(),
        }
    }

    pub fn with_budget(mut self, budget: OracleBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Replace the random source used for event probabilities.
    pub fn with_rng(mut self, rng: impl RngCore + Send + Sync + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    // --- accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn scenario(&self) -> Option<&Scenario> {
        self.scenario.as_deref()
    }

    pub fn mental_state(&self) -> Option<&MentalState> {
        self.mental_state.as_deref()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn effective_goals(&self) -> &GoalsConfig {
        &self.goals
    }

    pub fn trust_level(&self) -> i32 {
        self.trust_level
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn concerns_addressed(&self) -> &[String] {
        &self.concerns_addressed
    }

    pub fn active_events(&self) -> &[String] {
        &self.active_events
    }

    pub fn is_convinced(&self) -> bool {
        self.is_convinced
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn end_detail(&self) -> &EndDetail {
        &self.end_detail
    }

    pub fn is_ended(&self) -> bool {
        self.end_reason.is_some()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// History as oracle messages: trainee as `user`, persona as `assistant`.
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.history.iter().map(HistoryEntry::as_chat_message).collect()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id,
            profile: (*self.profile).clone(),
            scenario: self.scenario.as_deref().cloned(),
            mental_state: self.mental_state.as_deref().cloned(),
            turn_count: self.turn_count,
            trust_level: self.trust_level,
            trust_threshold: self.profile.trust_threshold,
            concerns_addressed: self.concerns_addressed.clone(),
            total_concerns: self.profile.total_concerns(),
            is_convinced: self.is_convinced,
            messages: self.history.clone(),
            end_reason: self.end_reason,
            end_detail: self.end_detail.clone(),
            difficulty_level: self.difficulty,
            active_events: self.active_events.clone(),
            created_at: self.created_at,
        }
    }

    // --- pipeline ---

    fn active_event_refs(&self) -> Vec<&ScenarioEvent> {
        let Some(scenario) = self.scenario.as_deref() else {
            return Vec::new();
        };
        self.active_events
            .iter()
            .filter_map(|id| scenario.events.iter().find(|e| &e.id == id))
            .collect()
    }

    fn system_prompt(&self) -> String {
        let events = self.active_event_refs();
        PromptBuilder::persona_system(&PersonaContext {
            profile: &self.profile,
            scenario: self.scenario.as_deref(),
            mental_state: self.mental_state.as_deref(),
            active_events: &events,
            trust_level: self.trust_level,
            concerns_addressed: &self.concerns_addressed,
        })
    }

    /// Ask the persona for its first line and record it in history. Falls
    /// back to a template built from the profile.
    pub async fn opening(&mut self, oracle: &dyn Oracle) -> OpeningLine {
        let messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(PromptBuilder::opening_instruction(&self.profile)),
        ];
        let raw = oracle.generate(&messages, self.budget.opening).await;

        let line = match parse_reply::<OpeningReply>(&raw) {
            ParsedReply::Parsed(reply) => OpeningLine {
                response: reply.response,
                inner_thought: reply.inner_thought,
                generated: true,
            },
            ParsedReply::Unparseable(raw) => {
                if is_diagnostic(&raw) {
                    tracing::warn!(session = %self.id, diagnostic = %raw, "Opening line unavailable, using template");
                } else {
                    tracing::debug!(session = %self.id, "Opening line unparseable, using template");
                }
                OpeningLine {
                    response: PromptBuilder::opening_fallback(&self.profile),
                    inner_thought: "希望能有人帮我解答".to_string(),
                    generated: false,
                }
            }
        };

        self.history
            .push(HistoryEntry::persona(&line.response, &line.inner_thought, None));
        line
    }

    /// Process one trainee message. Rejected once the session has ended.
    pub async fn respond(
        &mut self,
        oracle: &dyn Oracle,
        message: &str,
    ) -> Result<TurnOutcome, SessionError> {
        if let Some(reason) = self.end_reason {
            return Err(SessionError::Ended(reason));
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        self.turn_count += 1;

        let triggered = match self.scenario.as_deref() {
            Some(scenario) => events::newly_triggered(
                &scenario.events,
                &self.active_events,
                self.turn_count,
                self.trust_level,
                message,
                self.rng.as_mut(),
            ),
            None => Vec::new(),
        };
        if !triggered.is_empty() {
            tracing::info!(session = %self.id, turn = self.turn_count, events = ?triggered, "Scenario events triggered");
            self.active_events.extend(triggered.iter().cloned());
        }

        self.history.push(HistoryEntry::trainee(message));

        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt()));
        messages.extend(self.transcript());
        let raw = oracle.generate(&messages, self.budget.turn).await;

        let (mut reply, parsed) = match parse_reply::<PersonaReply>(&raw) {
            ParsedReply::Parsed(reply) => {
                self.trust_level = apply_trust_change(self.trust_level, reply.trust_change);
                if let Some(concern) = &reply.concern_addressed {
                    if !self.concerns_addressed.contains(concern) {
                        self.concerns_addressed.push(concern.clone());
                    }
                }
                (reply, true)
            }
            ParsedReply::Unparseable(raw) => {
                if is_diagnostic(&raw) {
                    tracing::warn!(session = %self.id, turn = self.turn_count, diagnostic = %raw, "Oracle unavailable, using neutral reply");
                } else {
                    tracing::debug!(session = %self.id, turn = self.turn_count, "Persona reply unparseable, using neutral reply");
                }
                (PersonaReply::fallback(raw), false)
            }
        };

        self.history.push(HistoryEntry::persona(
            &reply.response,
            &reply.inner_thought,
            Some(reply.trust_change),
        ));

        let check = SuccessCheck::evaluate(
            &self.goals.success_conditions,
            self.trust_level,
            self.profile.trust_threshold,
            self.concerns_addressed.len(),
            reply.ready_to_open_account,
        );
        if check.passed() {
            self.is_convinced = true;
        }

        if !self.is_convinced && self.trust_level <= self.goals.end_conditions.min_trust_to_continue {
            reply.willing_to_continue = false;
            reply.ready_to_open_account = false;
            reply.quit_reason = Some(LOW_TRUST_QUIT.to_string());
            if reply.quit_explanation.is_none() {
                reply.quit_explanation = Some(low_trust_explanation(self.trust_level));
            }
        }

        self.classify_end(&reply);

        tracing::debug!(
            session = %self.id,
            turn = self.turn_count,
            trust = self.trust_level,
            concerns = self.concerns_addressed.len(),
            ended = ?self.end_reason,
            "Turn processed"
        );

        Ok(TurnOutcome {
            response: reply.response,
            inner_thought: reply.inner_thought,
            trust_change: reply.trust_change,
            concern_addressed: reply.concern_addressed,
            is_ended: self.end_reason.is_some(),
            end_reason: self.end_reason,
            end_detail: self.end_detail.clone(),
            triggered_events: triggered,
            parsed,
        })
    }

    /// Settle a turn whose processing faulted partway through.
    ///
    /// Records the neutral persona reply if the trainee's message is still
    /// unanswered and classifies the end, so history keeps alternating and a
    /// fault on the last allowed turn still ends the session.
    pub fn record_interrupted_turn(&mut self) -> TurnOutcome {
        let mut outcome = TurnOutcome::interrupted();
        if self.end_reason.is_none() {
            let unanswered = self
                .history
                .last()
                .is_some_and(|entry| entry.speaker == Speaker::Trainee);
            if unanswered {
                self.history.push(HistoryEntry::persona(
                    &outcome.response,
                    &outcome.inner_thought,
                    Some(0),
                ));
            }
            let mut reply = PersonaReply::fallback(outcome.response.clone());
            reply.inner_thought = outcome.inner_thought.clone();
            self.classify_end(&reply);
        }
        tracing::warn!(session = %self.id, turn = self.turn_count, ended = ?self.end_reason, "Recorded interrupted turn");

        outcome.is_ended = self.end_reason.is_some();
        outcome.end_reason = self.end_reason;
        outcome.end_detail = self.end_detail.clone();
        outcome
    }

    /// First match wins: success, user_quit, trust_full, concerns_full, max_turns.
    fn classify_end(&mut self, reply: &PersonaReply) {
        let turn = Some(self.turn_count);
        let total = self.profile.total_concerns();
        let addressed = self.concerns_addressed.len();

        let (reason, detail) = if self.is_convinced {
            (
                EndReason::Success,
                EndDetail {
                    final_trust: Some(self.trust_level),
                    turn,
                    ..EndDetail::default()
                },
            )
        } else if !reply.willing_to_continue {
            (
                EndReason::UserQuit,
                EndDetail {
                    quit_reason: reply.quit_reason.clone(),
                    quit_explanation: reply.quit_explanation.clone(),
                    final_trust: Some(self.trust_level),
                    last_trust_change: Some(reply.trust_change),
                    turn,
                    ..EndDetail::default()
                },
            )
        } else if self.trust_level >= MAX_TRUST {
            (
                EndReason::TrustFull,
                EndDetail {
                    final_trust: Some(self.trust_level),
                    turn,
                    ..EndDetail::default()
                },
            )
        } else if total > 0 && addressed >= total {
            (
                EndReason::ConcernsFull,
                EndDetail {
                    concerns_addressed: Some(addressed),
                    total_concerns: Some(total),
                    turn,
                    ..EndDetail::default()
                },
            )
        } else if self.turn_count >= self.goals.end_conditions.max_turns {
            (
                EndReason::MaxTurns,
                EndDetail {
                    turn,
                    ..EndDetail::default()
                },
            )
        } else {
            return;
        };

        tracing::info!(session = %self.id, reason = %reason, turn = self.turn_count, trust = self.trust_level, "Session ended");
        self.end_reason = Some(reason);
        self.end_detail = detail;
    }
}
