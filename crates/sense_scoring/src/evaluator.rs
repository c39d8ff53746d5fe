//! Post-session evaluation: the deterministic rule score is authoritative,
//! the oracle contributes dimension scores and narrative.

use crate::explain::end_explanation;
use crate::qualitative::{
    heuristic_payload, interrupted_payload, weighted_score, QualitativePayload, QualitativeSource,
};
use crate::rules::{compute_rule_score, ScoreSignals, ScoringBreakdown};
use sense_core::{
    Criterion, Difficulty, MentalState, Profile, Scenario, ScoringRules, SuccessConditions,
    TrainingConfig,
};
use sense_persona::{EndDetail, EndReason, TrainingSession, LOW_TRUST_QUIT};
use sense_reasoning::{
    is_diagnostic, parse_reply, ChatMessage, ChatRole, EvaluationBrief, GenerationParams, Oracle,
    ParsedReply, PromptBuilder,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Owned snapshot of a session, taken so the evaluation can run without
/// holding the session lock.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub profile: Profile,
    pub scenario: Option<Scenario>,
    pub mental_state: Option<MentalState>,
    pub difficulty: Difficulty,
    pub transcript: Vec<ChatMessage>,
    pub turn_count: u32,
    pub final_trust: i32,
    pub is_convinced: bool,
    pub concerns_addressed: Vec<String>,
    pub end_reason: Option<EndReason>,
    pub end_detail: EndDetail,
    pub success: SuccessConditions,
}

impl EvaluationInput {
    pub fn from_session(session: &TrainingSession) -> Self {
        Self {
            profile: session.profile().clone(),
            scenario: session.scenario().cloned(),
            mental_state: session.mental_state().cloned(),
            difficulty: session.difficulty(),
            transcript: session.transcript(),
            turn_count: session.turn_count(),
            final_trust: session.trust_level(),
            is_convinced: session.is_convinced(),
            concerns_addressed: session.concerns_addressed().to_vec(),
            end_reason: session.end_reason(),
            end_detail: session.end_detail().clone(),
            success: session.effective_goals().success_conditions.clone(),
        }
    }

    /// Every trainee turn, newline-joined.
    pub fn trainee_text(&self) -> String {
        self.transcript
            .iter()
            .filter(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn signals(&self) -> ScoreSignals {
        ScoreSignals {
            final_trust: self.final_trust,
            is_convinced: self.is_convinced,
            concerns_addressed: self.concerns_addressed.len(),
            turn_count: self.turn_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationStats {
    pub turn_count: u32,
    pub final_trust: i32,
    pub trust_threshold: i32,
    pub is_convinced: bool,
    pub concerns_addressed: Vec<String>,
    pub total_concerns: usize,
    pub end_reason: Option<EndReason>,
    pub end_detail: EndDetail,
    pub difficulty_level: Difficulty,
}

impl EvaluationStats {
    fn from_input(input: &EvaluationInput) -> Self {
        Self {
            turn_count: input.turn_count,
            final_trust: input.final_trust,
            trust_threshold: input.profile.trust_threshold,
            is_convinced: input.is_convinced,
            concerns_addressed: input.concerns_addressed.clone(),
            total_concerns: input.profile.total_concerns(),
            end_reason: input.end_reason,
            end_detail: input.end_detail.clone(),
            difficulty_level: input.difficulty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub scores: BTreeMap<String, f64>,
    /// Weighted dimension score; informational only.
    pub llm_weighted_score: f64,
    pub scoring_breakdown: ScoringBreakdown,
    /// Always `scoring_breakdown.total_score`.
    pub total_score: i32,
    pub highlights: Vec<String>,
    pub improvements: Vec<String>,
    pub key_insights: String,
    pub overall_comment: String,
    pub end_explanation: String,
    pub stats: EvaluationStats,
    pub qualitative_source: QualitativeSource,
}

impl EvaluationResult {
    /// Flat result returned when evaluation faulted part-way.
    pub fn interrupted(input: &EvaluationInput, criteria: &BTreeMap<String, Criterion>) -> Self {
        let payload = interrupted_payload();
        let breakdown = ScoringBreakdown {
            total_score: 60,
            raw_score: 60,
            max_total_score: 100,
            parts: Vec::new(),
        };
        Self {
            llm_weighted_score: weighted_score(&payload.scores, criteria),
            scores: payload.scores,
            total_score: breakdown.total_score,
            scoring_breakdown: breakdown,
            highlights: payload.highlights,
            improvements: payload.improvements,
            key_insights: payload.key_insights,
            overall_comment: payload.overall_comment,
            end_explanation: end_explanation(
                input.end_reason,
                &input.end_detail,
                input.final_trust,
                input.turn_count,
            ),
            stats: EvaluationStats::from_input(input),
            qualitative_source: QualitativeSource::Interrupted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    criteria: BTreeMap<String, Criterion>,
    rules: ScoringRules,
    params: GenerationParams,
}

impl Evaluator {
    pub fn new(criteria: BTreeMap<String, Criterion>, rules: ScoringRules) -> Self {
        Self {
            criteria,
            rules,
            params: GenerationParams::evaluation(),
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.evaluation_criteria.clone(), config.scoring_rules.clone())
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn criteria(&self) -> &BTreeMap<String, Criterion> {
        &self.criteria
    }

    /// Rule score only; no oracle involved.
    pub fn score(&self, input: &EvaluationInput) -> ScoringBreakdown {
        compute_rule_score(&self.rules, &input.signals(), &input.trainee_text())
    }

    pub async fn evaluate(&self, oracle: &dyn Oracle, input: &EvaluationInput) -> EvaluationResult {
        let breakdown = self.score(input);

        let end_detail = if input.end_detail.is_empty() {
            None
        } else {
            serde_json::to_value(&input.end_detail).ok()
        };
        let brief = EvaluationBrief {
            profile: &input.profile,
            scenario: input.scenario.as_ref(),
            mental_state: input.mental_state.as_ref(),
            transcript: &input.transcript,
            turn_count: input.turn_count,
            final_trust: input.final_trust,
            is_convinced: input.is_convinced,
            concerns_addressed: &input.concerns_addressed,
            end_reason: input.end_reason.as_ref().map(EndReason::as_str),
            end_detail: end_detail.as_ref(),
            success: &input.success,
            criteria: &self.criteria,
        };
        let raw = oracle
            .generate(&PromptBuilder::evaluation_messages(&brief), self.params)
            .await;

        let (payload, source) = match parse_reply::<QualitativePayload>(&raw) {
            ParsedReply::Parsed(payload) if !payload.scores.is_empty() => {
                (payload, QualitativeSource::Oracle)
            }
            parsed => {
                if is_diagnostic(&raw) {
                    tracing::warn!(diagnostic = %raw, "Evaluation oracle unavailable, using heuristic scores");
                } else {
                    tracing::warn!(parsed = parsed.is_parsed(), "Evaluation reply had no usable scores, using heuristic");
                }
                (
                    heuristic_payload(
                        input.final_trust,
                        input.is_convinced,
                        input.concerns_addressed.len(),
                        input.turn_count,
                    ),
                    QualitativeSource::Heuristic,
                )
            }
        };

        let explanation = self.explain(input, &payload);
        tracing::info!(
            total = breakdown.total_score,
            source = ?source,
            reason = ?input.end_reason,
            "Session evaluated"
        );

        EvaluationResult {
            llm_weighted_score: weighted_score(&payload.scores, &self.criteria),
            scores: payload.scores,
            total_score: breakdown.total_score,
            scoring_breakdown: breakdown,
            highlights: payload.highlights,
            improvements: payload.improvements,
            key_insights: payload.key_insights,
            overall_comment: payload.overall_comment,
            end_explanation: explanation,
            stats: EvaluationStats::from_input(input),
            qualitative_source: source,
        }
    }

    /// Templates for everything but an unexplained quit, where the oracle's
    /// sentence is preferred over the generic one.
    fn explain(&self, input: &EvaluationInput, payload: &QualitativePayload) -> String {
        let detail = &input.end_detail;
        let unexplained_quit = input.end_reason == Some(EndReason::UserQuit)
            && detail
                .quit_explanation
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
            && detail.quit_reason.as_deref() != Some(LOW_TRUST_QUIT);
        let oracle_text = payload.end_explanation.trim();
        if unexplained_quit && !oracle_text.is_empty() {
            return oracle_text.to_string();
        }
        end_explanation(input.end_reason, detail, input.final_trust, input.turn_count)
    }
}
