pub mod evaluator;
pub mod explain;
pub mod qualitative;
pub mod rules;

pub use evaluator::{EvaluationInput, EvaluationResult, EvaluationStats, Evaluator};
pub use explain::end_explanation;
pub use qualitative::{weighted_score, QualitativePayload, QualitativeSource, DIMENSIONS};
pub use rules::{compute_rule_score, ScorePart, ScoreSignals, ScoringBreakdown};
