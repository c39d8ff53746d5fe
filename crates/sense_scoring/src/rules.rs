//! Deterministic, explainable point accumulation. This is the authoritative
//! `total_score`.

use regex::RegexBuilder;
use sense_core::{ScoreRule, ScoringRules};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePart {
    pub name: String,
    pub delta: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl ScorePart {
    fn new(name: impl Into<String>, delta: i32) -> Self {
        Self {
            name: name.into(),
            delta,
            detail: None,
            rule_id: None,
        }
    }

    fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringBreakdown {
    pub total_score: i32,
    pub raw_score: i32,
    pub max_total_score: i32,
    pub parts: Vec<ScorePart>,
}

/// Session outcome signals the rule score is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSignals {
    pub final_trust: i32,
    pub is_convinced: bool,
    pub concerns_addressed: usize,
    pub turn_count: u32,
}

#[derive(Debug, Clone, Copy)]
enum RuleKind {
    Bonus,
    Penalty,
}

impl RuleKind {
    fn label(self) -> &'static str {
        match self {
            RuleKind::Bonus => "加分",
            RuleKind::Penalty => "扣分",
        }
    }
}

/// `trainee_text` is every trainee turn joined with newlines.
pub fn compute_rule_score(
    rules: &ScoringRules,
    signals: &ScoreSignals,
    trainee_text: &str,
) -> ScoringBreakdown {
    let mut parts = Vec::new();
    let mut score = rules.base_score;
    parts.push(ScorePart::new("基础分", rules.base_score));

    let trust_delta = signals.final_trust.saturating_mul(rules.trust_point_per_level);
    score = score.saturating_add(trust_delta);
    parts.push(
        ScorePart::new("信任度奖励", trust_delta)
            .detail(format!("{} × {}", signals.final_trust, rules.trust_point_per_level)),
    );

    let concerns = i32::try_from(signals.concerns_addressed).unwrap_or(i32::MAX);
    let concern_delta = concerns.saturating_mul(rules.concern_addressed_bonus);
    score = score.saturating_add(concern_delta);
    parts.push(
        ScorePart::new("解答顾虑奖励", concern_delta)
            .detail(format!("{} × {}", concerns, rules.concern_addressed_bonus)),
    );

    if signals.is_convinced {
        score = score.saturating_add(rules.success_bonus);
        parts.push(ScorePart::new("成功开户奖励", rules.success_bonus));
        if signals.turn_count <= rules.fast_success_turns_threshold {
            score = score.saturating_add(rules.fast_success_bonus);
            parts.push(
                ScorePart::new("效率奖励", rules.fast_success_bonus)
                    .detail(format!("turns≤{}", rules.fast_success_turns_threshold)),
            );
        }
    }

    let lowered = trainee_text.to_lowercase();
    for (kind, list) in [
        (RuleKind::Bonus, &rules.bonuses),
        (RuleKind::Penalty, &rules.penalties),
    ] {
        for rule in list {
            if rule.delta == 0 || !rule_matches(rule, trainee_text, &lowered) {
                continue;
            }
            score = score.saturating_add(rule.delta);
            parts.push(ScorePart {
                name: format!("{}：{}", kind.label(), rule.label()),
                delta: rule.delta,
                detail: None,
                rule_id: Some(rule.id.clone()),
            });
        }
    }

    let max_total = rules.max_total_score.max(0);
    ScoringBreakdown {
        total_score: score.clamp(0, max_total),
        raw_score: score,
        max_total_score: max_total,
        parts,
    }
}

fn rule_matches(rule: &ScoreRule, text: &str, lowered: &str) -> bool {
    let keyword_hit = rule
        .keyword_any
        .iter()
        .map(|k| k.to_lowercase())
        .any(|k| !k.is_empty() && lowered.contains(&k));
    if keyword_hit {
        return true;
    }
    rule.regex_any.iter().any(|pattern| {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => re.is_match(text),
            Err(e) => {
                tracing::warn!(rule = %rule.id, pattern = %pattern, error = %e, "Skipping invalid scoring regex");
                false
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(final_trust: i32, is_convinced: bool, concerns: usize, turns: u32) -> ScoreSignals {
        ScoreSignals {
            final_trust,
            is_convinced,
            concerns_addressed: concerns,
            turn_count: turns,
        }
    }

    fn rule(id: &str, delta: i32, keywords: &[&str], regexes: &[&str]) -> ScoreRule {
        ScoreRule {
            id: id.to_string(),
            name: None,
            delta,
            keyword_any: keywords.iter().map(|s| s.to_string()).collect(),
            regex_any: regexes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_fast_success_is_clamped() {
        let b = compute_rule_score(&ScoringRules::default(), &signals(8, true, 3, 7), "");
        assert_eq!(b.raw_score, 111);
        assert_eq!(b.total_score, 100);
        assert_eq!(b.max_total_score, 100);
        let names: Vec<_> = b.parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["基础分", "信任度奖励", "解答顾虑奖励", "成功开户奖励", "效率奖励"]);
    }

    #[test]
    fn test_slow_success_has_no_efficiency_bonus() {
        let b = compute_rule_score(&ScoringRules::default(), &signals(8, true, 3, 15), "");
        assert_eq!(b.raw_score, 101);
        assert_eq!(b.total_score, 100);

        let b = compute_rule_score(&ScoringRules::default(), &signals(3, true, 3, 15), "");
        assert_eq!(b.total_score, 91);
        assert!(b.parts.iter().all(|p| p.name != "效率奖励"));
    }

    #[test]
    fn test_unconvinced_session() {
        let b = compute_rule_score(&ScoringRules::default(), &signals(2, false, 1, 20), "");
        assert_eq!(b.total_score, 50 + 4 + 5);
        assert_eq!(b.parts.len(), 3);
        assert_eq!(b.parts[1].detail.as_deref(), Some("2 × 2"));
    }

    #[test]
    fn test_keyword_and_regex_rules() {
        let rules = ScoringRules {
            bonuses: vec![rule("plain", 5, &["Bank"], &[])],
            penalties: vec![
                rule("promise", -15, &[], &[r"保证.*(赚|收益)"]),
                rule("never", -10, &["稳赚不赔"], &[]),
            ],
            ..ScoringRules::default()
        };
        let text = "资金在BANK存管\n我保证你能赚钱";
        let b = compute_rule_score(&rules, &signals(0, false, 0, 3), text);
        assert_eq!(b.raw_score, 50 + 5 - 15);
        let promise = b.parts.iter().find(|p| p.rule_id.as_deref() == Some("promise")).unwrap();
        assert_eq!(promise.name, "扣分：promise");
        assert!(b.parts.iter().all(|p| p.rule_id.as_deref() != Some("never")));
    }

    #[test]
    fn test_zero_delta_and_invalid_regex_are_ignored() {
        let rules = ScoringRules {
            bonuses: vec![rule("zero", 0, &["a"], &[]), rule("bad", 5, &[], &["(unclosed"])],
            ..ScoringRules::default()
        };
        let b = compute_rule_score(&rules, &signals(0, false, 0, 1), "a (unclosed");
        assert_eq!(b.raw_score, 50);
        assert_eq!(b.parts.len(), 3);
    }

    #[test]
    fn test_negative_total_clamps_to_zero() {
        let rules = ScoringRules {
            base_score: 0,
            penalties: vec![rule("rude", -30, &["滚"], &[])],
            ..ScoringRules::default()
        };
        let b = compute_rule_score(&rules, &signals(0, false, 0, 1), "滚");
        assert_eq!(b.raw_score, -30);
        assert_eq!(b.total_score, 0);
    }

    #[test]
    fn test_extreme_weights_saturate() {
        let rules = ScoringRules {
            base_score: i32::MAX,
            trust_point_per_level: i32::MAX,
            concern_addressed_bonus: i32::MAX,
            success_bonus: i32::MAX,
            fast_success_bonus: i32::MAX,
            bonuses: vec![rule("huge", i32::MAX, &["a"], &[])],
            ..ScoringRules::default()
        };
        let b = compute_rule_score(&rules, &signals(10, true, usize::MAX, 1), "a");
        assert_eq!(b.raw_score, i32::MAX);
        assert_eq!(b.total_score, b.max_total_score);

        let rules = ScoringRules {
            base_score: i32::MIN,
            trust_point_per_level: i32::MAX,
            penalties: vec![rule("huge", i32::MIN, &["a"], &[])],
            ..ScoringRules::default()
        };
        let b = compute_rule_score(&rules, &signals(-10, false, 0, 1), "a");
        assert_eq!(b.raw_score, i32::MIN);
        assert_eq!(b.total_score, 0);
    }
}
