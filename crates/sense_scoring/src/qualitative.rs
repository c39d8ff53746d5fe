//! The oracle's dimension scores and narrative, parsed loosely, plus the
//! heuristic stand-in used when that payload is unusable.

use sense_core::Criterion;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The five dimensions rated for every session.
pub const DIMENSIONS: [&str; 5] = [
    "communication_skills",
    "empathy",
    "problem_solving",
    "persuasion",
    "professionalism",
];

/// Where the qualitative half of an evaluation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualitativeSource {
    Oracle,
    Heuristic,
    Interrupted,
}

/// Payload requested from the oracle. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QualitativePayload {
    #[serde(default, deserialize_with = "lenient_scores")]
    pub scores: BTreeMap<String, f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub highlights: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub improvements: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub key_insights: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub overall_comment: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub end_explanation: String,
}

/// Σ score × weight over dimensions present in `criteria`, one decimal.
pub fn weighted_score(scores: &BTreeMap<String, f64>, criteria: &BTreeMap<String, Criterion>) -> f64 {
    let total: f64 = scores
        .iter()
        .filter_map(|(key, score)| criteria.get(key).map(|c| score * c.weight))
        .sum();
    (total * 10.0).round() / 10.0
}

/// Additive heuristic over the session signals, same five dimensions.
pub fn heuristic_payload(
    final_trust: i32,
    is_convinced: bool,
    concerns_addressed: usize,
    turn_count: u32,
) -> QualitativePayload {
    let mut base = 50 + final_trust * 2 + concerns_addressed as i32 * 5;
    if is_convinced {
        base += 20;
        if turn_count <= 10 {
            base += 10;
        }
    }
    let base = base.min(100);
    let persuasion = if is_convinced { base + 10 } else { base - 10 };

    let scores = DIMENSIONS
        .iter()
        .map(|&dim| {
            let value = if dim == "persuasion" { persuasion } else { base };
            (dim.to_string(), value.clamp(0, 100) as f64)
        })
        .collect();

    QualitativePayload {
        scores,
        highlights: vec!["完成了对话练习".to_string()],
        improvements: vec!["建议多练习以提升表现".to_string()],
        key_insights: "持续练习可以提升用户sense".to_string(),
        overall_comment: "继续加油！".to_string(),
        end_explanation: String::new(),
    }
}

/// Flat 60s, used when evaluation itself faulted.
pub fn interrupted_payload() -> QualitativePayload {
    QualitativePayload {
        scores: DIMENSIONS.iter().map(|d| (d.to_string(), 60.0)).collect(),
        highlights: vec!["完成了训练对话".to_string()],
        improvements: vec!["继续练习以提升表现".to_string()],
        key_insights: "持续练习可以提升用户感知能力".to_string(),
        overall_comment: "继续加油！".to_string(),
        end_explanation: String::new(),
    }
}

fn lenient_scores<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, f64>, D::Error> {
    let Value::Object(map) = Value::deserialize(d)? else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .into_iter()
        .filter_map(|(k, v)| {
            let score = match &v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }?;
            score.is_finite().then_some((k, score))
        })
        .collect())
}

fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sense_core::defaults::builtin_criteria;

    #[test]
    fn test_weighted_score_default_weights() {
        let scores: BTreeMap<String, f64> = DIMENSIONS.iter().map(|d| (d.to_string(), 80.0)).collect();
        assert_eq!(weighted_score(&scores, &builtin_criteria()), 80.0);
    }

    #[test]
    fn test_weighted_score_missing_and_unknown_dimensions() {
        let mut scores = BTreeMap::new();
        scores.insert("empathy".to_string(), 90.0);
        scores.insert("humor".to_string(), 100.0);
        // 90 × 0.25
        assert_eq!(weighted_score(&scores, &builtin_criteria()), 22.5);
    }

    #[test]
    fn test_weighted_score_rounds_to_one_decimal() {
        let mut scores = BTreeMap::new();
        scores.insert("professionalism".to_string(), 77.0);
        scores.insert("problem_solving".to_string(), 33.0);
        // 7.7 + 6.6
        assert_eq!(weighted_score(&scores, &builtin_criteria()), 14.3);
    }

    #[test]
    fn test_payload_is_lenient() {
        let payload: QualitativePayload = serde_json::from_str(
            r#"{
                "scores": {"empathy": "85", "persuasion": 70.5, "professionalism": "高"},
                "highlights": "语气亲切",
                "improvements": null,
                "key_insights": 42
            }"#,
        )
        .unwrap();
        assert_eq!(payload.scores.len(), 2);
        assert_eq!(payload.scores["empathy"], 85.0);
        assert_eq!(payload.highlights, vec!["语气亲切".to_string()]);
        assert!(payload.improvements.is_empty());
        assert_eq!(payload.key_insights, "42");
        assert!(payload.end_explanation.is_empty());
    }

    #[test]
    fn test_non_object_scores_become_empty() {
        let payload: QualitativePayload = serde_json::from_str(r#"{"scores": [1, 2]}"#).unwrap();
        assert!(payload.scores.is_empty());
    }

    #[test]
    fn test_heuristic_payload() {
        let p = heuristic_payload(8, true, 3, 7);
        assert_eq!(p.scores["empathy"], 100.0);
        assert_eq!(p.scores["persuasion"], 100.0);

        let p = heuristic_payload(2, false, 1, 20);
        assert_eq!(p.scores["empathy"], 59.0);
        assert_eq!(p.scores["persuasion"], 49.0);
        assert_eq!(p.scores.len(), 5);
    }
}
