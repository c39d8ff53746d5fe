//! Lenient parsing of the oracle's semi-structured replies.
//!
//! The oracle is asked for JSON but may wrap it in a fenced block, return
//! prose, or return an adapter diagnostic. Every consumer gets a
//! [`ParsedReply`] and must handle both variants.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of parsing one oracle reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply<T> {
    Parsed(T),
    Unparseable(String),
}

impl<T> ParsedReply<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParsedReply::Parsed(_))
    }
}

/// The persona's structured answer to one trainee turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaReply {
    pub response: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub inner_thought: String,
    /// Expected in -2..=2 but never enforced; only the resulting trust is clamped.
    #[serde(default, deserialize_with = "lenient_int")]
    pub trust_change: i32,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub concern_addressed: Option<String>,
    #[serde(default = "default_true", deserialize_with = "truthy_or_true")]
    pub willing_to_continue: bool,
    #[serde(default, deserialize_with = "truthy_or_false")]
    pub ready_to_open_account: bool,
    #[serde(default, deserialize_with = "non_empty_string", skip_serializing_if = "Option::is_none")]
    pub quit_reason: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string", skip_serializing_if = "Option::is_none")]
    pub quit_explanation: Option<String>,
}

impl PersonaReply {
    /// Neutral reply used when the oracle output could not be parsed.
    pub fn fallback(raw: impl Into<String>) -> Self {
        Self {
            response: raw.into(),
            inner_thought: "（解析失败）".to_string(),
            trust_change: 0,
            concern_addressed: None,
            willing_to_continue: true,
            ready_to_open_account: false,
            quit_reason: None,
            quit_explanation: None,
        }
    }
}

/// The persona's first line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningReply {
    pub response: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub inner_thought: String,
}

/// Return the payload of the first fenced code block, preferring one labelled
/// `json`; the whole text when there is no fence.
pub fn extract_json_block(text: &str) -> &str {
    let inner = if let Some(idx) = text.find("```json") {
        fenced_body(&text[idx + "```json".len()..])
    } else if let Some(idx) = text.find("```") {
        skip_language_tag(fenced_body(&text[idx + 3..]))
    } else {
        text
    };
    inner.trim()
}

fn fenced_body(after_open: &str) -> &str {
    match after_open.find("```") {
        Some(end) => &after_open[..end],
        None => after_open,
    }
}

/// Unlabelled fences sometimes still carry a tag on the opening line.
fn skip_language_tag(body: &str) -> &str {
    let trimmed = body.trim_start_matches([' ', '\t']);
    match trimmed.split_once('\n') {
        Some((first, rest))
            if !first.trim().is_empty()
                && first.trim().chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            rest
        }
        _ => body,
    }
}

/// Parse oracle text into `T`, tolerating fenced blocks.
pub fn parse_reply<T: DeserializeOwned>(raw: &str) -> ParsedReply<T> {
    let payload = extract_json_block(raw);
    match serde_json::from_str::<T>(payload) {
        Ok(value) => ParsedReply::Parsed(value),
        Err(e) => {
            tracing::debug!(error = %e, raw_len = raw.len(), "Oracle reply was not parseable JSON");
            ParsedReply::Unparseable(raw.to_string())
        }
    }
}

// ============================================================================
// Field-level leniency
// ============================================================================

fn default_true() -> bool {
    true
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn non_empty_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Integers, floats (truncated) and numeric strings like `"+1"`; anything else is 0.
fn lenient_int<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(coerce_int(&value).unwrap_or(0))
}

fn coerce_int(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn truthy(value: &Value, default: bool) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => default,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            _ => default,
        },
        _ => default,
    }
}

fn truthy_or_true<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(truthy(&Value::deserialize(d)?, true))
}

fn truthy_or_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(truthy(&Value::deserialize(d)?, false))
}
