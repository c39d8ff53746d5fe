//! Persona templates and the situational context a session can be placed in.
//!
//! Everything here is loaded once from the training config and then shared
//! read-only between sessions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound of the trust scale.
pub const MIN_TRUST: i32 = 0;
/// Upper bound of the trust scale.
pub const MAX_TRUST: i32 = 10;

/// A simulated end-user the trainee practices against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub investment_goal: String,
    #[serde(default)]
    pub risk_tolerance: String,
    /// Named worries, in the order the persona cares about them.
    #[serde(default, alias = "pain_points")]
    pub concerns: Vec<String>,
    /// Why the persona opened the app in the first place.
    #[serde(default)]
    pub trigger_scenario: String,
    /// Trust level at which this persona would consider opening an account.
    #[serde(default = "default_trust_threshold")]
    pub trust_threshold: i32,
    #[serde(default)]
    pub personality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_scenario_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mental_state_id: Option<String>,
}

fn default_trust_threshold() -> i32 {
    7
}

impl Profile {
    pub fn difficulty(&self) -> Difficulty {
        Difficulty::from_threshold(self.trust_threshold)
    }

    pub fn total_concerns(&self) -> usize {
        self.concerns.len()
    }
}

/// Difficulty bucket, used only to pick success-condition overrides.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// ≤6 easy, 7–8 medium, ≥9 hard.
    pub fn from_threshold(trust_threshold: i32) -> Self {
        if trust_threshold <= 6 {
            Difficulty::Easy
        } else if trust_threshold <= 8 {
            Difficulty::Medium
        } else {
            Difficulty::Hard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Display label shown next to a profile.
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "简单",
            Difficulty::Medium => "中等",
            Difficulty::Hard => "困难",
        }
    }

    pub fn stars(&self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Situational context for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub context: String,
    pub market_state: String,
    pub user_goal_in_this_moment: String,
    pub constraints: Vec<String>,
    pub events: Vec<ScenarioEvent>,
}

/// Something that can happen to the persona mid-conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScenarioEvent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub trigger: EventTrigger,
    pub impact: EventImpact,
}

/// All present predicates must hold for the event to fire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_gte: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_gte: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keyword_any: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

impl EventTrigger {
    pub fn probability(&self) -> f64 {
        self.probability.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventImpact {
    /// Extra context folded into every persona prompt once the event is active.
    pub add_context: String,
}

/// Emotional modifier layered onto the persona's voice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MentalState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub behavior_guidelines: Vec<String>,
}
