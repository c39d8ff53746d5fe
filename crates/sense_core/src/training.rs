//! Training policy: who can be simulated, when a session ends, what counts as
//! success and how the finished session is scored.
//!
//! Resolution is two-stage. An external layer (TOML or JSON file) is parsed into
//! a [`TrainingLayer`] of optional fields, which is then merged field-by-field
//! onto the fully specified [`TrainingConfig::default`]. The merge is a pure
//! function; caching and reload live only in [`TrainingConfigProvider`].

use anyhow::{Context, Result};
use arc_swap::ArcSwapOption;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::defaults::{builtin_criteria, builtin_profiles};
use crate::model::{Difficulty, MentalState, Profile, Scenario};

// ============================================================================
// Resolved config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingConfig {
    pub version: u32,
    pub profiles: Vec<Profile>,
    pub scenarios: Vec<Scenario>,
    pub mental_states: Vec<MentalState>,
    pub goals: GoalsConfig,
    pub evaluation_criteria: BTreeMap<String, Criterion>,
    pub scoring_rules: ScoringRules,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            version: 1,
            profiles: builtin_profiles(),
            scenarios: Vec::new(),
            mental_states: Vec::new(),
            goals: GoalsConfig::default(),
            evaluation_criteria: builtin_criteria(),
            scoring_rules: ScoringRules::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalsConfig {
    pub end_conditions: EndConditions,
    pub success_conditions: SuccessConditions,
    /// Partial overrides keyed by difficulty level ("easy" / "medium" / "hard").
    pub success_conditions_by_difficulty: BTreeMap<String, SuccessOverride>,
}

impl Default for GoalsConfig {
    fn default() -> Self {
        let mut by_difficulty = BTreeMap::new();
        by_difficulty.insert(
            Difficulty::Easy.as_str().to_string(),
            SuccessOverride {
                requires_ready_to_open_account: Some(false),
                min_concerns_addressed: Some(1),
                trust_at_least_profile_threshold: Some(false),
                // fixed bar instead of the profile threshold
                min_trust_level: Some(Some(3)),
            },
        );
        by_difficulty.insert(
            Difficulty::Medium.as_str().to_string(),
            SuccessOverride {
                requires_ready_to_open_account: Some(false),
                min_concerns_addressed: Some(2),
                trust_at_least_profile_threshold: Some(true),
                min_trust_level: None,
            },
        );
        by_difficulty.insert(
            Difficulty::Hard.as_str().to_string(),
            SuccessOverride {
                requires_ready_to_open_account: Some(true),
                min_concerns_addressed: Some(2),
                trust_at_least_profile_threshold: Some(true),
                min_trust_level: None,
            },
        );
        Self {
            end_conditions: EndConditions::default(),
            success_conditions: SuccessConditions::default(),
            success_conditions_by_difficulty: by_difficulty,
        }
    }
}

impl GoalsConfig {
    /// Goals with the difficulty bucket's success override merged in.
    pub fn effective_for(&self, difficulty: Difficulty) -> GoalsConfig {
        let mut merged = self.clone();
        if let Some(over) = self.success_conditions_by_difficulty.get(difficulty.as_str()) {
            merged.success_conditions = over.apply(&self.success_conditions);
        }
        merged
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndConditions {
    /// Hard cap on trainee turns.
    pub max_turns: u32,
    /// At or below this trust (and not convinced) the persona walks away.
    pub min_trust_to_continue: i32,
}

impl Default for EndConditions {
    fn default() -> Self {
        Self {
            max_turns: 20,
            min_trust_to_continue: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuccessConditions {
    pub requires_ready_to_open_account: bool,
    pub min_concerns_addressed: usize,
    pub trust_at_least_profile_threshold: bool,
    /// Takes precedence over `trust_at_least_profile_threshold` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_trust_level: Option<i32>,
}

impl Default for SuccessConditions {
    fn default() -> Self {
        Self {
            requires_ready_to_open_account: true,
            min_concerns_addressed: 0,
            trust_at_least_profile_threshold: true,
            min_trust_level: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuccessOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_ready_to_open_account: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_concerns_addressed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_at_least_profile_threshold: Option<bool>,
    /// Outer `None` keeps the base value, `Some(None)` clears it.
    #[serde(
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_trust_level: Option<Option<i32>>,
}

/// Maps a present field (including an explicit `null`) to `Some`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl SuccessOverride {
    pub fn apply(&self, base: &SuccessConditions) -> SuccessConditions {
        SuccessConditions {
            requires_ready_to_open_account: self
                .requires_ready_to_open_account
                .unwrap_or(base.requires_ready_to_open_account),
            min_concerns_addressed: self
                .min_concerns_addressed
                .unwrap_or(base.min_concerns_addressed),
            trust_at_least_profile_threshold: self
                .trust_at_least_profile_threshold
                .unwrap_or(base.trust_at_least_profile_threshold),
            min_trust_level: self.min_trust_level.unwrap_or(base.min_trust_level),
        }
    }
}

/// One qualitative evaluation dimension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Criterion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringRules {
    pub base_score: i32,
    pub success_bonus: i32,
    pub trust_point_per_level: i32,
    pub concern_addressed_bonus: i32,
    pub fast_success_turns_threshold: u32,
    pub fast_success_bonus: i32,
    pub max_total_score: i32,
    pub bonuses: Vec<ScoreRule>,
    pub penalties: Vec<ScoreRule>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            base_score: 50,
            success_bonus: 20,
            trust_point_per_level: 2,
            concern_addressed_bonus: 5,
            fast_success_turns_threshold: 10,
            fast_success_bonus: 10,
            max_total_score: 100,
            bonuses: Vec::new(),
            penalties: Vec::new(),
        }
    }
}

/// Keyword/regex rule matched against everything the trainee said.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoreRule {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Signed points added when the rule matches. Zero disables the rule.
    pub delta: i32,
    pub keyword_any: Vec<String>,
    pub regex_any: Vec<String>,
}

impl ScoreRule {
    pub fn label(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }
}

// ============================================================================
// Catalog lookups
// ============================================================================

impl TrainingConfig {
    pub fn find_profile(&self, id: u32) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn find_scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn find_mental_state(&self, id: &str) -> Option<&MentalState> {
        self.mental_states.iter().find(|m| m.id == id)
    }

    /// Pick a scenario for a new session.
    ///
    /// An explicit id wins, then the profile's default, otherwise a random
    /// entry. "random" skips the profile default; an unknown id falls back to
    /// random. Empty catalog → `None`.
    pub fn select_scenario<R: Rng + ?Sized>(
        &self,
        requested: Option<&str>,
        profile: &Profile,
        rng: &mut R,
    ) -> Option<Scenario> {
        pick(
            &self.scenarios,
            |s| s.id.as_str(),
            requested,
            profile.default_scenario_id.as_deref(),
            rng,
        )
        .cloned()
    }

    pub fn select_mental_state<R: Rng + ?Sized>(
        &self,
        requested: Option<&str>,
        profile: &Profile,
        rng: &mut R,
    ) -> Option<MentalState> {
        pick(
            &self.mental_states,
            |m| m.id.as_str(),
            requested,
            profile.default_mental_state_id.as_deref(),
            rng,
        )
        .cloned()
    }
}

const RANDOM_ID: &str = "random";

fn pick<'a, T, R: Rng + ?Sized>(
    items: &'a [T],
    id_of: impl Fn(&T) -> &str,
    requested: Option<&str>,
    profile_default: Option<&str>,
    rng: &mut R,
) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let wanted = match requested.map(str::trim) {
        Some(RANDOM_ID) => None,
        Some(id) if !id.is_empty() => Some(id),
        _ => profile_default.filter(|id| !id.is_empty() && *id != RANDOM_ID),
    };
    wanted
        .and_then(|id| items.iter().find(|&item| id_of(item) == id))
        .or_else(|| items.choose(rng))
}

// ============================================================================
// External layer
// ============================================================================

/// Partial training config as read from disk. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrainingLayer {
    pub version: Option<u32>,
    pub profiles: Option<Vec<Profile>>,
    pub scenarios: Option<Vec<Scenario>>,
    pub mental_states: Option<Vec<MentalState>>,
    pub goals: Option<GoalsLayer>,
    pub evaluation_criteria: Option<BTreeMap<String, Criterion>>,
    pub scoring_rules: Option<ScoringLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoalsLayer {
    pub end_conditions: Option<EndConditionsLayer>,
    pub success_conditions: Option<SuccessOverride>,
    pub success_conditions_by_difficulty: Option<BTreeMap<String, SuccessOverride>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndConditionsLayer {
    pub max_turns: Option<u32>,
    pub min_trust_to_continue: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoringLayer {
    pub base_score: Option<i32>,
    pub success_bonus: Option<i32>,
    pub trust_point_per_level: Option<i32>,
    pub concern_addressed_bonus: Option<i32>,
    pub fast_success_turns_threshold: Option<u32>,
    pub fast_success_bonus: Option<i32>,
    pub max_total_score: Option<i32>,
    pub bonuses: Option<Vec<ScoreRule>>,
    pub penalties: Option<Vec<ScoreRule>>,
}

impl TrainingLayer {
    /// Parse a layer from a file; `.toml` files are TOML, anything else JSON.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read training config: {}", path.display()))?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            toml::from_str(&content).with_context(|| "Failed to parse TOML training config")
        } else {
            serde_json::from_str(&content).with_context(|| "Failed to parse JSON training config")
        }
    }
}

impl TrainingConfig {
    /// Merge an external layer onto this config. Pure; lists and the criteria
    /// map are replaced wholesale, scalar policy fields one by one.
    pub fn merged(mut self, layer: TrainingLayer) -> Self {
        if let Some(v) = layer.version {
            self.version = v;
        }
        if let Some(v) = layer.profiles {
            self.profiles = v;
        }
        if let Some(v) = layer.scenarios {
            self.scenarios = v;
        }
        if let Some(v) = layer.mental_states {
            self.mental_states = v;
        }
        if let Some(goals) = layer.goals {
            self.goals.merge(goals);
        }
        if let Some(v) = layer.evaluation_criteria {
            self.evaluation_criteria = v;
        }
        if let Some(scoring) = layer.scoring_rules {
            self.scoring_rules.merge(scoring);
        }
        self
    }

    /// Defaults plus the optional layer.
    pub fn resolve(layer: Option<TrainingLayer>) -> Self {
        match layer {
            Some(layer) => Self::default().merged(layer),
            None => Self::default(),
        }
    }
}

impl GoalsConfig {
    fn merge(&mut self, layer: GoalsLayer) {
        if let Some(end) = layer.end_conditions {
            if let Some(v) = end.max_turns {
                self.end_conditions.max_turns = v;
            }
            if let Some(v) = end.min_trust_to_continue {
                self.end_conditions.min_trust_to_continue = v;
            }
        }
        if let Some(success) = layer.success_conditions {
            self.success_conditions = success.apply(&self.success_conditions);
        }
        if let Some(by_difficulty) = layer.success_conditions_by_difficulty {
            for (level, over) in by_difficulty {
                self.success_conditions_by_difficulty
                    .insert(level.to_lowercase(), over);
            }
        }
    }
}

impl ScoringRules {
    fn merge(&mut self, layer: ScoringLayer) {
        let ScoringLayer {
            base_score,
            success_bonus,
            trust_point_per_level,
            concern_addressed_bonus,
            fast_success_turns_threshold,
            fast_success_bonus,
            max_total_score,
            bonuses,
            penalties,
        } = layer;
        self.base_score = base_score.unwrap_or(self.base_score);
        self.success_bonus = success_bonus.unwrap_or(self.success_bonus);
        self.trust_point_per_level = trust_point_per_level.unwrap_or(self.trust_point_per_level);
        self.concern_addressed_bonus =
            concern_addressed_bonus.unwrap_or(self.concern_addressed_bonus);
        self.fast_success_turns_threshold =
            fast_success_turns_threshold.unwrap_or(self.fast_success_turns_threshold);
        self.fast_success_bonus = fast_success_bonus.unwrap_or(self.fast_success_bonus);
        self.max_total_score = max_total_score.unwrap_or(self.max_total_score);
        if let Some(v) = bonuses {
            self.bonuses = v;
        }
        if let Some(v) = penalties {
            self.penalties = v;
        }
    }
}

// ============================================================================
// Provider (process-lifetime cache)
// ============================================================================

/// Resolves and caches the training config. Never fails: a missing or broken
/// file yields the built-in defaults.
pub struct TrainingConfigProvider {
    path: Option<PathBuf>,
    cache: ArcSwapOption<TrainingConfig>,
}

impl TrainingConfigProvider {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: Some(path.into()),
            cache: ArcSwapOption::empty(),
        }
    }

    /// Provider that always serves the given config (no file behind it).
    pub fn fixed(config: TrainingConfig) -> Self {
        Self {
            path: None,
            cache: ArcSwapOption::from_pointee(config),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn resolve(&self) -> Arc<TrainingConfig> {
        if let Some(cached) = self.cache.load_full() {
            return cached;
        }
        self.reload()
    }

    /// Re-read the file and replace the cached config.
    pub fn reload(&self) -> Arc<TrainingConfig> {
        let Some(path) = self.path.as_deref() else {
            return self
                .cache
                .load_full()
                .unwrap_or_else(|| Arc::new(TrainingConfig::default()));
        };
        let layer = match TrainingLayer::from_path(path) {
            Ok(layer) => Some(layer),
            Err(e) => {
                tracing::info!(
                    "Training config unavailable ({:#}), using built-in defaults",
                    e
                );
                None
            }
        };
        let config = Arc::new(TrainingConfig::resolve(layer));
        tracing::info!(
            "Training config resolved: {} profiles, {} scenarios, {} mental states",
            config.profiles.len(),
            config.scenarios.len(),
            config.mental_states.len()
        );
        self.cache.store(Some(config.clone()));
        config
    }
}
