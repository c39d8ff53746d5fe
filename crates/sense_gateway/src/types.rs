use sense_core::{Difficulty, MentalState, Profile, Scenario};
use sense_persona::{OpeningLine, SessionStatus, TurnOutcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Profile annotated for the picker.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    #[serde(flatten)]
    pub profile: Profile,
    pub difficulty_level: Difficulty,
    pub difficulty: &'static str,
    pub difficulty_stars: u8,
}

impl From<&Profile> for ProfileSummary {
    fn from(profile: &Profile) -> Self {
        let difficulty = profile.difficulty();
        Self {
            profile: profile.clone(),
            difficulty_level: difficulty,
            difficulty: difficulty.label(),
            difficulty_stars: difficulty.stars(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingOptions {
    pub scenarios: Vec<Scenario>,
    pub mental_states: Vec<MentalState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionRequest {
    pub profile_id: u32,
    #[serde(default)]
    pub scenario_id: Option<String>,
    #[serde(default)]
    pub mental_state_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub opening: OpeningLine,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub turn: TurnOutcome,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub profiles: usize,
    pub scenarios: usize,
    pub mental_states: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}
