pub mod config;
pub mod defaults;
pub mod model;
pub mod training;

pub use config::SenseConfig;
pub use model::{
    Difficulty, EventImpact, EventTrigger, MentalState, Profile, Scenario, ScenarioEvent,
    MAX_TRUST, MIN_TRUST,
};
pub use training::{
    Criterion, EndConditions, GoalsConfig, ScoreRule, ScoringRules, SuccessConditions,
    SuccessOverride, TrainingConfig, TrainingConfigProvider, TrainingLayer,
};
