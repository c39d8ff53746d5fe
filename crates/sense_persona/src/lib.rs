pub mod events;
pub mod goals;
pub mod session;
pub mod store;

pub use goals::SuccessCheck;
pub use session::{
    apply_trust_change, low_trust_explanation, EndDetail, EndReason, HistoryEntry, OpeningLine,
    SessionError, SessionStatus, Speaker, TrainingSession, TurnOutcome, INITIAL_TRUST,
    LOW_TRUST_QUIT,
};
pub use store::{spawn_sweeper, InMemorySessionStore, SessionStore, SharedSession};
