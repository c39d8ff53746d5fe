pub mod error;
pub mod http;
pub mod oracle;
pub mod prompts;
pub mod providers;
pub mod reply;

pub use error::OracleError;
pub use http::{HttpOracle, OracleStatus};
pub use oracle::{is_diagnostic, ChatMessage, ChatRole, GenerationParams, Oracle, OracleBudget};
pub use prompts::{EvaluationBrief, PersonaContext, PromptBuilder};
pub use providers::mock::ScriptedOracle;
pub use reply::{parse_reply, OpeningReply, ParsedReply, PersonaReply};
