pub mod error;
pub mod server;
pub mod state;
pub mod types;

pub use error::ApiError;
pub use server::{router, GatewayServer};
pub use state::AppState;
