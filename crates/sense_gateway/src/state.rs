use sense_core::TrainingConfigProvider;
use sense_persona::SessionStore;
use sense_reasoning::{HttpOracle, Oracle, OracleBudget};
use std::sync::Arc;

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub oracle: Arc<dyn Oracle>,
    pub training: Arc<TrainingConfigProvider>,
    pub budget: OracleBudget,
    /// Present when `oracle` is the HTTP adapter; backs `/api/llm/status`.
    pub http_oracle: Option<Arc<HttpOracle>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        oracle: Arc<dyn Oracle>,
        training: Arc<TrainingConfigProvider>,
    ) -> Self {
        Self {
            store,
            oracle,
            training,
            budget: OracleBudget::default(),
            http_oracle: None,
        }
    }

    /// State backed by the production HTTP oracle.
    pub fn with_http_oracle(
        store: Arc<dyn SessionStore>,
        oracle: Arc<HttpOracle>,
        training: Arc<TrainingConfigProvider>,
    ) -> Self {
        Self {
            http_oracle: Some(oracle.clone()),
            ..Self::new(store, oracle, training)
        }
    }

    pub fn with_budget(mut self, budget: OracleBudget) -> Self {
        self.budget = budget;
        self
    }
}
