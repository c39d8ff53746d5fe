use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{
    ChatRequest, ChatResponse, ProfileSummary, ReloadResponse, StartSessionRequest,
    StartSessionResponse, TrainingOptions,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use futures_util::FutureExt;
use sense_core::config::GatewayConfig;
use sense_core::Criterion;
use sense_persona::{spawn_sweeper, SessionStatus, SharedSession, TrainingSession};
use sense_reasoning::OracleStatus;
use sense_scoring::{EvaluationInput, EvaluationResult, Evaluator};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

/// The training HTTP server.
///
/// - `GET  /health`
/// - `GET  /api/profiles`, `/api/training/options`, `/api/evaluation-criteria`
/// - `POST /api/session/start`
/// - `POST /api/session/:id/chat`, `/api/session/:id/evaluate`
/// - `GET  /api/session/:id/status`, `DELETE /api/session/:id`
/// - `GET  /api/llm/status`, `POST /api/config/reload`
pub struct GatewayServer {
    state: AppState,
    host: String,
    port: u16,
    session_ttl: Duration,
    sweep_every: Duration,
}

impl GatewayServer {
    pub fn new(state: AppState, cfg: &GatewayConfig) -> Self {
        Self {
            state,
            host: cfg.host.clone(),
            port: cfg.port,
            session_ttl: Duration::from_secs(cfg.session_ttl_secs),
            sweep_every: Duration::from_secs(cfg.sweep_interval_secs),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bind, start the idle-session sweeper and serve until the listener fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Gateway listening on {}", listener.local_addr()?);

        let sweeper = spawn_sweeper(self.state.store.clone(), self.session_ttl, self.sweep_every);
        let app = router(self.state);
        let result = axum::serve(listener, app).await;
        if let Some(handle) = sweeper {
            handle.abort();
        }
        result.map_err(Into::into)
    }

    /// Start the server in a background task and return the join handle.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!("Gateway server error: {:#}", e);
            }
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/profiles", get(list_profiles))
        .route("/api/training/options", get(training_options))
        .route("/api/evaluation-criteria", get(evaluation_criteria))
        .route("/api/session/start", post(start_session))
        .route("/api/session/:id", axum::routing::delete(delete_session))
        .route("/api/session/:id/chat", post(chat))
        .route("/api/session/:id/evaluate", post(evaluate))
        .route("/api/session/:id/status", get(session_status))
        .route("/api/llm/status", get(llm_status))
        .route("/api/config/reload", post(reload_config))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn list_profiles(State(state): State<AppState>) -> Json<Vec<ProfileSummary>> {
    let config = state.training.resolve();
    Json(config.profiles.iter().map(ProfileSummary::from).collect())
}

async fn training_options(State(state): State<AppState>) -> Json<TrainingOptions> {
    let config = state.training.resolve();
    Json(TrainingOptions {
        scenarios: config.scenarios.clone(),
        mental_states: config.mental_states.clone(),
    })
}

async fn evaluation_criteria(State(state): State<AppState>) -> Json<BTreeMap<String, Criterion>> {
    Json(state.training.resolve().evaluation_criteria.clone())
}

/// POST /api/session/start: bind a profile, pick scenario and mood, and
/// generate the persona's opening line.
async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    let config = state.training.resolve();
    let profile = config
        .find_profile(req.profile_id)
        .ok_or_else(|| ApiError::NotFound(format!("用户画像不存在: {}", req.profile_id)))?;

    let (scenario, mental_state) = {
        let mut rng = rand::thread_rng();
        (
            config.select_scenario(req.scenario_id.as_deref(), profile, &mut rng),
            config.select_mental_state(req.mental_state_id.as_deref(), profile, &mut rng),
        )
    };

    let mut session = TrainingSession::new(
        Arc::new(profile.clone()),
        scenario.map(Arc::new),
        mental_state.map(Arc::new),
        &config.goals,
    )
    .with_budget(state.budget);
    let opening = session.opening(state.oracle.as_ref()).await;

    let session_id = session.id();
    let status = session.status();
    state.store.put(session).await;
    tracing::info!(
        session = %session_id,
        profile = req.profile_id,
        scenario = ?status.scenario.as_ref().map(|s| &s.id),
        mental_state = ?status.mental_state.as_ref().map(|m| &m.id),
        "Session started"
    );

    Ok(Json(StartSessionResponse {
        session_id,
        opening,
        status,
    }))
}

/// POST /api/session/:id/chat: one trainee turn.
async fn chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let shared = lookup(&state, &id).await?;
    let mut session = shared.lock().await;

    let outcome = AssertUnwindSafe(session.respond(state.oracle.as_ref(), &req.message))
        .catch_unwind()
        .await;
    let turn = match outcome {
        Ok(result) => result?,
        Err(_) => {
            tracing::error!(session = %id, "Turn processing panicked, returning neutral reply");
            session.record_interrupted_turn()
        }
    };

    Ok(Json(ChatResponse {
        turn,
        status: session.status(),
    }))
}

/// POST /api/session/:id/evaluate: score the session as it stands.
async fn evaluate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EvaluationResult>, ApiError> {
    let shared = lookup(&state, &id).await?;
    let input = EvaluationInput::from_session(&*shared.lock().await);

    let evaluator =
        Evaluator::from_config(&state.training.resolve()).with_params(state.budget.evaluation);
    let result = AssertUnwindSafe(evaluator.evaluate(state.oracle.as_ref(), &input))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            tracing::error!(session = %id, "Evaluation panicked, returning default result");
            EvaluationResult::interrupted(&input, evaluator.criteria())
        });
    Ok(Json(result))
}

async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    let shared = lookup(&state, &id).await?;
    let status = shared.lock().await.status();
    Ok(Json(status))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let uuid = parse_id(&id)?;
    if !state.store.delete(&uuid).await {
        return Err(ApiError::session_not_found());
    }
    Ok(Json(serde_json::json!({ "deleted": uuid })))
}

async fn llm_status(State(state): State<AppState>) -> Result<Json<OracleStatus>, ApiError> {
    let oracle = state
        .http_oracle
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("当前未使用 HTTP 模型后端".to_string()))?;
    Ok(Json(oracle.status().await))
}

async fn reload_config(State(state): State<AppState>) -> Json<ReloadResponse> {
    let config = state.training.reload();
    Json(ReloadResponse {
        profiles: config.profiles.len(),
        scenarios: config.scenarios.len(),
        mental_states: config.mental_states.len(),
        path: state.training.path().map(|p| p.display().to_string()),
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::session_not_found())
}

async fn lookup(state: &AppState, id: &str) -> Result<SharedSession, ApiError> {
    let uuid = parse_id(id)?;
    state
        .store
        .get(&uuid)
        .await
        .ok_or_else(ApiError::session_not_found)
}
