//! HTTP API.

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use stratagem_core::{Goal, StratagemError};
use stratagem_state::decode_from_source;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::scenario::Scenario;
use crate::state::AppState;

pub mod catalog;
pub mod evaluate;
pub mod health;
pub mod training;

/// Handler error: a status code and a message.
pub type ApiError = (StatusCode, String);

/// Handler result.
pub type ApiResult<T> = Result<T, ApiError>;

/// Map an engine error to an HTTP response.
pub fn reject(err: StratagemError) -> ApiError {
    let status = match &err {
        StratagemError::NotFound { .. } => StatusCode::NOT_FOUND,
        e if e.is_input_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

pub(crate) fn join_failed(err: tokio::task::JoinError) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Worker task failed: {}", err))
}

/// Starting snapshot and goal, either of which may fall back to the default scenario.
#[derive(Debug, Default, Deserialize)]
pub struct ScenarioRequest {
    /// State snapshot.
    pub initial: Option<Value>,

    /// Goal.
    pub goal: Option<Goal>,
}

impl ScenarioRequest {
    /// Fill the gaps from the default scenario.
    pub fn resolve(self, state: &AppState) -> ApiResult<Scenario> {
        let fallback = state.default_scenario.as_deref();

        let initial = match self.initial {
            Some(raw) => decode_from_source(&raw).map_err(reject)?,
            None => fallback
                .map(|s| s.initial.clone())
                .ok_or_else(|| (StatusCode::BAD_REQUEST, "No initial state given".to_string()))?,
        };
        let goal = match self.goal {
            Some(goal) => goal,
            None => fallback
                .map(|s| s.goal.clone())
                .ok_or_else(|| (StatusCode::BAD_REQUEST, "No goal given".to_string()))?,
        };
        goal.validate().map_err(reject)?;

        Ok(Scenario { initial, goal })
    }
}

/// Create the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        // Catalog
        .route("/api/v1/actions", get(catalog::list_actions))
        .route("/api/v1/actions/eligible", post(catalog::eligible_actions))
        // Learning
        .route("/api/v1/train", post(training::train))
        .route("/api/v1/plan", post(training::plan))
        .route("/api/v1/estimator", get(training::latest_estimator))
        .route("/api/v1/estimator/:version", get(training::estimator_version))
        .route("/api/v1/trajectories", get(training::list_trajectories))
        // Evaluation
        .route("/api/v1/evaluate", post(evaluate::evaluate_chain))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
