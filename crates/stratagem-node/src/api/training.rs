//! Training, planning and learned-state endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use stratagem_core::{ActionId, StratagemError};
use stratagem_planner::{
    EpisodeOutcome, EstimatorSnapshot, EstimatorStore, TrainingReport, Trajectory, TrajectoryArchive,
};
use tracing::info;

use super::{join_failed, reject, ApiResult, ScenarioRequest};
use crate::state::AppState;

/// Response after a training run.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainResponse {
    pub report: TrainingReport,
    pub estimator_version: u64,
    pub learned_values: usize,
}

/// Request for a greedy plan.
#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    #[serde(flatten)]
    pub scenario: ScenarioRequest,

    /// Step budget; defaults to the configured `max_steps`.
    pub max_steps: Option<usize>,
}

/// The best plan found.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlanResponse {
    pub outcome: EpisodeOutcome,
    pub chain: Vec<ActionId>,
    pub steps: usize,
    pub total_reward: f64,
    pub total_cost: f64,
}

/// Archived trajectory, without its per-step states.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrajectorySummary {
    pub id: String,
    pub started_at: String,
    pub outcome: EpisodeOutcome,
    pub chain: Vec<ActionId>,
    pub steps: usize,
    pub total_reward: f64,
}

impl From<&Trajectory> for TrajectorySummary {
    fn from(trajectory: &Trajectory) -> Self {
        Self {
            id: trajectory.id.to_string(),
            started_at: trajectory.started_at.to_rfc3339(),
            outcome: trajectory.outcome,
            chain: trajectory.chain(),
            steps: trajectory.len(),
            total_reward: trajectory.total_reward,
        }
    }
}

/// Train the shared learner on a scenario, then save a snapshot of its estimator.
pub async fn train(
    State(state): State<AppState>,
    Json(req): Json<ScenarioRequest>,
) -> ApiResult<(StatusCode, Json<TrainResponse>)> {
    let scenario = req.resolve(&state)?;

    // The shared learner is only replaced once a run completes.
    let mut guard = state.learner.write().await;
    let mut learner = guard.clone();
    let trainer = state.trainer.clone();

    let (learner, report) = tokio::task::spawn_blocking(move || {
        trainer
            .train(&mut learner, &scenario.initial, &scenario.goal)
            .map(|report| (learner, report))
    })
    .await
    .map_err(join_failed)?
    .map_err(reject)?;

    *guard = learner;

    let snapshot = guard.estimator().snapshot(&state.catalog, state.trainer.encoder());
    let learned_values = snapshot.entries.len();
    let estimator_version = state.estimators.save(snapshot).map_err(reject)?;

    info!(
        "Training run stored as estimator version {} ({} successes)",
        estimator_version, report.successes
    );

    Ok((
        StatusCode::CREATED,
        Json(TrainResponse {
            report,
            estimator_version,
            learned_values,
        }),
    ))
}

/// Exploitation-only rollout from the current estimator.
pub async fn plan(State(state): State<AppState>, Json(req): Json<PlanRequest>) -> ApiResult<Json<PlanResponse>> {
    let scenario = req.scenario.resolve(&state)?;
    let max_steps = req.max_steps.unwrap_or(state.config().max_steps);

    let estimator = state.learner.read().await.estimator().clone();
    let trainer = state.trainer.clone();

    let trajectory = tokio::task::spawn_blocking(move || {
        trainer.plan(&estimator, &scenario.initial, &scenario.goal, max_steps)
    })
    .await
    .map_err(join_failed)?
    .map_err(reject)?;

    Ok(Json(PlanResponse {
        outcome: trajectory.outcome,
        chain: trajectory.chain(),
        steps: trajectory.len(),
        total_reward: trajectory.total_reward,
        total_cost: trajectory.total_cost(),
    }))
}

/// The most recently saved estimator snapshot.
pub async fn latest_estimator(State(state): State<AppState>) -> ApiResult<Json<EstimatorSnapshot>> {
    state
        .estimators
        .load()
        .map_err(reject)?
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No estimator has been trained".to_string()))
}

/// A specific estimator version.
pub async fn estimator_version(
    State(state): State<AppState>,
    Path(version): Path<u64>,
) -> ApiResult<Json<EstimatorSnapshot>> {
    let snapshot = state.estimators.load_version(version).map_err(reject)?.ok_or_else(|| {
        reject(StratagemError::NotFound {
            resource_type: "estimator".to_string(),
            id: version.to_string(),
        })
    })?;
    Ok(Json(snapshot))
}

/// Successful training trajectories, oldest first.
pub async fn list_trajectories(State(state): State<AppState>) -> ApiResult<Json<Vec<TrajectorySummary>>> {
    let trajectories = state.archive.list().map_err(reject)?;
    Ok(Json(trajectories.iter().map(TrajectorySummary::from).collect()))
}
