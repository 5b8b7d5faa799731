//! Chain evaluation endpoint.

use axum::{extract::State, Json};
use serde::Deserialize;
use stratagem_core::ActionId;
use stratagem_planner::ChainReport;

use super::{join_failed, reject, ApiResult, ScenarioRequest};
use crate::state::AppState;

/// Request to replay a fixed chain.
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(flatten)]
    pub scenario: ScenarioRequest,

    /// Actions to replay, in order.
    pub chain: Vec<ActionId>,

    /// Number of replays; defaults to the configured `eval_runs`.
    pub runs: Option<usize>,
}

/// Replay a chain many times and report its reliability.
pub async fn evaluate_chain(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> ApiResult<Json<ChainReport>> {
    let scenario = req.scenario.resolve(&state)?;
    let runs = req.runs.unwrap_or(state.config().eval_runs);
    let evaluator = state.evaluator.clone();
    let chain = req.chain;

    let report = tokio::task::spawn_blocking(move || {
        evaluator.evaluate(&chain, &scenario.initial, &scenario.goal, runs)
    })
    .await
    .map_err(join_failed)?
    .map_err(reject)?;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{router, testing};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_evaluate_default_scenario() {
        let server = TestServer::new(router(testing::app_state(true))).unwrap();

        let response = server
            .post("/api/v1/evaluate")
            .json(&json!({"chain": ["escalate_a", "escalate_b"]}))
            .await;
        response.assert_status_ok();

        let report: ChainReport = response.json();
        assert_eq!(report.runs, 20);
        assert_eq!(report.success_rate, 1.0);
        assert_eq!(report.path_length, 2);
        assert_eq!(report.mean_cost_on_success, 3.0);
    }

    #[tokio::test]
    async fn test_evaluate_unknown_action() {
        let server = TestServer::new(router(testing::app_state(true))).unwrap();
        server
            .post("/api/v1/evaluate")
            .json(&json!({"chain": ["escalate_a", "teleport"], "runs": 5}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
