//! Catalog queries.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stratagem_core::{Action, ActionId};
use stratagem_state::decode_from_source;

use super::{reject, ApiResult};
use crate::state::AppState;

/// Request for the actions eligible in a state.
#[derive(Debug, Deserialize)]
pub struct EligibleRequest {
    /// State snapshot.
    pub state: Value,
}

/// Eligible actions, in catalog order.
#[derive(Debug, Serialize, Deserialize)]
pub struct EligibleResponse {
    pub eligible: Vec<ActionId>,
}

/// List every action in the catalog.
pub async fn list_actions(State(state): State<AppState>) -> Json<Vec<Action>> {
    Json(state.catalog.iter().cloned().collect())
}

/// Actions whose preconditions hold in the given snapshot.
pub async fn eligible_actions(
    State(state): State<AppState>,
    Json(req): Json<EligibleRequest>,
) -> ApiResult<Json<EligibleResponse>> {
    let snapshot = decode_from_source(&req.state).map_err(reject)?;
    let eligible = state
        .catalog
        .eligible_actions(&snapshot)
        .into_iter()
        .map(|action| action.id.clone())
        .collect();

    Ok(Json(EligibleResponse { eligible }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{router, testing};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_actions() {
        let server = TestServer::new(router(testing::app_state(false))).unwrap();
        let actions: Vec<Action> = server.get("/api/v1/actions").await.json();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].id.as_str(), "escalate_a");
    }

    #[tokio::test]
    async fn test_eligible_actions() {
        let server = TestServer::new(router(testing::app_state(false))).unwrap();

        let response = server
            .post("/api/v1/actions/eligible")
            .json(&json!({"state": {"privilege": "limited"}}))
            .await;
        response.assert_status_ok();
        let body: EligibleResponse = response.json();
        assert_eq!(body.eligible, vec![ActionId::new("escalate_b")]);

        let malformed = server
            .post("/api/v1/actions/eligible")
            .json(&json!({"state": {"privilege": "root"}}))
            .await;
        malformed.assert_status(StatusCode::BAD_REQUEST);
    }
}
