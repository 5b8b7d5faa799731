//! Episode driver and trajectories.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use stratagem_core::{ActionId, Catalog, Goal, Result, StratagemError};
use stratagem_state::{State, StateEncoder};
use tracing::debug;
use uuid::Uuid;

use crate::policy::{TransitionRecord, TransitionSink, ValueEstimator};
use crate::reward::RewardFunction;
use crate::simulator::Environment;

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeOutcome {
    /// The goal holds in the final state.
    GoalReached,
    /// No action was eligible and the goal was unmet.
    DeadEnd,
    /// The step budget ran out.
    BudgetExhausted,
}

/// One step of a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    /// State before the action.
    pub state: State,

    /// Action chosen.
    pub action: ActionId,

    /// State after the action.
    pub next_state: State,

    /// Whether the action succeeded.
    pub succeeded: bool,

    /// Reward for the transition.
    pub reward: f64,

    /// Exploration rate in effect when the action was chosen.
    pub exploration_rate: f64,
}

/// Ordered record of one episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Unique identifier for this episode.
    pub id: Uuid,

    /// When the episode started.
    pub started_at: DateTime<Utc>,

    /// State the episode started from.
    pub initial_state: State,

    /// Transitions in order.
    pub steps: Vec<TrajectoryStep>,

    /// Terminal outcome.
    pub outcome: EpisodeOutcome,

    /// Sum of step rewards.
    pub total_reward: f64,
}

impl Trajectory {
    /// Number of steps taken.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step was taken.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns true if the goal was reached.
    pub fn is_success(&self) -> bool {
        self.outcome == EpisodeOutcome::GoalReached
    }

    /// State at the end of the episode.
    pub fn final_state(&self) -> &State {
        self.steps
            .last()
            .map(|step| &step.next_state)
            .unwrap_or(&self.initial_state)
    }

    /// Total cost of every attempted action.
    pub fn total_cost(&self) -> f64 {
        self.final_state().accumulated_cost() - self.initial_state.accumulated_cost()
    }

    /// The actions that succeeded, in order. Failed attempts are dropped, so the
    /// result is a chain suitable for [`Evaluator::evaluate`](crate::Evaluator::evaluate).
    pub fn chain(&self) -> Vec<ActionId> {
        self.steps
            .iter()
            .filter(|step| step.succeeded)
            .map(|step| step.action.clone())
            .collect()
    }
}

/// Inputs shared by every step of an episode.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeSpec<'a> {
    /// Starting state.
    pub initial: &'a State,
    /// Goal that ends the episode successfully.
    pub goal: &'a Goal,
    /// Maximum number of actions.
    pub max_steps: usize,
}

/// Runs episodes: select, step, score, record, until a terminal outcome.
#[derive(Debug, Clone)]
pub struct EpisodeDriver {
    catalog: Arc<Catalog>,
    encoder: Arc<StateEncoder>,
    reward: RewardFunction,
}

impl EpisodeDriver {
    /// Create a driver.
    pub fn new(catalog: Arc<Catalog>, encoder: Arc<StateEncoder>, reward: RewardFunction) -> Self {
        Self {
            catalog,
            encoder,
            reward,
        }
    }

    /// The catalog in use.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// The state encoder in use.
    pub fn encoder(&self) -> &Arc<StateEncoder> {
        &self.encoder
    }

    /// Run one episode from `spec.initial`.
    ///
    /// `exploration` maps the step index within the episode to the exploration rate.
    /// Each transition is handed to `sink` as soon as it happens.
    pub fn run_episode<E, K, R, F>(
        &self,
        env: &mut E,
        estimator: &ValueEstimator,
        sink: &mut K,
        spec: EpisodeSpec<'_>,
        exploration: F,
        rng: &mut R,
    ) -> Result<Trajectory>
    where
        E: Environment + ?Sized,
        K: TransitionSink + ?Sized,
        R: Rng + ?Sized,
        F: Fn(usize) -> f64,
    {
        let started_at = Utc::now();
        let mut state = spec.initial.clone();
        let mut steps = Vec::new();
        let mut total_reward = 0.0;

        let outcome = loop {
            if spec.goal.is_satisfied(&state) {
                break EpisodeOutcome::GoalReached;
            }

            let eligible = self.catalog.eligible_actions(&state);
            if eligible.is_empty() {
                break EpisodeOutcome::DeadEnd;
            }

            if steps.len() >= spec.max_steps {
                break EpisodeOutcome::BudgetExhausted;
            }

            let rate = exploration(steps.len());
            let key = self.encoder.state_key(&state);
            let action = estimator
                .select_action(&key, &eligible, rate, rng)
                .ok_or_else(|| StratagemError::Internal("No action selected".to_string()))?;

            let transition = env.step(&state, action)?;
            let reward = self.reward.score(&state, &transition.state, spec.goal);
            total_reward += reward;

            let next_eligible = self
                .catalog
                .eligible_actions(&transition.state)
                .iter()
                .map(|a| a.id.clone())
                .collect();

            sink.record(TransitionRecord {
                state: key,
                action: action.id.clone(),
                reward,
                next_state: self.encoder.state_key(&transition.state),
                next_eligible,
                terminal: spec.goal.is_satisfied(&transition.state),
            });

            steps.push(TrajectoryStep {
                state: std::mem::replace(&mut state, transition.state.clone()),
                action: action.id.clone(),
                next_state: transition.state,
                succeeded: transition.succeeded,
                reward,
                exploration_rate: rate,
            });
        };

        debug!(
            "Episode finished: {:?} after {} steps, reward {:.1}",
            outcome,
            steps.len(),
            total_reward
        );

        Ok(Trajectory {
            id: Uuid::new_v4(),
            started_at,
            initial_state: spec.initial.clone(),
            steps,
            outcome,
            total_reward,
        })
    }
}
