//! Reward function.

use serde::{Deserialize, Serialize};
use stratagem_core::{Goal, StateView};
use stratagem_state::State;

/// Reward per privilege rank gained.
pub const DEFAULT_PRIVILEGE_GAIN_WEIGHT: f64 = 10.0;

/// Flat bonus for the transition that first satisfies the goal.
pub const DEFAULT_GOAL_BONUS: f64 = 50.0;

/// Added on every step to penalize chain length.
pub const DEFAULT_STEP_PENALTY: f64 = -1.0;

/// Tunable reward weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    /// Multiplied by the number of privilege ranks gained.
    pub privilege_gain: f64,

    /// Added when the goal becomes satisfied.
    pub goal_bonus: f64,

    /// Added on every step (normally negative).
    pub step_penalty: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            privilege_gain: DEFAULT_PRIVILEGE_GAIN_WEIGHT,
            goal_bonus: DEFAULT_GOAL_BONUS,
            step_penalty: DEFAULT_STEP_PENALTY,
        }
    }
}

/// Scores state transitions relative to a goal.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewardFunction {
    weights: RewardWeights,
}

impl RewardFunction {
    /// Create a reward function with the given weights.
    pub fn new(weights: RewardWeights) -> Self {
        Self { weights }
    }

    /// The weights in use.
    pub fn weights(&self) -> &RewardWeights {
        &self.weights
    }

    /// Score the transition `old -> new`.
    pub fn score(&self, old: &State, new: &State, goal: &Goal) -> f64 {
        let gained = new.privilege().rank().saturating_sub(old.privilege().rank());
        let mut reward = self.weights.privilege_gain * f64::from(gained);

        if goal.is_satisfied(new) && !goal.is_satisfied(old) {
            reward += self.weights.goal_bonus;
        }

        reward + self.weights.step_penalty
    }
}
