//! Chain evaluation: replay a fixed action sequence many times and report reliability.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stratagem_core::{Action, ActionId, Catalog, Goal, Result, StratagemError};
use stratagem_state::State;
use tracing::info;

use crate::config::worker_pool;
use crate::simulator::{derive_seed, Environment, Simulator};

/// How a single replay of a chain ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The goal held after `steps` actions.
    Success { steps: usize, cost: f64 },
    /// The action at `index` failed its reliability roll.
    ActionFailed { index: usize },
    /// The action at `index` was not eligible when its turn came.
    Ineligible { index: usize },
    /// Every action ran but the goal never held.
    Exhausted,
}

/// Aggregate statistics over many replays of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainReport {
    /// The chain evaluated.
    pub chain: Vec<ActionId>,
    /// Number of actions in the chain.
    pub path_length: usize,
    /// Number of replays.
    pub runs: usize,
    /// Replays that reached the goal.
    pub successes: usize,
    /// Replays stopped by a failed action.
    pub action_failures: usize,
    /// Replays stopped by an ineligible action.
    pub ineligible: usize,
    /// Replays that ran out of actions without reaching the goal.
    pub exhausted: usize,
    /// `successes / runs`, or 0 when `runs` is 0.
    pub success_rate: f64,
    /// Mean number of actions on successful replays.
    pub mean_steps_on_success: f64,
    /// Mean accumulated cost on successful replays.
    pub mean_cost_on_success: f64,
}

/// Replays fixed chains against the simulator.
#[derive(Debug, Clone)]
pub struct Evaluator {
    catalog: Arc<Catalog>,
    seed: u64,
    parallelism: Option<usize>,
}

impl Evaluator {
    /// Create an evaluator. Replay `i` is seeded from `(seed, i)`.
    pub fn new(catalog: Arc<Catalog>, seed: u64) -> Self {
        Self {
            catalog,
            seed,
            parallelism: None,
        }
    }

    /// Replay on a dedicated pool of `threads` workers instead of the global one.
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }

    /// Replay `chain` from `initial` in `runs` independent simulated episodes.
    pub fn evaluate(&self, chain: &[ActionId], initial: &State, goal: &Goal, runs: usize) -> Result<ChainReport> {
        goal.validate()?;

        let actions: Vec<&Action> = chain
            .iter()
            .map(|id| {
                self.catalog
                    .require(id.as_str())
                    .map_err(|_| StratagemError::validation(format!("Chain references unknown action '{}'", id)))
            })
            .collect::<Result<_>>()?;

        let replay_all = || {
            (0..runs)
                .into_par_iter()
                .map(|run| self.replay(&actions, initial, goal, run as u64))
                .collect::<Result<Vec<RunOutcome>>>()
        };
        let outcomes = match self.parallelism {
            Some(threads) => worker_pool(threads)?.install(replay_all)?,
            None => replay_all()?,
        };

        let report = summarize(chain, &outcomes);

        info!(
            "Evaluated chain of {} actions over {} runs: success rate {:.3}",
            report.path_length, report.runs, report.success_rate
        );

        Ok(report)
    }

    fn replay(&self, actions: &[&Action], initial: &State, goal: &Goal, run: u64) -> Result<RunOutcome> {
        let mut sim = Simulator::new(self.catalog.clone(), derive_seed(self.seed, run));
        let mut state = initial.clone();
        let base_cost = initial.accumulated_cost();

        for (index, action) in actions.iter().enumerate() {
            if goal.is_satisfied(&state) {
                return Ok(RunOutcome::Success {
                    steps: index,
                    cost: state.accumulated_cost() - base_cost,
                });
            }
            if !self.catalog.is_eligible(action, &state) {
                return Ok(RunOutcome::Ineligible { index });
            }

            let transition = sim.step(&state, action)?;
            if !transition.succeeded {
                return Ok(RunOutcome::ActionFailed { index });
            }
            state = transition.state;
        }

        if goal.is_satisfied(&state) {
            Ok(RunOutcome::Success {
                steps: actions.len(),
                cost: state.accumulated_cost() - base_cost,
            })
        } else {
            Ok(RunOutcome::Exhausted)
        }
    }
}

fn summarize(chain: &[ActionId], outcomes: &[RunOutcome]) -> ChainReport {
    let mut report = ChainReport {
        chain: chain.to_vec(),
        path_length: chain.len(),
        runs: outcomes.len(),
        successes: 0,
        action_failures: 0,
        ineligible: 0,
        exhausted: 0,
        success_rate: 0.0,
        mean_steps_on_success: 0.0,
        mean_cost_on_success: 0.0,
    };

    let mut total_steps = 0usize;
    let mut total_cost = 0.0;

    for outcome in outcomes {
        match *outcome {
            RunOutcome::Success { steps, cost } => {
                report.successes += 1;
                total_steps += steps;
                total_cost += cost;
            }
            RunOutcome::ActionFailed { .. } => report.action_failures += 1,
            RunOutcome::Ineligible { .. } => report.ineligible += 1,
            RunOutcome::Exhausted => report.exhausted += 1,
        }
    }

    if report.runs > 0 {
        report.success_rate = report.successes as f64 / report.runs as f64;
    }
    if report.successes > 0 {
        report.mean_steps_on_success = total_steps as f64 / report.successes as f64;
        report.mean_cost_on_success = total_cost / report.successes as f64;
    }

    report
}
