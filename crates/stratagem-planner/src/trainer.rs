//! Training and planning.
//!
//! Training is a rollout/aggregate loop: each batch of episodes runs in parallel
//! against one frozen estimator, every worker collecting its own transition records,
//! and the records are folded into the learner in episode order once the batch is
//! complete. Episode `i` draws from seeds derived from `(seed, 2i)` and `(seed, 2i + 1)`,
//! so a run is reproducible regardless of how many threads execute it.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stratagem_core::{Catalog, Goal, Result, StratagemError};
use stratagem_state::{State, StateEncoder};
use tracing::{debug, info, warn};

use crate::config::PlannerConfig;
use crate::episode::{EpisodeDriver, EpisodeOutcome, EpisodeSpec, Trajectory};
use crate::policy::{NullSink, QLearner, TransitionRecord, ValueEstimator};
use crate::reward::RewardFunction;
use crate::simulator::{derive_seed, Simulator};
use crate::store::TrajectoryArchive;

/// Seed stream reserved for planning rollouts, disjoint from training episodes.
const PLAN_STREAM: u64 = u64::MAX;

/// Per-batch training statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Index of the first episode in the batch.
    pub first_episode: usize,
    /// Episodes in the batch.
    pub episodes: usize,
    /// Episodes that reached the goal.
    pub successes: usize,
    /// Transitions folded into the estimator.
    pub transitions: usize,
    /// Mean total reward per episode.
    pub mean_reward: f64,
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Episodes run.
    pub episodes: usize,
    /// Episodes that reached the goal.
    pub successes: usize,
    /// Episodes that ran out of eligible actions.
    pub dead_ends: usize,
    /// Episodes that hit the step budget.
    pub budget_exhausted: usize,
    /// Total steps simulated.
    pub total_steps: u64,
    /// Exploration rate the next episode would use.
    pub final_exploration_rate: f64,
    /// Statistics per batch, in order.
    pub batches: Vec<BatchSummary>,
}

impl TrainingReport {
    /// Fraction of episodes that reached the goal.
    pub fn success_rate(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.successes as f64 / self.episodes as f64
        }
    }
}

/// Trains a [`QLearner`] against the simulator and extracts plans from it.
pub struct Trainer {
    catalog: Arc<Catalog>,
    encoder: Arc<StateEncoder>,
    config: PlannerConfig,
    driver: EpisodeDriver,
    archive: Option<Arc<dyn TrajectoryArchive>>,
}

impl Trainer {
    /// Create a trainer with an explicit encoder.
    pub fn new(catalog: Arc<Catalog>, encoder: Arc<StateEncoder>, config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        let driver = EpisodeDriver::new(
            catalog.clone(),
            encoder.clone(),
            RewardFunction::new(config.reward),
        );

        Ok(Self {
            catalog,
            encoder,
            config,
            driver,
            archive: None,
        })
    }

    /// Create a trainer whose encoder tracks every fact the catalog or `seeds` mention.
    pub fn from_catalog(catalog: Arc<Catalog>, config: PlannerConfig, seeds: &[State]) -> Result<Self> {
        let encoder = Arc::new(StateEncoder::from_catalog(&catalog, seeds));
        Self::new(catalog, encoder, config)
    }

    /// Archive every successful training trajectory.
    pub fn with_archive(mut self, archive: Arc<dyn TrajectoryArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// The catalog in use.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// The state encoder in use.
    pub fn encoder(&self) -> &Arc<StateEncoder> {
        &self.encoder
    }

    /// A fresh learner using the configured hyperparameters.
    pub fn learner(&self) -> QLearner {
        QLearner::new(self.config.learning)
    }

    /// Run `config.episodes` training episodes from `initial` toward `goal`.
    ///
    /// Only the learner's estimator is mutated, once per batch.
    pub fn train(&self, learner: &mut QLearner, initial: &State, goal: &Goal) -> Result<TrainingReport> {
        self.check_scenario(initial, goal)?;

        let pool = self.config.worker_pool()?;

        let mut report = TrainingReport {
            episodes: 0,
            successes: 0,
            dead_ends: 0,
            budget_exhausted: 0,
            total_steps: 0,
            final_exploration_rate: 0.0,
            batches: Vec::new(),
        };

        info!(
            "Training {} episodes in batches of {} on {} threads",
            self.config.episodes, self.config.batch_size, self.config.parallelism
        );

        let mut first = 0;
        while first < self.config.episodes {
            let last = (first + self.config.batch_size).min(self.config.episodes);
            let global_steps = report.total_steps;

            let results: Vec<(Trajectory, Vec<TransitionRecord>)> = {
                let estimator = learner.estimator();
                pool.install(|| {
                    (first..last)
                        .into_par_iter()
                        .map(|episode| self.training_episode(estimator, initial, goal, episode, global_steps))
                        .collect::<Result<_>>()
                })?
            };

            let mut successes = 0;
            let mut total_reward = 0.0;
            for (trajectory, records) in results {
                report.total_steps += trajectory.len() as u64;
                total_reward += trajectory.total_reward;
                match trajectory.outcome {
                    EpisodeOutcome::GoalReached => successes += 1,
                    EpisodeOutcome::DeadEnd => report.dead_ends += 1,
                    EpisodeOutcome::BudgetExhausted => report.budget_exhausted += 1,
                }

                learner.extend(records);

                if trajectory.is_success() {
                    if let Some(archive) = &self.archive {
                        if let Err(e) = archive.archive(&trajectory) {
                            warn!("Failed to archive trajectory {}: {}", trajectory.id, e);
                        }
                    }
                }
            }

            let transitions = learner.update();
            let episodes = last - first;
            report.episodes += episodes;
            report.successes += successes;

            let summary = BatchSummary {
                first_episode: first,
                episodes,
                successes,
                transitions,
                mean_reward: total_reward / episodes as f64,
            };
            debug!(
                "Batch at episode {}: {}/{} successes, {} transitions, mean reward {:.2}",
                summary.first_episode, summary.successes, summary.episodes, summary.transitions, summary.mean_reward
            );
            report.batches.push(summary);

            first = last;
        }

        report.final_exploration_rate = self
            .config
            .exploration
            .rate_for(report.episodes as u64, report.total_steps);

        info!(
            "Training finished: {}/{} successes, {} dead ends, {} over budget, exploration now {:.3}",
            report.successes, report.episodes, report.dead_ends, report.budget_exhausted, report.final_exploration_rate
        );

        Ok(report)
    }

    fn training_episode(
        &self,
        estimator: &ValueEstimator,
        initial: &State,
        goal: &Goal,
        episode: usize,
        global_steps: u64,
    ) -> Result<(Trajectory, Vec<TransitionRecord>)> {
        let index = episode as u64;
        let mut env = Simulator::new(self.catalog.clone(), derive_seed(self.config.seed, 2 * index));
        let mut rng = StdRng::seed_from_u64(derive_seed(self.config.seed, 2 * index + 1));
        let mut records = Vec::new();
        let schedule = self.config.exploration;

        let trajectory = self.driver.run_episode(
            &mut env,
            estimator,
            &mut records,
            EpisodeSpec {
                initial,
                goal,
                max_steps: self.config.max_steps,
            },
            |step| schedule.rate_for(index, global_steps + step as u64),
            &mut rng,
        )?;

        Ok((trajectory, records))
    }

    /// Extract the best greedy trajectory from a trained estimator.
    ///
    /// Runs `config.plan_attempts` exploitation-only rollouts (each against a fresh
    /// simulator seed) and keeps the best: reaching the goal first, then fewer steps,
    /// then higher total reward. Earlier attempts win exact ties.
    pub fn plan(&self, estimator: &ValueEstimator, initial: &State, goal: &Goal, max_steps: usize) -> Result<Trajectory> {
        self.check_scenario(initial, goal)?;
        if max_steps == 0 {
            return Err(StratagemError::validation("max_steps must be at least 1"));
        }

        let base = derive_seed(self.config.seed, PLAN_STREAM);
        let pool = self.config.worker_pool()?;
        let attempts: Vec<Trajectory> = pool.install(|| {
            (0..self.config.plan_attempts as u64)
                .into_par_iter()
                .map(|attempt| {
                    let mut env = Simulator::new(self.catalog.clone(), derive_seed(base, 2 * attempt));
                    let mut rng = StdRng::seed_from_u64(derive_seed(base, 2 * attempt + 1));
                    self.driver.run_episode(
                        &mut env,
                        estimator,
                        &mut NullSink,
                        EpisodeSpec {
                            initial,
                            goal,
                            max_steps,
                        },
                        |_| 0.0,
                        &mut rng,
                    )
                })
                .collect::<Result<_>>()
        })?;

        let mut best: Option<Trajectory> = None;
        for candidate in attempts {
            let better = match &best {
                None => true,
                Some(current) => is_better(&candidate, current),
            };
            if better {
                best = Some(candidate);
            }
        }

        let best = best.ok_or_else(|| StratagemError::Internal("No planning attempt ran".to_string()))?;
        info!(
            "Plan: {:?} in {} steps, chain {:?}",
            best.outcome,
            best.len(),
            best.chain()
        );
        Ok(best)
    }

    fn check_scenario(&self, initial: &State, goal: &Goal) -> Result<()> {
        goal.validate()?;
        if !self.encoder.covers(initial) {
            return Err(StratagemError::validation(
                "Initial state has facts the state encoder does not track",
            ));
        }
        Ok(())
    }
}

fn is_better(candidate: &Trajectory, current: &Trajectory) -> bool {
    if candidate.is_success() != current.is_success() {
        return candidate.is_success();
    }
    if candidate.len() != current.len() {
        return candidate.len() < current.len();
    }
    candidate.total_reward > current.total_reward
}
