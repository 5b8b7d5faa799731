//! Planner configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stratagem_core::{Result, StratagemError};

use crate::policy::{ExplorationSchedule, LearningConfig};
use crate::reward::RewardWeights;

/// Configuration for training, planning and evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Number of training episodes.
    pub episodes: usize,

    /// Episodes rolled out against one frozen estimator before each update.
    pub batch_size: usize,

    /// Worker threads used to roll out a batch.
    pub parallelism: usize,

    /// Maximum number of actions per episode.
    pub max_steps: usize,

    /// Base random seed; every episode and replay derives its own stream from it.
    pub seed: u64,

    /// Replays per chain evaluation.
    pub eval_runs: usize,

    /// Greedy rollouts tried by `plan`, keeping the best.
    pub plan_attempts: usize,

    /// Exploration schedule.
    pub exploration: ExplorationSchedule,

    /// Q-learning hyperparameters.
    pub learning: LearningConfig,

    /// Reward weights.
    pub reward: RewardWeights,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            episodes: 500,
            batch_size: 16,
            parallelism: 4,
            max_steps: 50,
            seed: 42,
            eval_runs: 1000,
            plan_attempts: 5,
            exploration: ExplorationSchedule::default(),
            learning: LearningConfig::default(),
            reward: RewardWeights::default(),
        }
    }
}

impl PlannerConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlannerConfig = serde_json::from_str(json)
            .map_err(|e| StratagemError::validation(format!("Invalid planner configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            StratagemError::validation(format!("Cannot read configuration {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Check that every budget is usable.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(StratagemError::validation("batch_size must be at least 1"));
        }
        if self.parallelism == 0 {
            return Err(StratagemError::validation("parallelism must be at least 1"));
        }
        if self.max_steps == 0 {
            return Err(StratagemError::validation("max_steps must be at least 1"));
        }
        if self.plan_attempts == 0 {
            return Err(StratagemError::validation("plan_attempts must be at least 1"));
        }
        self.exploration.validate()?;
        self.learning.validate()?;
        Ok(())
    }

    /// Worker pool with `parallelism` threads.
    pub(crate) fn worker_pool(&self) -> Result<rayon::ThreadPool> {
        worker_pool(self.parallelism)
    }
}

pub(crate) fn worker_pool(threads: usize) -> Result<rayon::ThreadPool> {
    if threads == 0 {
        return Err(StratagemError::validation("parallelism must be at least 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| StratagemError::Internal(format!("Failed to start worker pool: {}", e)))
}
