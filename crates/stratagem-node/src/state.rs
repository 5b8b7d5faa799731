//! Application state.

use std::sync::Arc;

use stratagem_core::{Catalog, Result};
use stratagem_planner::{Evaluator, InMemoryEstimatorStore, InMemoryTrajectoryArchive, PlannerConfig, QLearner, Trainer};
use stratagem_state::State;
use tokio::sync::RwLock;

use crate::scenario::Scenario;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The loaded action catalog.
    pub catalog: Arc<Catalog>,

    /// Trainer configured for this catalog.
    pub trainer: Arc<Trainer>,

    /// Chain evaluator.
    pub evaluator: Arc<Evaluator>,

    /// The learner. Training takes the write lock; planning reads.
    pub learner: Arc<RwLock<QLearner>>,

    /// Estimator snapshots saved after each training run.
    pub estimators: Arc<InMemoryEstimatorStore>,

    /// Successful training trajectories.
    pub archive: Arc<InMemoryTrajectoryArchive>,

    /// Scenario used when a request does not name one.
    pub default_scenario: Option<Arc<Scenario>>,
}

impl AppState {
    /// Build the state for `catalog`. The encoder also tracks every fact in the default scenario.
    pub fn new(catalog: Catalog, config: PlannerConfig, default_scenario: Option<Scenario>) -> Result<Self> {
        let catalog = Arc::new(catalog);
        let seeds: Vec<State> = default_scenario.iter().map(|s| s.initial.clone()).collect();
        let archive = Arc::new(InMemoryTrajectoryArchive::default());

        let trainer = Trainer::from_catalog(catalog.clone(), config.clone(), &seeds)?.with_archive(archive.clone());
        let learner = trainer.learner();

        Ok(Self {
            evaluator: Arc::new(Evaluator::new(catalog.clone(), config.seed).with_parallelism(config.parallelism)),
            catalog,
            trainer: Arc::new(trainer),
            learner: Arc::new(RwLock::new(learner)),
            estimators: Arc::new(InMemoryEstimatorStore::new()),
            archive,
            default_scenario: default_scenario.map(Arc::new),
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &PlannerConfig {
        self.trainer.config()
    }
}
