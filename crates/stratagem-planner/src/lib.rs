//! # Stratagem Planner
//!
//! Learns action chains that reach a goal under uncertain action outcomes.
//!
//! The pieces, bottom-up:
//! - [`Simulator`]: applies actions with seeded, probabilistic outcomes.
//! - [`RewardFunction`]: scores each transition against the goal.
//! - [`ValueEstimator`] / [`QLearner`]: epsilon-greedy selection over learned values.
//! - [`EpisodeDriver`]: runs one episode and records its [`Trajectory`].
//! - [`Trainer`]: parallel batched training and greedy planning.
//! - [`Evaluator`]: replays a fixed chain to measure its reliability.

pub mod config;
pub mod episode;
pub mod evaluate;
pub mod policy;
pub mod reward;
pub mod simulator;
pub mod store;
pub mod trainer;

pub use config::PlannerConfig;
pub use episode::{EpisodeDriver, EpisodeOutcome, EpisodeSpec, Trajectory, TrajectoryStep};
pub use evaluate::{ChainReport, Evaluator, RunOutcome};
pub use policy::{
    EstimatorSnapshot, ExplorationMode, ExplorationSchedule, LearningConfig, NullSink, QLearner, TieBreak,
    TransitionRecord, TransitionSink, ValueEstimator,
};
pub use reward::{RewardFunction, RewardWeights};
pub use simulator::{derive_seed, Environment, Simulator, Transition};
pub use store::{EstimatorStore, InMemoryEstimatorStore, InMemoryTrajectoryArchive, TrajectoryArchive};
pub use trainer::{BatchSummary, Trainer, TrainingReport};
