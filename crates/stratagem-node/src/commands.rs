//! One-shot commands: train, plan and evaluate from files.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use stratagem_core::{ActionId, Catalog};
use stratagem_planner::{
    EpisodeOutcome, EstimatorSnapshot, Evaluator, PlannerConfig, Trainer, TrainingReport, Trajectory, ValueEstimator,
};
use tracing::info;

use crate::scenario::{load_catalog, read_json, Scenario};
use crate::CommonArgs;

/// Command-line overrides applied on top of the configuration file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub episodes: Option<usize>,
    pub parallelism: Option<usize>,
    pub max_steps: Option<usize>,
}

/// Load the configuration named by `--config`, applying `--seed`.
pub fn load_config(common: &CommonArgs) -> anyhow::Result<PlannerConfig> {
    let mut config = match &common.config {
        Some(path) => PlannerConfig::from_file(path)?,
        None => PlannerConfig::default(),
    };
    if let Some(seed) = common.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn apply(mut config: PlannerConfig, overrides: Overrides) -> anyhow::Result<PlannerConfig> {
    if let Some(episodes) = overrides.episodes {
        config.episodes = episodes;
    }
    if let Some(parallelism) = overrides.parallelism {
        config.parallelism = parallelism;
    }
    if let Some(max_steps) = overrides.max_steps {
        config.max_steps = max_steps;
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct PlanOutput {
    outcome: EpisodeOutcome,
    chain: Vec<ActionId>,
    steps: usize,
    total_reward: f64,
    total_cost: f64,
}

impl From<&Trajectory> for PlanOutput {
    fn from(trajectory: &Trajectory) -> Self {
        Self {
            outcome: trajectory.outcome,
            chain: trajectory.chain(),
            steps: trajectory.len(),
            total_reward: trajectory.total_reward,
            total_cost: trajectory.total_cost(),
        }
    }
}

#[derive(Serialize)]
struct TrainOutput {
    report: TrainingReport,
    plan: PlanOutput,
}

/// Train on a scenario, print the report and best plan, optionally save the estimator.
pub fn train(common: &CommonArgs, scenario: &Path, overrides: Overrides, output: Option<&Path>) -> anyhow::Result<()> {
    let catalog = Arc::new(load_catalog(&common.catalog)?);
    let config = apply(load_config(common)?, overrides)?;
    let scenario = Scenario::from_file(scenario)?;

    let trainer = Trainer::from_catalog(catalog.clone(), config, std::slice::from_ref(&scenario.initial))?;
    let mut learner = trainer.learner();
    let report = trainer.train(&mut learner, &scenario.initial, &scenario.goal)?;
    let plan = trainer.plan(
        learner.estimator(),
        &scenario.initial,
        &scenario.goal,
        trainer.config().max_steps,
    )?;

    if let Some(path) = output {
        let snapshot = learner.estimator().snapshot(&catalog, trainer.encoder());
        std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)
            .with_context(|| format!("Failed to write estimator to {}", path.display()))?;
        info!("Estimator written to {}", path.display());
    }

    print_json(&TrainOutput {
        report,
        plan: PlanOutput::from(&plan),
    })
}

/// Plan with a saved estimator.
pub fn plan(common: &CommonArgs, scenario: &Path, estimator: &Path, max_steps: Option<usize>) -> anyhow::Result<()> {
    let catalog = Arc::new(load_catalog(&common.catalog)?);
    let config = load_config(common)?;
    let scenario = Scenario::from_file(scenario)?;

    let snapshot: EstimatorSnapshot = serde_json::from_value(read_json(estimator)?)
        .with_context(|| format!("Invalid estimator file {}", estimator.display()))?;

    let max_steps = max_steps.unwrap_or(config.max_steps);
    let (trainer, estimator) = restore_planner(catalog, config, &snapshot)?;
    let trajectory = trainer.plan(&estimator, &scenario.initial, &scenario.goal, max_steps)?;

    print_json(&PlanOutput::from(&trajectory))
}

/// Planner bound to the state schema the snapshot was trained under.
fn restore_planner(
    catalog: Arc<Catalog>,
    config: PlannerConfig,
    snapshot: &EstimatorSnapshot,
) -> anyhow::Result<(Trainer, ValueEstimator)> {
    let (estimator, encoder) = ValueEstimator::restore(snapshot, &catalog)?;
    let trainer = Trainer::new(catalog, Arc::new(encoder), config)?;
    Ok((trainer, estimator))
}

/// Replay a fixed chain and print its statistics.
pub fn evaluate(common: &CommonArgs, scenario: &Path, chain: &[String], runs: Option<usize>) -> anyhow::Result<()> {
    let catalog = Arc::new(load_catalog(&common.catalog)?);
    let config = load_config(common)?;
    let scenario = Scenario::from_file(scenario)?;

    let chain: Vec<ActionId> = chain.iter().map(|id| ActionId::new(id.trim())).collect();
    let runs = runs.unwrap_or(config.eval_runs);

    let report = Evaluator::new(catalog, config.seed)
        .with_parallelism(config.parallelism)
        .evaluate(&chain, &scenario.initial, &scenario.goal, runs)?;
    print_json(&report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_validated() {
        let config = apply(
            PlannerConfig::default(),
            Overrides {
                episodes: Some(10),
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.episodes, 10);

        let zero_threads = apply(
            PlannerConfig::default(),
            Overrides {
                parallelism: Some(0),
                ..Overrides::default()
            },
        );
        assert!(zero_threads.is_err());
    }

    #[test]
    fn test_restored_planner_keeps_trained_schema() {
        use stratagem_core::{Action, Goal, Privilege};
        use stratagem_state::State;

        let catalog = Arc::new(
            Catalog::from_actions(vec![
                Action::builder("wait").cost(0.1).build().unwrap(),
                Action::builder("switch")
                    .requires_privilege(Privilege::None)
                    .grants_privilege(Privilege::Limited)
                    .sets_fact("os", "linux")
                    .build()
                    .unwrap(),
                Action::builder("win")
                    .requires_fact("os", "linux")
                    .requires_privilege(Privilege::Limited)
                    .grants_privilege(Privilege::FullControl)
                    .build()
                    .unwrap(),
            ])
            .unwrap(),
        );
        let config = PlannerConfig {
            episodes: 300,
            batch_size: 10,
            parallelism: 2,
            max_steps: 10,
            ..PlannerConfig::default()
        };
        let goal = Goal::privilege(Privilege::FullControl);
        let trained_from = State::new(Privilege::None).with_fact("os", "arm64");

        let trainer = Trainer::from_catalog(catalog.clone(), config.clone(), std::slice::from_ref(&trained_from)).unwrap();
        let mut learner = trainer.learner();
        trainer.train(&mut learner, &trained_from, &goal).unwrap();
        let snapshot = learner.estimator().snapshot(&catalog, trainer.encoder());

        let (planner, estimator) = restore_planner(catalog, config, &snapshot).unwrap();
        let start = State::new(Privilege::Limited).with_fact("os", "linux");
        let plan = planner.plan(&estimator, &start, &goal, 10).unwrap();

        assert_eq!(plan.outcome, EpisodeOutcome::GoalReached);
        assert_eq!(plan.chain(), vec![ActionId::new("win")]);
    }

    #[test]
    fn test_seed_override() {
        let common = CommonArgs {
            catalog: "catalog.json".into(),
            config: None,
            seed: Some(99),
        };
        assert_eq!(load_config(&common).unwrap().seed, 99);
    }
}
