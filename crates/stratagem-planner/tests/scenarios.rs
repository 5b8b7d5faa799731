// tests/scenarios.rs
//
// End-to-end scenarios over a JSON-loaded catalog:
// - fixed-chain evaluation of the two-step escalation
// - determinism of the simulator and of action selection
// - a saved estimator planning from a state it was not trained from
// - privilege never drops when no action can downgrade it

use std::sync::Arc;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use stratagem_core::{ActionId, Catalog, Goal, Predicate, Privilege, StateView};
use stratagem_planner::{
    EpisodeDriver, EpisodeOutcome, EpisodeSpec, Environment, Evaluator, ExplorationSchedule, NullSink, PlannerConfig,
    EstimatorSnapshot, RewardFunction, Simulator, Trainer, ValueEstimator,
};
use stratagem_state::{State, StateEncoder};

const ESCALATION: &str = r#"{
    "actions": [
        {
            "id": "escalate_a",
            "description": "Gain a foothold",
            "preconditions": [{"kind": "privilege_is", "level": "none"}],
            "postconditions": [{"kind": "set_privilege", "level": "limited"}],
            "reliability": 1.0,
            "cost": 1.0
        },
        {
            "id": "escalate_b",
            "description": "Escalate to full control",
            "preconditions": [{"kind": "privilege_is", "level": "limited"}],
            "postconditions": [{"kind": "set_privilege", "level": "full-control"}],
            "reliability": RELIABILITY,
            "cost": 2.0
        }
    ]
}"#;

const RECON: &str = r#"{
    "actions": [
        {
            "id": "scan",
            "postconditions": [{"kind": "set_fact", "name": "host_known", "value": true, "probability": 0.7}],
            "reliability": 0.9,
            "cost": 0.5
        },
        {
            "id": "exploit",
            "preconditions": [
                {"kind": "fact", "name": "host_known", "value": true},
                {"kind": "privilege_is", "level": "none"}
            ],
            "postconditions": [{"kind": "set_privilege", "level": "limited"}],
            "reliability": 0.6,
            "cost": 2.0
        },
        {
            "id": "harvest",
            "preconditions": [{"kind": "privilege_at_least", "level": "limited"}],
            "postconditions": [
                {"kind": "set_fact", "name": "creds", "value": "domain"},
                {"kind": "set_privilege", "level": "elevated", "probability": 0.5}
            ],
            "reliability": 0.8,
            "cost": 1.0
        }
    ]
}"#;

const PIVOT: &str = r#"{
    "actions": [
        {"id": "wait", "reliability": 1.0, "cost": 0.1},
        {
            "id": "switch",
            "preconditions": [{"kind": "privilege_is", "level": "none"}],
            "postconditions": [
                {"kind": "set_privilege", "level": "limited"},
                {"kind": "set_fact", "name": "os", "value": "linux"}
            ],
            "reliability": 1.0
        },
        {
            "id": "win",
            "preconditions": [
                {"kind": "fact", "name": "os", "value": "linux"},
                {"kind": "privilege_is", "level": "limited"}
            ],
            "postconditions": [{"kind": "set_privilege", "level": "full-control"}],
            "reliability": 1.0
        }
    ]
}"#;

const LATERAL: &str = r#"{
    "actions": [
        {
            "id": "scan",
            "postconditions": [{"kind": "set_fact", "name": "host_known", "value": true, "probability": 0.7}],
            "reliability": 0.9
        },
        {
            "id": "exploit",
            "preconditions": [
                {"kind": "fact", "name": "host_known", "value": true},
                {"kind": "privilege_is", "level": "none"}
            ],
            "postconditions": [{"kind": "set_privilege", "level": "limited"}],
            "reliability": 0.6
        },
        {
            "id": "harvest",
            "preconditions": [{"kind": "privilege_at_least", "level": "limited"}],
            "postconditions": [{"kind": "set_fact", "name": "creds", "value": "domain", "probability": 0.5}],
            "reliability": 1.0
        },
        {
            "id": "cover_tracks",
            "preconditions": [{"kind": "privilege_at_least", "level": "limited"}],
            "postconditions": [{"kind": "clear_fact", "name": "host_known"}],
            "reliability": 1.0
        },
        {
            "id": "pivot",
            "preconditions": [
                {"kind": "fact", "name": "creds", "value": "domain"},
                {"kind": "privilege_is", "level": "limited"}
            ],
            "postconditions": [{"kind": "set_privilege", "level": "elevated"}],
            "reliability": 0.7
        },
        {
            "id": "takeover",
            "preconditions": [
                {"kind": "fact", "name": "creds", "value": "domain"},
                {"kind": "privilege_at_least", "level": "elevated"}
            ],
            "postconditions": [{"kind": "set_privilege", "level": "full-control", "probability": 0.5}],
            "reliability": 1.0
        }
    ]
}"#;

fn escalation(reliability_b: f64) -> Arc<Catalog> {
    let json = ESCALATION.replace("RELIABILITY", &reliability_b.to_string());
    Arc::new(Catalog::from_json_str(&json).unwrap())
}

fn recon() -> Arc<Catalog> {
    Arc::new(Catalog::from_json_str(RECON).unwrap())
}

fn chain(ids: &[&str]) -> Vec<ActionId> {
    ids.iter().map(|id| ActionId::new(*id)).collect()
}

// =============================================================================
// Evaluation
// =============================================================================

#[test]
fn test_reliable_escalation_chain() {
    let evaluator = Evaluator::new(escalation(1.0), 42);
    let report = evaluator
        .evaluate(
            &chain(&["escalate_a", "escalate_b"]),
            &State::new(Privilege::None),
            &Goal::privilege(Privilege::FullControl),
            10,
        )
        .unwrap();

    assert_eq!(report.success_rate, 1.0);
    assert_eq!(report.path_length, 2);
    assert_eq!(report.successes, 10);
}

#[test]
fn test_coin_flip_escalation_chain() {
    let evaluator = Evaluator::new(escalation(0.5), 42);
    let report = evaluator
        .evaluate(
            &chain(&["escalate_a", "escalate_b"]),
            &State::new(Privilege::None),
            &Goal::privilege(Privilege::FullControl),
            1000,
        )
        .unwrap();

    // Five standard deviations of a fair binomial over 1000 runs is about 0.079.
    assert!(
        (report.success_rate - 0.5).abs() < 0.08,
        "success rate {} too far from 0.5",
        report.success_rate
    );
    assert_eq!(report.success_rate, report.successes as f64 / 1000.0);
    assert_eq!(report.action_failures, 1000 - report.successes);
}

#[test]
fn test_evaluation_reproducible() {
    let goal = Goal::privilege(Privilege::FullControl);
    let initial = State::new(Privilege::None);
    let run = || {
        Evaluator::new(escalation(0.5), 3)
            .evaluate(&chain(&["escalate_a", "escalate_b"]), &initial, &goal, 200)
            .unwrap()
    };
    assert_eq!(run(), run());
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_step_reproducible() {
    let catalog = recon();
    let scan = catalog.get("scan").unwrap().clone();
    let initial = State::new(Privilege::None);

    let outcomes = |seed: u64| {
        let mut sim = Simulator::new(catalog.clone(), seed);
        (0..200)
            .map(|_| sim.step(&initial, &scan).unwrap())
            .collect::<Vec<_>>()
    };

    let first = outcomes(17);
    assert_eq!(first, outcomes(17));
    assert!(first.iter().any(|t| !t.succeeded));
    assert!(first.iter().any(|t| t.state.fact("host_known").is_some()));
}

#[test]
fn test_select_action_reproducible() {
    let catalog = recon();
    let encoder = StateEncoder::from_catalog(&catalog, &[]);
    let state = State::new(Privilege::Limited).with_fact("host_known", true);
    let key = encoder.state_key(&state);
    let eligible = catalog.eligible_actions(&state);
    let estimator = ValueEstimator::default();

    let picks = |seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..100)
            .map(|_| {
                estimator
                    .select_action(&key, &eligible, 0.5, &mut rng)
                    .map(|a| a.id.clone())
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(picks(8), picks(8));
}

#[test]
fn test_dead_end_is_not_success() {
    let trainer = Trainer::from_catalog(escalation(1.0), PlannerConfig::default(), &[]).unwrap();
    let plan = trainer
        .plan(
            &ValueEstimator::default(),
            &State::new(Privilege::Elevated),
            &Goal::privilege(Privilege::FullControl),
            10,
        )
        .unwrap();

    assert_eq!(plan.outcome, EpisodeOutcome::DeadEnd);
    assert!(plan.is_empty());
}

// =============================================================================
// Training
// =============================================================================

#[test]
fn test_saved_estimator_plans_from_unseen_start() {
    let catalog = Arc::new(Catalog::from_json_str(PIVOT).unwrap());
    let config = PlannerConfig {
        episodes: 300,
        batch_size: 10,
        parallelism: 2,
        max_steps: 10,
        seed: 21,
        ..PlannerConfig::default()
    };
    let goal = Goal::privilege(Privilege::FullControl);
    let trained_from = State::new(Privilege::None).with_fact("os", "arm64");

    let trainer = Trainer::from_catalog(catalog.clone(), config.clone(), std::slice::from_ref(&trained_from)).unwrap();
    let mut learner = trainer.learner();
    trainer.train(&mut learner, &trained_from, &goal).unwrap();

    let saved = serde_json::to_string(&learner.estimator().snapshot(&catalog, trainer.encoder())).unwrap();
    let snapshot: EstimatorSnapshot = serde_json::from_str(&saved).unwrap();
    let (estimator, encoder) = ValueEstimator::restore(&snapshot, &catalog).unwrap();
    assert_eq!(&encoder, trainer.encoder().as_ref());

    // A schema rebuilt from the new start would drop `os = arm64` and shift every key.
    let start = State::new(Privilege::Limited).with_fact("os", "linux");
    let rebuilt = StateEncoder::from_catalog(&catalog, std::slice::from_ref(&start));
    assert_ne!(rebuilt.state_key(&start), encoder.state_key(&start));

    let planner = Trainer::new(catalog.clone(), Arc::new(encoder), config).unwrap();
    let plan = planner.plan(&estimator, &start, &goal, 10).unwrap();
    assert_eq!(plan.outcome, EpisodeOutcome::GoalReached);
    assert_eq!(plan.chain(), chain(&["win"]));

    let err = planner
        .plan(&estimator, &State::new(Privilege::None).with_fact("os", "bsd"), &goal, 10)
        .unwrap_err();
    assert!(matches!(err, stratagem_core::StratagemError::Validation { .. }));
}

#[test]
fn test_train_then_plan_recon() {
    let catalog = recon();
    let config = PlannerConfig {
        episodes: 400,
        batch_size: 10,
        parallelism: 3,
        max_steps: 30,
        seed: 5,
        exploration: ExplorationSchedule {
            decay: 0.98,
            ..ExplorationSchedule::default()
        },
        ..PlannerConfig::default()
    };
    let trainer = Trainer::from_catalog(catalog.clone(), config, &[]).unwrap();
    let mut learner = trainer.learner();
    let initial = State::new(Privilege::None);
    let goal = Goal::all(vec![Predicate::PrivilegeAtLeast {
        level: Privilege::Elevated,
    }]);

    let report = trainer.train(&mut learner, &initial, &goal).unwrap();
    assert!(report.successes > 0);

    let plan = trainer.plan(learner.estimator(), &initial, &goal, 30).unwrap();
    assert!(plan.is_success());

    let found = plan.chain();
    assert!(found.contains(&ActionId::new("exploit")));
    assert_eq!(found.last(), Some(&ActionId::new("harvest")));

    let report = Evaluator::new(catalog, 9).evaluate(&found, &initial, &goal, 500).unwrap();
    assert!(report.success_rate > 0.0);
}

// =============================================================================
// Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_privilege_never_drops_without_downgrades(
        seed in any::<u64>(),
        rate in 0.0f64..=1.0,
        start in 0u8..=2,
        knows_host in any::<bool>(),
    ) {
        let catalog = Arc::new(Catalog::from_json_str(LATERAL).unwrap());
        prop_assert!(!catalog.has_downgrade());

        let encoder = Arc::new(StateEncoder::from_catalog(&catalog, &[]));
        let driver = EpisodeDriver::new(catalog.clone(), encoder, RewardFunction::default());
        let privilege = Privilege::from_rank(start).unwrap();
        let initial = State::new(privilege).with_fact("host_known", knows_host);
        let goal = Goal::privilege(Privilege::FullControl);

        let mut env = Simulator::new(catalog.clone(), seed);
        let mut rng = StdRng::seed_from_u64(seed);
        let trajectory = driver
            .run_episode(
                &mut env,
                &ValueEstimator::default(),
                &mut NullSink,
                EpisodeSpec { initial: &initial, goal: &goal, max_steps: 25 },
                |_| rate,
                &mut rng,
            )
            .unwrap();

        let mut previous = initial.privilege();
        for step in &trajectory.steps {
            prop_assert!(catalog.get(step.action.as_str()).unwrap().is_eligible(&step.state));
            let current = step.next_state.privilege();
            prop_assert!(current >= previous);
            previous = current;
        }
    }
}
