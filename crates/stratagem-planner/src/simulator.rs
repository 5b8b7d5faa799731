//! Transition simulator.
//!
//! The simulator is the only source of randomness in the simulated world. It owns a
//! seeded [`StdRng`], so any episode can be replayed from its seed.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stratagem_core::{Action, Catalog, Result, StratagemError};
use stratagem_state::State;
use tracing::trace;

/// Result of applying an action.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State after the action.
    pub state: State,

    /// Whether the action succeeded.
    pub succeeded: bool,
}

/// Anything that can apply an action to a state: the simulator, or an executor
/// working against a real target.
pub trait Environment {
    /// Apply `action` in `state` and report the resulting state.
    fn step(&mut self, state: &State, action: &Action) -> Result<Transition>;
}

/// Simulated environment driven by action reliabilities and postcondition probabilities.
#[derive(Debug, Clone)]
pub struct Simulator {
    catalog: Arc<Catalog>,
    rng: StdRng,
}

impl Simulator {
    /// Create a simulator over `catalog` with a seeded random source.
    pub fn new(catalog: Arc<Catalog>, seed: u64) -> Self {
        Self {
            catalog,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Restart the random sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// The catalog this simulator checks eligibility against.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl Environment for Simulator {
    fn step(&mut self, state: &State, action: &Action) -> Result<Transition> {
        if self.catalog.get(action.id.as_str()).is_none() {
            return Err(StratagemError::Precondition {
                action_id: action.id.to_string(),
                message: "action is not in the catalog".to_string(),
            });
        }

        if !self.catalog.is_eligible(action, state) {
            let unmet: Vec<String> = action
                .unmet_preconditions(state)
                .iter()
                .map(ToString::to_string)
                .collect();
            return Err(StratagemError::Precondition {
                action_id: action.id.to_string(),
                message: format!("unmet: {}", unmet.join(", ")),
            });
        }

        let roll: f64 = self.rng.gen();
        let succeeded = roll < action.reliability;

        let rng = &mut self.rng;
        let next = state.apply_postconditions_with(action, succeeded, |post| {
            rng.gen::<f64>() < post.probability
        });

        trace!(
            "Simulated {} (roll {:.3} vs reliability {:.3}): {}",
            action.id,
            roll,
            action.reliability,
            if succeeded { "success" } else { "failure" }
        );

        Ok(Transition {
            state: next,
            succeeded,
        })
    }
}

/// Derive an independent, reproducible seed for stream `stream` of a run seeded with `base`.
pub fn derive_seed(base: u64, stream: u64) -> u64 {
    // splitmix64 finalizer
    let mut z = base.wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
