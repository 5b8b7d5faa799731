//! Fixed-length numeric encoding of states.
//!
//! Each tracked fact owns a one-hot block with one "unset" slot followed by one slot per
//! known value. Four privilege slots close the vector. The schema is derived from the
//! catalog, so every fact an action can read or write has a block.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use stratagem_core::{Catalog, Effect, FactValue, Predicate, Privilege, Result, StratagemError, StateView};
use tracing::debug;

use crate::state::State;

/// Number of privilege slots at the end of every vector.
pub const PRIVILEGE_SLOTS: usize = Privilege::ALL.len();

/// A fact that has a block in the encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedFact {
    /// Fact name.
    pub name: String,

    /// Known values, excluding `false` (which is the unset slot).
    pub values: Vec<FactValue>,
}

impl TrackedFact {
    fn width(&self) -> usize {
        1 + self.values.len()
    }

    fn slot_of(&self, value: Option<&FactValue>) -> Option<usize> {
        match value {
            None => Some(0),
            Some(v) => self.values.iter().position(|known| known == v).map(|i| i + 1),
        }
    }
}

/// Compact identity of a state under an encoder: the hot slot of every block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(Vec<u16>);

impl StateKey {
    /// Hot slot per block, privilege last.
    pub fn slots(&self) -> &[u16] {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u16::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Encodes states as fixed-length one-hot vectors and back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEncoder {
    facts: Vec<TrackedFact>,
}

impl StateEncoder {
    /// Build an encoder from explicitly tracked facts.
    pub fn new(facts: Vec<TrackedFact>) -> Self {
        Self { facts }
    }

    /// Derive the schema from every fact the catalog mentions plus those set in `seeds`.
    pub fn from_catalog(catalog: &Catalog, seeds: &[State]) -> Self {
        let mut schema: BTreeMap<String, BTreeSet<FactValue>> = BTreeMap::new();

        let mut track = |name: &str, value: Option<&FactValue>| {
            let values = schema.entry(name.to_string()).or_default();
            if let Some(value) = value.filter(|v| !v.is_false()) {
                values.insert(value.clone());
            }
        };

        for action in catalog.iter() {
            for pre in &action.preconditions {
                if let Predicate::Fact { name, value } = pre {
                    track(name, Some(value));
                }
            }
            for post in &action.postconditions {
                match &post.effect {
                    Effect::SetFact { name, value } => track(name, Some(value)),
                    Effect::ClearFact { name } => track(name, None),
                    Effect::SetPrivilege { .. } => {}
                }
            }
        }

        for seed in seeds {
            for (name, value) in seed.facts() {
                track(name, Some(value));
            }
        }

        let facts: Vec<TrackedFact> = schema
            .into_iter()
            .map(|(name, values)| TrackedFact {
                name,
                values: values.into_iter().collect(),
            })
            .collect();

        debug!("Derived state encoding with {} tracked facts", facts.len());

        Self { facts }
    }

    /// Tracked facts in block order.
    pub fn tracked_facts(&self) -> &[TrackedFact] {
        &self.facts
    }

    /// Length of every encoded vector.
    pub fn dimension(&self) -> usize {
        self.facts.iter().map(TrackedFact::width).sum::<usize>() + PRIVILEGE_SLOTS
    }

    /// Returns true if every fact of `state` has a slot, so encoding loses nothing.
    pub fn covers(&self, state: &State) -> bool {
        state.facts().all(|(name, value)| {
            self.facts
                .iter()
                .find(|tracked| tracked.name == name)
                .and_then(|tracked| tracked.slot_of(Some(value)))
                .is_some()
        })
    }

    /// Hot slot index within each block. Untracked values fall back to the unset slot.
    fn hot_slots(&self, state: &State) -> Vec<usize> {
        let mut slots: Vec<usize> = self
            .facts
            .iter()
            .map(|tracked| tracked.slot_of(state.fact(&tracked.name)).unwrap_or(0))
            .collect();
        slots.push(state.privilege().rank() as usize);
        slots
    }

    /// Encode a state as a one-hot vector of length [`StateEncoder::dimension`].
    pub fn encode(&self, state: &State) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension()];
        let mut offset = 0;
        let slots = self.hot_slots(state);

        for (tracked, slot) in self.facts.iter().zip(&slots) {
            vector[offset + slot] = 1.0;
            offset += tracked.width();
        }
        vector[offset + state.privilege().rank() as usize] = 1.0;

        vector
    }

    /// Inverse of [`StateEncoder::encode`] for vectors it produced.
    pub fn decode(&self, vector: &[f32]) -> Result<State> {
        if vector.len() != self.dimension() {
            return Err(StratagemError::malformed(format!(
                "Encoded state has length {}, expected {}",
                vector.len(),
                self.dimension()
            )));
        }

        let mut offset = 0;
        let mut state = State::default();

        for tracked in &self.facts {
            let block = &vector[offset..offset + tracked.width()];
            match one_hot_index(block) {
                Some(0) => {}
                Some(slot) => state.set_fact(tracked.name.clone(), tracked.values[slot - 1].clone()),
                None => {
                    return Err(StratagemError::malformed(format!(
                        "Block for fact '{}' is not one-hot",
                        tracked.name
                    )))
                }
            }
            offset += tracked.width();
        }

        let block = &vector[offset..];
        let privilege = one_hot_index(block)
            .and_then(|rank| Privilege::from_rank(rank as u8))
            .ok_or_else(|| StratagemError::malformed("Privilege block is not one-hot"))?;
        state.set_privilege(privilege);

        Ok(state)
    }

    /// Compact key identifying the encoded situation of `state`.
    pub fn state_key(&self, state: &State) -> StateKey {
        StateKey(self.hot_slots(state).into_iter().map(|slot| slot as u16).collect())
    }
}

fn one_hot_index(block: &[f32]) -> Option<usize> {
    let mut hot = None;
    for (i, &x) in block.iter().enumerate() {
        if x == 1.0 {
            if hot.is_some() {
                return None;
            }
            hot = Some(i);
        } else if x != 0.0 {
            return None;
        }
    }
    hot
}
