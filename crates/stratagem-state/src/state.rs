//! Canonical world state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stratagem_core::{Action, Effect, FactValue, Postcondition, Privilege, StateView};

/// A world state: named facts, a privilege level, and step/cost bookkeeping.
///
/// The canonical form never stores `false` booleans; an absent boolean fact is false.
/// Bookkeeping fields are not part of the situation the planner reasons about, see
/// [`State::same_situation`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    facts: BTreeMap<String, FactValue>,
    privilege: Privilege,
    #[serde(default)]
    steps: u32,
    #[serde(default)]
    accumulated_cost: f64,
}

impl State {
    /// A state with the given privilege and no facts.
    pub fn new(privilege: Privilege) -> Self {
        Self {
            privilege,
            ..Self::default()
        }
    }

    /// Builder-style fact setter.
    pub fn with_fact(mut self, name: impl Into<String>, value: impl Into<FactValue>) -> Self {
        self.set_fact(name, value);
        self
    }

    /// Set a fact, keeping the canonical form.
    pub fn set_fact(&mut self, name: impl Into<String>, value: impl Into<FactValue>) {
        let name = name.into();
        let value = value.into();
        if value.is_false() {
            self.facts.remove(&name);
        } else {
            self.facts.insert(name, value);
        }
    }

    /// Remove a fact.
    pub fn clear_fact(&mut self, name: &str) {
        self.facts.remove(name);
    }

    /// Set the privilege level.
    pub fn set_privilege(&mut self, privilege: Privilege) {
        self.privilege = privilege;
    }

    /// All set facts, ordered by name.
    pub fn facts(&self) -> impl Iterator<Item = (&str, &FactValue)> {
        self.facts.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of set facts.
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Actions applied so far, successful or not.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Sum of the costs of actions applied so far.
    pub fn accumulated_cost(&self) -> f64 {
        self.accumulated_cost
    }

    /// Compare facts and privilege, ignoring bookkeeping.
    pub fn same_situation(&self, other: &State) -> bool {
        self.privilege == other.privilege && self.facts == other.facts
    }

    /// Apply every declared postcondition of `action` if `succeeded`.
    ///
    /// On failure only the bookkeeping advances.
    pub fn apply_postconditions(&self, action: &Action, succeeded: bool) -> State {
        self.apply_postconditions_with(action, succeeded, |_| true)
    }

    /// Like [`State::apply_postconditions`], but `realize` decides for each
    /// postcondition whether it occurred.
    pub fn apply_postconditions_with<F>(&self, action: &Action, succeeded: bool, mut realize: F) -> State
    where
        F: FnMut(&Postcondition) -> bool,
    {
        let mut next = self.clone();
        next.steps += 1;
        next.accumulated_cost += action.cost;

        if succeeded {
            for post in &action.postconditions {
                if realize(post) {
                    next.apply_effect(&post.effect);
                }
            }
        }

        next
    }

    fn apply_effect(&mut self, effect: &Effect) {
        match effect {
            Effect::SetFact { name, value } => self.set_fact(name.clone(), value.clone()),
            Effect::ClearFact { name } => self.clear_fact(name),
            Effect::SetPrivilege { level } => self.privilege = *level,
        }
    }
}

impl StateView for State {
    fn fact(&self, name: &str) -> Option<&FactValue> {
        self.facts.get(name)
    }

    fn privilege(&self) -> Privilege {
        self.privilege
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratagem_core::Predicate;

    fn pivot() -> Action {
        Action::builder("pivot")
            .requires_privilege(Privilege::Limited)
            .grants_privilege(Privilege::Elevated)
            .sets_fact("session", "ssh")
            .effect(Effect::ClearFact {
                name: "noisy".to_string(),
            })
            .cost(4.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_canonical_false_facts() {
        let state = State::new(Privilege::None)
            .with_fact("open-port:22", true)
            .with_fact("open-port:80", false);
        assert_eq!(state.fact_count(), 1);
        assert!(Predicate::fact("open-port:80", false).holds(&state));
    }

    #[test]
    fn test_apply_postconditions_success() {
        let state = State::new(Privilege::Limited).with_fact("noisy", true);
        let next = state.apply_postconditions(&pivot(), true);

        assert_eq!(next.privilege(), Privilege::Elevated);
        assert_eq!(next.fact("session"), Some(&FactValue::from("ssh")));
        assert_eq!(next.fact("noisy"), None);
        assert_eq!(next.steps(), 1);
        assert_eq!(next.accumulated_cost(), 4.0);

        // The input is untouched.
        assert_eq!(state.privilege(), Privilege::Limited);
        assert_eq!(state.steps(), 0);
    }

    #[test]
    fn test_apply_postconditions_failure_only_bookkeeping() {
        let state = State::new(Privilege::Limited).with_fact("noisy", true);
        let next = state.apply_postconditions(&pivot(), false);

        assert!(next.same_situation(&state));
        assert_eq!(next.steps(), 1);
        assert_eq!(next.accumulated_cost(), 4.0);
    }

    #[test]
    fn test_apply_postconditions_with_partial_realization() {
        let state = State::new(Privilege::Limited);
        let next = state.apply_postconditions_with(&pivot(), true, |post| {
            !matches!(post.effect, Effect::SetPrivilege { .. })
        });

        assert_eq!(next.privilege(), Privilege::Limited);
        assert_eq!(next.fact("session"), Some(&FactValue::from("ssh")));
    }
}
