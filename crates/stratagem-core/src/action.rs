//! Action definitions: preconditions, probabilistic postconditions, reliability and cost.
//!
//! An [`Action`] is immutable once it enters a [`Catalog`](crate::Catalog). Construction goes
//! through [`ActionBuilder`] or serde, and [`Action::validate`] enforces the numeric bounds.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StratagemError};
use crate::types::{FactValue, Privilege, StateView};

/// Unique identifier of an action within a catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Create an identifier from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ActionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ActionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A predicate over world state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// The named fact has exactly this value. Absent boolean facts read as `false`.
    Fact { name: String, value: FactValue },

    /// Privilege equals the given level.
    PrivilegeIs { level: Privilege },

    /// Privilege is at least the given level.
    PrivilegeAtLeast { level: Privilege },
}

impl Predicate {
    /// Fact predicate shorthand.
    pub fn fact(name: impl Into<String>, value: impl Into<FactValue>) -> Self {
        Predicate::Fact {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Evaluate the predicate against a state.
    pub fn holds<S: StateView + ?Sized>(&self, state: &S) -> bool {
        match self {
            Predicate::Fact { name, value } => match state.fact(name) {
                Some(current) => current == value,
                None => value.is_false(),
            },
            Predicate::PrivilegeIs { level } => state.privilege() == *level,
            Predicate::PrivilegeAtLeast { level } => state.privilege() >= *level,
        }
    }

    /// Name of the fact this predicate reads, if any.
    pub fn fact_name(&self) -> Option<&str> {
        match self {
            Predicate::Fact { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Fact { name, value } => write!(f, "{} == {}", name, value),
            Predicate::PrivilegeIs { level } => write!(f, "privilege == {}", level),
            Predicate::PrivilegeAtLeast { level } => write!(f, "privilege >= {}", level),
        }
    }
}

/// A change to world state made by a successful action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// Set a fact to a value.
    SetFact { name: String, value: FactValue },

    /// Remove a fact.
    ClearFact { name: String },

    /// Replace the privilege level.
    SetPrivilege { level: Privilege },
}

impl Effect {
    /// Name of the fact this effect writes, if any.
    pub fn fact_name(&self) -> Option<&str> {
        match self {
            Effect::SetFact { name, .. } | Effect::ClearFact { name } => Some(name),
            Effect::SetPrivilege { .. } => None,
        }
    }
}

/// An effect together with the probability that it occurs when the action succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Postcondition {
    /// The state change.
    #[serde(flatten)]
    pub effect: Effect,

    /// Probability in [0, 1] that the effect occurs on success.
    #[serde(default = "certain")]
    pub probability: f64,
}

fn certain() -> f64 {
    1.0
}

impl Postcondition {
    /// A postcondition that always occurs on success.
    pub fn certain(effect: Effect) -> Self {
        Self {
            effect,
            probability: 1.0,
        }
    }
}

/// A declarative, parameter-free action record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier.
    pub id: ActionId,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Predicates that must all hold for the action to be eligible.
    #[serde(default)]
    pub preconditions: Vec<Predicate>,

    /// Effects applied when the action succeeds.
    #[serde(default)]
    pub postconditions: Vec<Postcondition>,

    /// Probability in [0, 1] that the action succeeds.
    pub reliability: f64,

    /// Execution-time estimate, used to penalize long chains.
    #[serde(default)]
    pub cost: f64,
}

impl Action {
    /// Create a new ActionBuilder.
    pub fn builder(id: impl Into<ActionId>) -> ActionBuilder {
        ActionBuilder::new(id)
    }

    /// Returns true if every precondition holds in `state`.
    pub fn is_eligible<S: StateView + ?Sized>(&self, state: &S) -> bool {
        self.preconditions.iter().all(|pre| pre.holds(state))
    }

    /// Preconditions that do not hold in `state`.
    pub fn unmet_preconditions<'a, S: StateView + ?Sized>(&'a self, state: &S) -> Vec<&'a Predicate> {
        self.preconditions.iter().filter(|pre| !pre.holds(state)).collect()
    }

    /// Returns true if any postcondition can lower privilege in a state where the
    /// action is eligible.
    pub fn can_downgrade(&self) -> bool {
        let ceiling = self
            .preconditions
            .iter()
            .filter_map(|pre| match pre {
                Predicate::PrivilegeIs { level } => Some(*level),
                _ => None,
            })
            .min()
            .unwrap_or(Privilege::FullControl);

        self.postconditions.iter().any(|post| match post.effect {
            Effect::SetPrivilege { level } => level < ceiling,
            _ => false,
        })
    }

    /// Check numeric bounds and names.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(StratagemError::validation("Action id cannot be empty"));
        }

        if !(0.0..=1.0).contains(&self.reliability) {
            return Err(StratagemError::validation(format!(
                "Action '{}' has reliability {} outside [0, 1]",
                self.id, self.reliability
            )));
        }

        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(StratagemError::validation(format!(
                "Action '{}' has invalid cost {}",
                self.id, self.cost
            )));
        }

        for pre in &self.preconditions {
            if pre.fact_name().is_some_and(|name| name.trim().is_empty()) {
                return Err(StratagemError::validation(format!(
                    "Action '{}' has a precondition with an empty fact name",
                    self.id
                )));
            }
        }

        for post in &self.postconditions {
            if post.effect.fact_name().is_some_and(|name| name.trim().is_empty()) {
                return Err(StratagemError::validation(format!(
                    "Action '{}' has a postcondition with an empty fact name",
                    self.id
                )));
            }
            if !(0.0..=1.0).contains(&post.probability) {
                return Err(StratagemError::validation(format!(
                    "Action '{}' has postcondition probability {} outside [0, 1]",
                    self.id, post.probability
                )));
            }
        }

        Ok(())
    }
}

/// Builder for creating Actions with a fluent API.
#[derive(Debug)]
pub struct ActionBuilder {
    id: ActionId,
    description: String,
    preconditions: Vec<Predicate>,
    postconditions: Vec<Postcondition>,
    reliability: f64,
    cost: f64,
}

impl ActionBuilder {
    /// Create a new ActionBuilder. Reliability defaults to 1.0 and cost to 0.0.
    pub fn new(id: impl Into<ActionId>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            reliability: 1.0,
            cost: 0.0,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a precondition.
    pub fn requires(mut self, predicate: Predicate) -> Self {
        self.preconditions.push(predicate);
        self
    }

    /// Require an exact privilege level.
    pub fn requires_privilege(self, level: Privilege) -> Self {
        self.requires(Predicate::PrivilegeIs { level })
    }

    /// Require a fact value.
    pub fn requires_fact(self, name: impl Into<String>, value: impl Into<FactValue>) -> Self {
        self.requires(Predicate::fact(name, value))
    }

    /// Add a postcondition with the given probability.
    pub fn effect_with_probability(mut self, effect: Effect, probability: f64) -> Self {
        self.postconditions.push(Postcondition { effect, probability });
        self
    }

    /// Add a certain postcondition.
    pub fn effect(self, effect: Effect) -> Self {
        self.effect_with_probability(effect, 1.0)
    }

    /// Grant a privilege level on success.
    pub fn grants_privilege(self, level: Privilege) -> Self {
        self.effect(Effect::SetPrivilege { level })
    }

    /// Set a fact on success.
    pub fn sets_fact(self, name: impl Into<String>, value: impl Into<FactValue>) -> Self {
        self.effect(Effect::SetFact {
            name: name.into(),
            value: value.into(),
        })
    }

    /// Set the reliability.
    pub fn reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability;
        self
    }

    /// Set the cost.
    pub fn cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Build and validate the Action.
    pub fn build(self) -> Result<Action> {
        let action = Action {
            id: self.id,
            description: self.description,
            preconditions: self.preconditions,
            postconditions: self.postconditions,
            reliability: self.reliability,
            cost: self.cost,
        };
        action.validate()?;
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapState {
        facts: HashMap<String, FactValue>,
        privilege: Privilege,
    }

    impl StateView for MapState {
        fn fact(&self, name: &str) -> Option<&FactValue> {
            self.facts.get(name)
        }

        fn privilege(&self) -> Privilege {
            self.privilege
        }
    }

    fn state(privilege: Privilege, facts: &[(&str, FactValue)]) -> MapState {
        MapState {
            facts: facts.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            privilege,
        }
    }

    #[test]
    fn test_action_builder() {
        let action = Action::builder("exploit_ssh")
            .description("Exploit a weak SSH service")
            .requires_fact("running-service:ssh", true)
            .requires_privilege(Privilege::None)
            .grants_privilege(Privilege::Limited)
            .reliability(0.8)
            .cost(3.0)
            .build()
            .unwrap();

        assert_eq!(action.id.as_str(), "exploit_ssh");
        assert_eq!(action.preconditions.len(), 2);
        assert_eq!(action.postconditions.len(), 1);
    }

    #[test]
    fn test_builder_rejects_bad_numbers() {
        assert!(Action::builder("a").reliability(1.5).build().is_err());
        assert!(Action::builder("a").reliability(-0.1).build().is_err());
        assert!(Action::builder("a").cost(-1.0).build().is_err());
        assert!(Action::builder("a").cost(f64::NAN).build().is_err());
        assert!(Action::builder("a")
            .effect_with_probability(Effect::SetPrivilege { level: Privilege::Limited }, 2.0)
            .build()
            .is_err());
        assert!(Action::builder(" ").build().is_err());
        assert!(Action::builder("a").requires_fact("", true).build().is_err());
    }

    #[test]
    fn test_predicate_evaluation() {
        let s = state(
            Privilege::Limited,
            &[("os", FactValue::from("linux")), ("open-port:22", FactValue::Bool(true))],
        );

        assert!(Predicate::fact("os", "linux").holds(&s));
        assert!(!Predicate::fact("os", "windows").holds(&s));
        assert!(Predicate::fact("open-port:22", true).holds(&s));
        assert!(Predicate::fact("open-port:80", false).holds(&s));
        assert!(!Predicate::fact("open-port:80", true).holds(&s));
        assert!(!Predicate::fact("arch", "x86").holds(&s));
        assert!(Predicate::PrivilegeIs { level: Privilege::Limited }.holds(&s));
        assert!(Predicate::PrivilegeAtLeast { level: Privilege::None }.holds(&s));
        assert!(!Predicate::PrivilegeAtLeast { level: Privilege::Elevated }.holds(&s));
    }

    #[test]
    fn test_unmet_preconditions() {
        let action = Action::builder("a")
            .requires_privilege(Privilege::Limited)
            .requires_fact("x", true)
            .build()
            .unwrap();
        let s = state(Privilege::Limited, &[]);
        assert!(!action.is_eligible(&s));
        assert_eq!(action.unmet_preconditions(&s), vec![&Predicate::fact("x", true)]);
    }

    #[test]
    fn test_can_downgrade() {
        let escalate = Action::builder("escalate")
            .requires_privilege(Privilege::None)
            .grants_privilege(Privilege::Limited)
            .build()
            .unwrap();
        assert!(!escalate.can_downgrade());

        let drop = Action::builder("drop")
            .requires(Predicate::PrivilegeAtLeast { level: Privilege::Elevated })
            .grants_privilege(Privilege::Limited)
            .build()
            .unwrap();
        assert!(drop.can_downgrade());

        let unguarded = Action::builder("reset")
            .grants_privilege(Privilege::Limited)
            .build()
            .unwrap();
        assert!(unguarded.can_downgrade());
    }

    #[test]
    fn test_action_json_shape() {
        let json = r#"{
            "id": "escalate_a",
            "preconditions": [{"kind": "privilege_is", "level": "none"}],
            "postconditions": [{"kind": "set_privilege", "level": "limited", "probability": 0.9}],
            "reliability": 1.0,
            "cost": 2.5
        }"#;
        let action: Action = serde_json::from_str(json).unwrap();
        assert_eq!(action.postconditions[0].probability, 0.9);
        assert_eq!(
            action.postconditions[0].effect,
            Effect::SetPrivilege { level: Privilege::Limited }
        );
        action.validate().unwrap();
    }
}
