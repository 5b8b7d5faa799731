//! Goal predicates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::Predicate;
use crate::error::{Result, StratagemError};
use crate::types::{Privilege, StateView};

/// A conjunction of predicates that defines success for an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// All of these must hold.
    pub conditions: Vec<Predicate>,
}

impl Goal {
    /// Goal from a list of conditions.
    pub fn all(conditions: Vec<Predicate>) -> Self {
        Self { conditions }
    }

    /// Goal satisfied when privilege equals `level`.
    pub fn privilege(level: Privilege) -> Self {
        Self::all(vec![Predicate::PrivilegeIs { level }])
    }

    /// Returns true if every condition holds in `state`.
    pub fn is_satisfied<S: StateView + ?Sized>(&self, state: &S) -> bool {
        self.conditions.iter().all(|condition| condition.holds(state))
    }

    /// Reject goals with no conditions, which every state would trivially satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.conditions.is_empty() {
            return Err(StratagemError::validation("Goal must have at least one condition"));
        }
        Ok(())
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.conditions.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" && "))
    }
}
