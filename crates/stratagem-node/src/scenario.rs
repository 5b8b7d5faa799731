//! Scenario and catalog files.
//!
//! A scenario pairs a starting snapshot with a goal:
//!
//! ```json
//! {
//!   "initial": { "privilege": "none", "facts": { "host_known": false } },
//!   "goal": { "conditions": [{ "kind": "privilege_is", "level": "full-control" }] }
//! }
//! ```

use std::path::Path;

use serde_json::Value;
use stratagem_core::{Catalog, Goal, Result, StratagemError};
use stratagem_state::{decode_from_source, State};

/// A starting state and the goal to reach from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub initial: State,
    pub goal: Goal,
}

impl Scenario {
    /// Decode a scenario object.
    pub fn from_value(raw: &Value) -> Result<Self> {
        let initial = raw
            .get("initial")
            .ok_or_else(|| StratagemError::validation("Scenario is missing 'initial'"))?;
        let goal = raw
            .get("goal")
            .ok_or_else(|| StratagemError::validation("Scenario is missing 'goal'"))?;

        let scenario = Self {
            initial: decode_from_source(initial)?,
            goal: serde_json::from_value(goal.clone())
                .map_err(|e| StratagemError::validation(format!("Invalid goal: {}", e)))?,
        };
        scenario.goal.validate()?;
        Ok(scenario)
    }

    /// Read a scenario file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_value(&read_json(path.as_ref())?)
    }
}

/// Read and validate a catalog file.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .map_err(|e| StratagemError::validation(format!("Cannot read catalog {}: {}", path.display(), e)))?;
    Catalog::from_json_str(&json)
}

pub(crate) fn read_json(path: &Path) -> Result<Value> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| StratagemError::validation(format!("Cannot read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&json)?)
}
