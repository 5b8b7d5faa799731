//! Common types used across Stratagem.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Privilege level held on the target, ordered `None < Limited < Elevated < FullControl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Privilege {
    /// No foothold.
    #[default]
    None,
    /// Unprivileged user access.
    Limited,
    /// Elevated but not unrestricted access.
    Elevated,
    /// Complete control of the target.
    FullControl,
}

impl Privilege {
    /// All levels in ascending order.
    pub const ALL: [Privilege; 4] = [
        Privilege::None,
        Privilege::Limited,
        Privilege::Elevated,
        Privilege::FullControl,
    ];

    /// Position of this level in the total order (0..=3).
    pub fn rank(self) -> u8 {
        match self {
            Privilege::None => 0,
            Privilege::Limited => 1,
            Privilege::Elevated => 2,
            Privilege::FullControl => 3,
        }
    }

    /// Inverse of [`Privilege::rank`].
    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.get(rank as usize).copied()
    }

    /// Parse the kebab-case name used in snapshots and catalogs.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Privilege::None),
            "limited" => Some(Privilege::Limited),
            "elevated" => Some(Privilege::Elevated),
            "full-control" => Some(Privilege::FullControl),
            _ => None,
        }
    }

    /// The kebab-case name of this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Privilege::None => "none",
            Privilege::Limited => "limited",
            Privilege::Elevated => "elevated",
            Privilege::FullControl => "full-control",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a named fact: either a flag or a categorical label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    /// Boolean fact (e.g. `"open-port:22": true`).
    Bool(bool),
    /// Categorical fact (e.g. `"os": "linux"`).
    Category(String),
}

impl FactValue {
    /// Returns true for `Bool(false)`, which canonical states never store.
    pub fn is_false(&self) -> bool {
        matches!(self, FactValue::Bool(false))
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        FactValue::Bool(value)
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        FactValue::Category(value.to_string())
    }
}

impl From<String> for FactValue {
    fn from(value: String) -> Self {
        FactValue::Category(value)
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Bool(b) => write!(f, "{}", b),
            FactValue::Category(c) => f.write_str(c),
        }
    }
}

/// Read-only view of a world state, as needed to evaluate predicates.
///
/// Implemented by the state model; the catalog and goals only ever see this trait.
pub trait StateView {
    /// Current value of a fact, if it is set.
    fn fact(&self, name: &str) -> Option<&FactValue>;

    /// Current privilege level.
    fn privilege(&self) -> Privilege;
}
