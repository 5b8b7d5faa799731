//! The action catalog: a validated, read-only arena of actions indexed by id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::action::{Action, ActionId};
use crate::error::{Result, StratagemError};
use crate::types::StateView;

/// Declarative listing of action records, as delivered by a catalog collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSource {
    /// Action records in insertion order.
    pub actions: Vec<Action>,
}

/// Immutable repository of action definitions.
#[derive(Debug, Clone)]
pub struct Catalog {
    actions: Vec<Action>,
    index: HashMap<ActionId, usize>,
}

impl Catalog {
    /// Validate every record and build the catalog.
    pub fn load(source: CatalogSource) -> Result<Self> {
        let mut index = HashMap::with_capacity(source.actions.len());

        for (position, action) in source.actions.iter().enumerate() {
            action.validate()?;
            if index.insert(action.id.clone(), position).is_some() {
                return Err(StratagemError::validation(format!(
                    "Duplicate action id '{}'",
                    action.id
                )));
            }
            debug!("Registered action {} at position {}", action.id, position);
        }

        let catalog = Self {
            actions: source.actions,
            index,
        };

        info!(
            "Loaded catalog with {} actions (fingerprint {})",
            catalog.len(),
            &catalog.fingerprint()[..12]
        );

        Ok(catalog)
    }

    /// Parse a JSON catalog source and load it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let source: CatalogSource = serde_json::from_str(json)
            .map_err(|e| StratagemError::validation(format!("Invalid catalog source: {}", e)))?;
        Self::load(source)
    }

    /// Build a catalog from already-constructed actions.
    pub fn from_actions(actions: Vec<Action>) -> Result<Self> {
        Self::load(CatalogSource { actions })
    }

    /// All actions whose preconditions hold in `state`, in insertion order.
    pub fn eligible_actions<S: StateView + ?Sized>(&self, state: &S) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|action| action.is_eligible(state))
            .collect()
    }

    /// Returns true if `action` belongs to this catalog and is eligible in `state`.
    pub fn is_eligible<S: StateView + ?Sized>(&self, action: &Action, state: &S) -> bool {
        self.get(action.id.as_str()).is_some_and(|own| own.is_eligible(state))
    }

    /// Look up an action by id.
    pub fn get(&self, id: &str) -> Option<&Action> {
        self.index.get(id).map(|&position| &self.actions[position])
    }

    /// Look up an action by id, failing with `NotFound`.
    pub fn require(&self, id: &str) -> Result<&Action> {
        self.get(id).ok_or_else(|| StratagemError::NotFound {
            resource_type: "action".to_string(),
            id: id.to_string(),
        })
    }

    /// Insertion position of an action.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Iterate actions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if the catalog has no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns true if any action can lower privilege.
    pub fn has_downgrade(&self) -> bool {
        self.actions.iter().any(Action::can_downgrade)
    }

    /// SHA-256 over the canonical JSON of the records, hex-encoded.
    pub fn fingerprint(&self) -> String {
        let content = serde_json::to_string(&self.actions).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex_encode(hasher.finalize())
    }

    /// Re-serialize into a source listing.
    pub fn to_source(&self) -> CatalogSource {
        CatalogSource {
            actions: self.actions.clone(),
        }
    }
}

fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
}
