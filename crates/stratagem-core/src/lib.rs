//! # Stratagem Core
//!
//! Core primitives for the Stratagem planner.
//!
//! This crate provides the fundamental building blocks:
//! - [`Action`] - Declarative action with preconditions, postconditions, reliability and cost
//! - [`Catalog`] - Validated, read-only arena of actions
//! - [`Goal`] - Conjunction of predicates defining success
//! - [`StratagemError`] - Error taxonomy

pub mod action;
pub mod catalog;
pub mod error;
pub mod goal;
pub mod types;

// Re-exports for convenience
pub use action::{Action, ActionBuilder, ActionId, Effect, Postcondition, Predicate};
pub use catalog::{Catalog, CatalogSource};
pub use error::{Result, StratagemError};
pub use goal::Goal;
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::action::{Action, ActionBuilder, ActionId, Effect, Postcondition, Predicate};
    pub use crate::catalog::{Catalog, CatalogSource};
    pub use crate::error::{Result, StratagemError};
    pub use crate::goal::Goal;
    pub use crate::types::{FactValue, Privilege, StateView};
}
