//! # Stratagem State
//!
//! Canonical world-state model with snapshot decoding and a fixed-length encoding.

pub mod encoding;
pub mod snapshot;
pub mod state;

pub use encoding::{StateEncoder, StateKey, TrackedFact, PRIVILEGE_SLOTS};
pub use snapshot::decode_from_source;
pub use state::State;
