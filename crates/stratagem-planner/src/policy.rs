//! Search/learning policy: epsilon-greedy selection over a tabular Q-value estimator.
//!
//! The estimator is the only shared-mutable resource in training. Selection reads an
//! immutable [`ValueEstimator`]; learning goes through [`QLearner`], which buffers
//! self-contained [`TransitionRecord`]s and folds them in a single [`QLearner::update`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use stratagem_core::{Action, ActionId, Catalog, Result, StratagemError};
use stratagem_state::{StateEncoder, StateKey};
use tracing::debug;

/// What the exploration schedule counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationMode {
    /// One rate per episode, decayed by episode index.
    #[default]
    PerEpisode,
    /// Decayed by the global number of steps taken in training.
    PerStep,
}

/// Decaying exploration rate: `max(floor, start * decay^t)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationSchedule {
    /// Rate at `t = 0`.
    pub start: f64,

    /// Lower bound.
    pub floor: f64,

    /// Multiplicative decay per tick.
    pub decay: f64,

    /// Tick unit.
    pub mode: ExplorationMode,
}

impl Default for ExplorationSchedule {
    fn default() -> Self {
        Self {
            start: 1.0,
            floor: 0.1,
            decay: 0.99,
            mode: ExplorationMode::PerEpisode,
        }
    }
}

impl ExplorationSchedule {
    /// Rate after `tick` ticks.
    pub fn rate(&self, tick: u64) -> f64 {
        let exponent = i32::try_from(tick).unwrap_or(i32::MAX);
        (self.start * self.decay.powi(exponent)).max(self.floor).clamp(0.0, 1.0)
    }

    /// Rate for a step, picking the tick according to [`ExplorationMode`].
    pub fn rate_for(&self, episode: u64, global_step: u64) -> f64 {
        match self.mode {
            ExplorationMode::PerEpisode => self.rate(episode),
            ExplorationMode::PerStep => self.rate(global_step),
        }
    }

    /// Check bounds.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.start) || !(0.0..=1.0).contains(&self.floor) {
            return Err(StratagemError::validation(
                "Exploration start and floor must lie in [0, 1]",
            ));
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(StratagemError::validation("Exploration decay must lie in (0, 1]"));
        }
        Ok(())
    }
}

/// How to choose among actions with equal estimated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First in catalog order.
    #[default]
    CatalogOrder,
    /// Uniformly among the tied actions, using the caller's random source.
    Random,
}

/// Q-learning hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Learning rate.
    pub alpha: f64,

    /// Discount factor.
    pub gamma: f64,

    /// Value of never-visited (state, action) pairs.
    pub initial_value: f64,

    /// Tie-breaking rule for greedy selection.
    pub tie_break: TieBreak,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            gamma: 0.95,
            initial_value: 0.0,
            tie_break: TieBreak::CatalogOrder,
        }
    }
}

impl LearningConfig {
    /// Check bounds.
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(StratagemError::validation("Learning rate alpha must lie in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(StratagemError::validation("Discount gamma must lie in [0, 1]"));
        }
        if !self.initial_value.is_finite() {
            return Err(StratagemError::validation("Initial value must be finite"));
        }
        Ok(())
    }
}

/// One observed transition, complete enough to learn from without the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Encoded state before the action.
    pub state: StateKey,

    /// Action taken.
    pub action: ActionId,

    /// Reward received.
    pub reward: f64,

    /// Encoded state after the action.
    pub next_state: StateKey,

    /// Actions eligible in the next state.
    pub next_eligible: Vec<ActionId>,

    /// True when the next state ends the episode (goal reached).
    pub terminal: bool,
}

/// Receives transitions as an episode runs.
pub trait TransitionSink {
    /// Record one transition.
    fn record(&mut self, record: TransitionRecord);
}

impl TransitionSink for Vec<TransitionRecord> {
    fn record(&mut self, record: TransitionRecord) {
        self.push(record);
    }
}

/// Sink that drops every record, for pure exploitation rollouts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TransitionSink for NullSink {
    fn record(&mut self, _record: TransitionRecord) {}
}

/// Tabular Q-value estimator.
#[derive(Debug, Clone, Default)]
pub struct ValueEstimator {
    values: HashMap<StateKey, HashMap<ActionId, f64>>,
    config: LearningConfig,
    updates: u64,
}

impl ValueEstimator {
    /// Empty estimator.
    pub fn new(config: LearningConfig) -> Self {
        Self {
            values: HashMap::new(),
            config,
            updates: 0,
        }
    }

    /// Estimated value of taking `action` in `state`.
    pub fn value(&self, state: &StateKey, action: &str) -> f64 {
        self.values
            .get(state)
            .and_then(|row| row.get(action))
            .copied()
            .unwrap_or(self.config.initial_value)
    }

    /// Highest estimated value among `actions`, or 0 if there are none.
    pub fn best_value(&self, state: &StateKey, actions: &[ActionId]) -> f64 {
        actions
            .iter()
            .map(|action| self.value(state, action.as_str()))
            .fold(None, |best: Option<f64>, v| Some(best.map_or(v, |b| b.max(v))))
            .unwrap_or(0.0)
    }

    /// Number of learned (state, action) pairs.
    pub fn len(&self) -> usize {
        self.values.values().map(HashMap::len).sum()
    }

    /// Returns true if nothing has been learned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of transitions folded in so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Learning hyperparameters.
    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Choose an action among `eligible` (which must be in catalog order).
    ///
    /// Returns `None` when `eligible` is empty. With probability `exploration_rate` the
    /// choice is uniform; otherwise it is the highest-valued action under the configured
    /// [`TieBreak`]. Depends only on the arguments, the current estimates and `rng`.
    pub fn select_action<'a, R: Rng + ?Sized>(
        &self,
        state: &StateKey,
        eligible: &[&'a Action],
        exploration_rate: f64,
        rng: &mut R,
    ) -> Option<&'a Action> {
        if eligible.is_empty() {
            return None;
        }

        if rng.gen::<f64>() < exploration_rate {
            return Some(eligible[rng.gen_range(0..eligible.len())]);
        }

        let values: Vec<f64> = eligible
            .iter()
            .map(|action| self.value(state, action.id.as_str()))
            .collect();
        let best = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        match self.config.tie_break {
            TieBreak::CatalogOrder => values
                .iter()
                .position(|&v| v == best)
                .map(|i| eligible[i]),
            TieBreak::Random => {
                let tied: Vec<usize> = values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| **v == best)
                    .map(|(i, _)| i)
                    .collect();
                let pick = tied[rng.gen_range(0..tied.len())];
                Some(eligible[pick])
            }
        }
    }

    fn fold(&mut self, record: &TransitionRecord) {
        let bootstrap = if record.terminal {
            0.0
        } else {
            self.best_value(&record.next_state, &record.next_eligible)
        };
        let target = record.reward + self.config.gamma * bootstrap;

        let current = self.value(&record.state, record.action.as_str());
        let updated = current + self.config.alpha * (target - current);

        self.values
            .entry(record.state.clone())
            .or_default()
            .insert(record.action.clone(), updated);
        self.updates += 1;
    }

    /// Serializable copy of the estimates, tagged with the catalog they were learned on
    /// and carrying the encoder whose keys they use.
    pub fn snapshot(&self, catalog: &Catalog, encoder: &StateEncoder) -> EstimatorSnapshot {
        let mut entries: Vec<ValueEntry> = self
            .values
            .iter()
            .flat_map(|(state, row)| {
                row.iter().map(move |(action, value)| ValueEntry {
                    state: state.clone(),
                    action: action.clone(),
                    value: *value,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.state.cmp(&b.state).then_with(|| a.action.cmp(&b.action)));

        EstimatorSnapshot {
            catalog_fingerprint: catalog.fingerprint(),
            encoder: encoder.clone(),
            config: self.config,
            updates: self.updates,
            entries,
            saved_at: Utc::now(),
        }
    }

    /// Rebuild an estimator from a snapshot learned on `catalog`.
    ///
    /// Returns the snapshot's encoder alongside it: the stored keys are only
    /// meaningful under that schema.
    pub fn restore(snapshot: &EstimatorSnapshot, catalog: &Catalog) -> Result<(Self, StateEncoder)> {
        if snapshot.catalog_fingerprint != catalog.fingerprint() {
            return Err(StratagemError::validation(
                "Estimator snapshot was learned on a different catalog",
            ));
        }

        let key_len = snapshot.encoder.tracked_facts().len() + 1;
        let mut values: HashMap<StateKey, HashMap<ActionId, f64>> = HashMap::new();
        for entry in &snapshot.entries {
            if entry.state.slots().len() != key_len {
                return Err(StratagemError::validation(format!(
                    "Estimator snapshot has a {}-slot state key, its encoder uses {}",
                    entry.state.slots().len(),
                    key_len
                )));
            }
            if catalog.get(entry.action.as_str()).is_none() {
                return Err(StratagemError::validation(format!(
                    "Estimator snapshot references unknown action '{}'",
                    entry.action
                )));
            }
            values
                .entry(entry.state.clone())
                .or_default()
                .insert(entry.action.clone(), entry.value);
        }

        let estimator = Self {
            values,
            config: snapshot.config,
            updates: snapshot.updates,
        };
        Ok((estimator, snapshot.encoder.clone()))
    }
}

/// One learned value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    /// Encoded state.
    pub state: StateKey,
    /// Action.
    pub action: ActionId,
    /// Estimated value.
    pub value: f64,
}

/// Persistable form of a [`ValueEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorSnapshot {
    /// [`Catalog::fingerprint`] of the catalog the values were learned on.
    pub catalog_fingerprint: String,
    /// Encoder that produced the state keys.
    pub encoder: StateEncoder,
    /// Hyperparameters in effect.
    pub config: LearningConfig,
    /// Transitions folded in.
    pub updates: u64,
    /// Values sorted by (state, action).
    pub entries: Vec<ValueEntry>,
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
}

/// Owns the estimator and a replay buffer of observed transitions.
#[derive(Debug, Clone, Default)]
pub struct QLearner {
    estimator: ValueEstimator,
    buffer: Vec<TransitionRecord>,
}

impl QLearner {
    /// Fresh learner.
    pub fn new(config: LearningConfig) -> Self {
        Self::from_estimator(ValueEstimator::new(config))
    }

    /// Continue learning from an existing estimator.
    pub fn from_estimator(estimator: ValueEstimator) -> Self {
        Self {
            estimator,
            buffer: Vec::new(),
        }
    }

    /// Current estimator, frozen between updates.
    pub fn estimator(&self) -> &ValueEstimator {
        &self.estimator
    }

    /// Consume the learner, keeping the estimator.
    pub fn into_estimator(self) -> ValueEstimator {
        self.estimator
    }

    /// Buffer a transition for the next update.
    pub fn observe(&mut self, record: TransitionRecord) {
        self.buffer.push(record);
    }

    /// Buffer many transitions, in order.
    pub fn extend(&mut self, records: impl IntoIterator<Item = TransitionRecord>) {
        self.buffer.extend(records);
    }

    /// Transitions waiting for the next update.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Fold every buffered transition into the estimator, in arrival order.
    ///
    /// This is the only operation that mutates the estimator. Returns the number of
    /// transitions folded.
    pub fn update(&mut self) -> usize {
        let records = std::mem::take(&mut self.buffer);
        for record in &records {
            self.estimator.fold(record);
        }
        debug!(
            "Folded {} transitions, estimator holds {} values",
            records.len(),
            self.estimator.len()
        );
        records.len()
    }
}

impl TransitionSink for QLearner {
    fn record(&mut self, record: TransitionRecord) {
        self.observe(record);
    }
}
