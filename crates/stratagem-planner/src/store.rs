//! Persistence hooks for learned estimators and finished trajectories.
//!
//! The planner calls these opaquely; durable implementations belong to collaborators.
//! The in-memory versions keep every estimator version and a bounded trajectory log.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use stratagem_core::{Result, StratagemError};
use tracing::info;

use crate::episode::Trajectory;
use crate::policy::EstimatorSnapshot;

/// Save/load hook for estimator snapshots.
pub trait EstimatorStore: Send + Sync {
    /// Persist a snapshot, returning its version number.
    fn save(&self, snapshot: EstimatorSnapshot) -> Result<u64>;

    /// The most recent snapshot, if any.
    fn load(&self) -> Result<Option<EstimatorSnapshot>>;

    /// A specific version.
    fn load_version(&self, version: u64) -> Result<Option<EstimatorSnapshot>>;
}

/// Archive hook for finished episodes.
pub trait TrajectoryArchive: Send + Sync {
    /// Keep a finished trajectory.
    fn archive(&self, trajectory: &Trajectory) -> Result<()>;

    /// Archived trajectories, oldest first.
    fn list(&self) -> Result<Vec<Trajectory>>;
}

/// A versioned snapshot entry.
#[derive(Debug, Clone)]
struct StoredSnapshot {
    version: u64,
    timestamp: DateTime<Utc>,
    snapshot: EstimatorSnapshot,
}

/// In-memory, append-only estimator store.
#[derive(Debug, Default)]
pub struct InMemoryEstimatorStore {
    versions: RwLock<Vec<StoredSnapshot>>,
}

impl InMemoryEstimatorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions.
    pub fn version_count(&self) -> usize {
        self.versions.read().map(|v| v.len()).unwrap_or(0)
    }
}

fn poisoned() -> StratagemError {
    StratagemError::Internal("store lock poisoned".to_string())
}

impl EstimatorStore for InMemoryEstimatorStore {
    fn save(&self, snapshot: EstimatorSnapshot) -> Result<u64> {
        let mut versions = self.versions.write().map_err(|_| poisoned())?;
        let version = versions.last().map_or(1, |latest| latest.version + 1);

        versions.push(StoredSnapshot {
            version,
            timestamp: Utc::now(),
            snapshot,
        });

        info!("Saved estimator snapshot version {}", version);
        Ok(version)
    }

    fn load(&self) -> Result<Option<EstimatorSnapshot>> {
        let versions = self.versions.read().map_err(|_| poisoned())?;
        Ok(versions.last().map(|stored| stored.snapshot.clone()))
    }

    fn load_version(&self, version: u64) -> Result<Option<EstimatorSnapshot>> {
        let versions = self.versions.read().map_err(|_| poisoned())?;
        Ok(versions
            .iter()
            .find(|stored| stored.version == version)
            .map(|stored| {
                tracing::debug!("Loaded estimator version {} saved at {}", version, stored.timestamp);
                stored.snapshot.clone()
            }))
    }
}

/// In-memory trajectory log that drops the oldest entries past `capacity`.
#[derive(Debug)]
pub struct InMemoryTrajectoryArchive {
    trajectories: RwLock<VecDeque<Trajectory>>,
    capacity: usize,
}

impl InMemoryTrajectoryArchive {
    /// Create an archive holding at most `capacity` trajectories.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            trajectories: RwLock::new(VecDeque::new()),
            capacity,
        }
    }
}

impl Default for InMemoryTrajectoryArchive {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

impl TrajectoryArchive for InMemoryTrajectoryArchive {
    fn archive(&self, trajectory: &Trajectory) -> Result<()> {
        let mut trajectories = self.trajectories.write().map_err(|_| poisoned())?;
        trajectories.push_back(trajectory.clone());
        while trajectories.len() > self.capacity {
            trajectories.pop_front();
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<Trajectory>> {
        let trajectories = self.trajectories.read().map_err(|_| poisoned())?;
        Ok(trajectories.iter().cloned().collect())
    }
}
