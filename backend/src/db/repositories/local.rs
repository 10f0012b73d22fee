//! In-memory local repository implementation.
//!
//! This module provides a local implementation of all repository traits
//! suitable for unit testing and local development. Sequences live in a
//! HashMap keyed by observation and the GCAL mapping table in a Vec, so
//! execution is fast, deterministic, and isolated.
//!
//! Units of work run while holding the write lock against a staged copy of
//! the observation's sequence. The copy replaces the stored sequence only
//! when the unit reports [`Rewrite::Applied`].

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::models::{GcalMapping, SeedData};
use crate::db::repository::*;
use crate::models::{
    GcalConfig, Location, ObservationId, SearchKey, SmartGcalType, Step, StepSequence,
};

/// In-memory local repository.
///
/// # Example
/// ```
/// use smart_gcal::db::repositories::LocalRepository;
/// use smart_gcal::db::repository::SequenceRepository;
/// use smart_gcal::models::ObservationId;
///
/// #[tokio::test]
/// async fn test_empty_sequence() {
///     let repo = LocalRepository::new();
///     let steps = repo.select_all(ObservationId(1)).await.unwrap();
///     assert!(steps.is_empty());
/// }
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    sequences: HashMap<ObservationId, StepSequence>,
    gcal_mappings: Vec<GcalMapping>,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            sequences: HashMap::new(),
            gcal_mappings: Vec::new(),
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Create a repository pre-populated from seed data.
    pub fn from_seed(seed: SeedData) -> RepositoryResult<Self> {
        let repo = Self::new();
        repo.load_seed(seed)?;
        Ok(repo)
    }

    /// Append seed data: mapping rows are added, sequences are merged step by step.
    ///
    /// The merge runs against staged copies of the touched sequences, so a
    /// placement error leaves the repository exactly as it was.
    pub fn load_seed(&self, seed: SeedData) -> RepositoryResult<()> {
        let mut data = self.data.write();

        let mut staged: HashMap<ObservationId, StepSequence> = HashMap::new();
        for entry in seed.sequences {
            let observation_id = entry.observation_id;
            let sequence = staged.entry(observation_id).or_insert_with(|| {
                data.sequences
                    .get(&observation_id)
                    .cloned()
                    .unwrap_or_default()
            });
            for (location, step) in entry.steps {
                sequence
                    .insert(location, step)
                    .map_err(|e| RepositoryError::placement(e, observation_id))?;
            }
        }

        for (observation_id, sequence) in staged {
            if !sequence.is_empty() {
                data.sequences.insert(observation_id, sequence);
            }
        }
        data.gcal_mappings.extend(seed.gcal_mappings);
        Ok(())
    }

    /// Add one row to the GCAL mapping table.
    pub fn add_gcal_mapping(&self, mapping: GcalMapping) {
        self.data.write().gcal_mappings.push(mapping);
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    /// Number of steps stored for an observation.
    pub fn step_count(&self, observation_id: ObservationId) -> usize {
        self.data
            .read()
            .sequences
            .get(&observation_id)
            .map_or(0, StepSequence::len)
    }

    /// Number of rows in the mapping table.
    pub fn gcal_mapping_count(&self) -> usize {
        self.data.read().gcal_mappings.len()
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(data: &LocalData) -> RepositoryResult<()> {
        if !data.is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// [`StepStore`] over a staged copy of one sequence.
struct StagedSequence {
    observation_id: ObservationId,
    sequence: StepSequence,
}

impl StepStore for StagedSequence {
    fn select_all(&mut self) -> RepositoryResult<StepSequence> {
        Ok(self.sequence.clone())
    }

    fn select_one(&mut self, location: &Location) -> RepositoryResult<Option<Step>> {
        Ok(self.sequence.get(location).cloned())
    }

    fn insert(&mut self, location: &Location, step: &Step) -> RepositoryResult<()> {
        self.sequence
            .insert(location.clone(), step.clone())
            .map_err(|e| RepositoryError::placement(e, self.observation_id))
    }

    fn delete_at(&mut self, location: &Location) -> RepositoryResult<bool> {
        Ok(self.sequence.remove(location).is_some())
    }
}

#[async_trait]
impl SequenceRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn select_all(&self, observation_id: ObservationId) -> RepositoryResult<StepSequence> {
        let data = self.data.read();
        Self::check_health(&data)?;
        Ok(data
            .sequences
            .get(&observation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn select_one(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<Option<Step>> {
        let data = self.data.read();
        Self::check_health(&data)?;
        Ok(data
            .sequences
            .get(&observation_id)
            .and_then(|seq| seq.get(location))
            .cloned())
    }

    async fn insert(
        &self,
        observation_id: ObservationId,
        location: &Location,
        step: &Step,
    ) -> RepositoryResult<()> {
        let mut data = self.data.write();
        Self::check_health(&data)?;
        data.sequences
            .entry(observation_id)
            .or_default()
            .insert(location.clone(), step.clone())
            .map_err(|e| RepositoryError::placement(e, observation_id))
    }

    async fn delete_at(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<bool> {
        let mut data = self.data.write();
        Self::check_health(&data)?;
        Ok(data
            .sequences
            .get_mut(&observation_id)
            .and_then(|seq| seq.remove(location))
            .is_some())
    }

    async fn atomically(
        &self,
        observation_id: ObservationId,
        unit: SequenceUnit,
    ) -> RepositoryResult<Rewrite> {
        let mut data = self.data.write();
        Self::check_health(&data)?;

        let mut staged = StagedSequence {
            observation_id,
            sequence: data
                .sequences
                .get(&observation_id)
                .cloned()
                .unwrap_or_default(),
        };

        let outcome = unit(&mut staged as &mut dyn StepStore)?;
        if let Rewrite::Applied(_) = outcome {
            if staged.sequence.is_empty() {
                data.sequences.remove(&observation_id);
            } else {
                data.sequences.insert(observation_id, staged.sequence);
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl GcalMappingRepository for LocalRepository {
    async fn select_gcal(
        &self,
        key: &SearchKey,
        smart_gcal_type: SmartGcalType,
    ) -> RepositoryResult<Vec<GcalConfig>> {
        let data = self.data.read();
        Self::check_health(&data)?;
        Ok(data
            .gcal_mappings
            .iter()
            .filter(|row| row.matches(key, smart_gcal_type))
            .map(|row| row.config.clone())
            .collect())
    }
}
