//! Step sequence repository trait.
//!
//! Sequences are stored per observation. Individual reads and writes are
//! available directly; anything that must read and then write consistently
//! goes through [`SequenceRepository::atomically`], which hands a
//! [`StepStore`] view to a unit of work and commits its writes only when the
//! unit reports [`Rewrite::Applied`].

use std::sync::Arc;

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{ExpansionError, Location, ObservationId, Step, StepSequence};

/// Synchronous view of one observation's sequence inside a unit of work.
pub trait StepStore {
    /// The full sequence, in order.
    fn select_all(&mut self) -> RepositoryResult<StepSequence>;

    /// The step at `location`, if any.
    fn select_one(&mut self, location: &Location) -> RepositoryResult<Option<Step>>;

    /// Place `step` at `location`; fails if the location is occupied or a sentinel.
    fn insert(&mut self, location: &Location, step: &Step) -> RepositoryResult<()>;

    /// Remove the step at `location`, reporting whether one was there.
    fn delete_at(&mut self, location: &Location) -> RepositoryResult<bool>;
}

/// What a unit of work decided after inspecting the live sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite {
    /// Writes are to be committed; carries the entries written, in order.
    Applied(Vec<(Location, Step)>),
    /// The live sequence does not allow the rewrite. Nothing is written.
    Rejected(ExpansionError),
    /// The live sequence changed since the caller resolved its plan. Nothing is written.
    Stale,
}

/// A unit of work run against one observation's sequence in a single transaction.
///
/// Units may be run more than once when a backend retries a transient
/// failure, so they must not carry side effects outside the store.
pub type SequenceUnit = Arc<dyn Fn(&mut dyn StepStore) -> RepositoryResult<Rewrite> + Send + Sync>;

/// Repository trait for step sequences.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait SequenceRepository: Send + Sync {
    /// Check if the storage backend is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Full ordered sequence of an observation (empty if it has no steps).
    async fn select_all(&self, observation_id: ObservationId) -> RepositoryResult<StepSequence>;

    /// Step at `location`, or `None`.
    async fn select_one(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<Option<Step>>;

    /// Insert a step.
    ///
    /// # Returns
    /// * `Err(RepositoryError::ValidationError)` - If `location` is occupied or a sentinel
    async fn insert(
        &self,
        observation_id: ObservationId,
        location: &Location,
        step: &Step,
    ) -> RepositoryResult<()>;

    /// Delete the step at `location`, reporting whether one was there.
    async fn delete_at(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<bool>;

    /// Run `unit` against the observation's sequence as one atomic unit.
    ///
    /// Concurrent units on the same observation are isolated from each
    /// other. Writes are committed only for [`Rewrite::Applied`]; any other
    /// outcome, or an error, leaves the sequence untouched.
    async fn atomically(
        &self,
        observation_id: ObservationId,
        unit: SequenceUnit,
    ) -> RepositoryResult<Rewrite>;
}
