//! Sequence editing on top of any repository backend.
//!
//! New steps get keys allocated with [`Location::find`] inside a unit of
//! work, so concurrent edits of the same observation never collide and no
//! existing step is ever moved.

use std::sync::Arc;

use log::debug;

use crate::db::repository::{
    ErrorContext, FullRepository, RepositoryError, RepositoryResult, Rewrite, SequenceUnit,
    StepStore,
};
use crate::models::{Location, ObservationId, Step, StepSequence};

/// Check that the backend is reachable.
pub async fn health_check<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

/// The observation's full sequence, in order.
pub async fn list_steps<R: FullRepository + ?Sized>(
    repo: &R,
    observation_id: ObservationId,
) -> RepositoryResult<StepSequence> {
    repo.select_all(observation_id).await
}

/// The step at `location`, if any.
pub async fn get_step<R: FullRepository + ?Sized>(
    repo: &R,
    observation_id: ObservationId,
    location: &Location,
) -> RepositoryResult<Option<Step>> {
    repo.select_one(observation_id, location).await
}

/// Add `step` after the last step of the sequence and return its location.
pub async fn append_step<R: FullRepository + ?Sized>(
    repo: &R,
    observation_id: ObservationId,
    step: Step,
) -> RepositoryResult<Location> {
    let unit: SequenceUnit = Arc::new(move |store: &mut dyn StepStore| {
        let sequence = store.select_all()?;
        place_between(store, observation_id, &sequence.last_location(), &Location::End, &step)
    });
    let location = applied_location(repo.atomically(observation_id, unit).await?, observation_id)?;
    debug!("Appended step to observation {} at {}", observation_id, location);
    Ok(location)
}

/// Add `step` directly after the step at `anchor` and return its location.
///
/// `anchor` may be [`Location::Beginning`] to insert before the first step.
/// Any other anchor must hold a step.
pub async fn insert_step_after<R: FullRepository + ?Sized>(
    repo: &R,
    observation_id: ObservationId,
    anchor: &Location,
    step: Step,
) -> RepositoryResult<Location> {
    let anchor = anchor.clone();
    let unit: SequenceUnit = Arc::new(move |store: &mut dyn StepStore| {
        let sequence = store.select_all()?;
        if anchor != Location::Beginning && !sequence.contains(&anchor) {
            return Err(RepositoryError::not_found_with_context(
                format!("No step at location {}", anchor),
                ErrorContext::for_step("insert_step_after", observation_id, &anchor),
            ));
        }
        place_between(store, observation_id, &anchor, &sequence.after(&anchor), &step)
    });
    let location = applied_location(repo.atomically(observation_id, unit).await?, observation_id)?;
    debug!("Inserted step into observation {} at {}", observation_id, location);
    Ok(location)
}

/// Remove the step at `location`, reporting whether one was there.
pub async fn remove_step<R: FullRepository + ?Sized>(
    repo: &R,
    observation_id: ObservationId,
    location: &Location,
) -> RepositoryResult<bool> {
    repo.delete_at(observation_id, location).await
}

fn place_between(
    store: &mut dyn StepStore,
    observation_id: ObservationId,
    before: &Location,
    after: &Location,
    step: &Step,
) -> RepositoryResult<Rewrite> {
    let location = Location::find(1, before, after)
        .map_err(|e| {
            RepositoryError::validation_with_context(
                e.to_string(),
                ErrorContext::for_step("place_step", observation_id, before),
            )
        })?
        .into_iter()
        .next()
        .ok_or_else(|| RepositoryError::internal("No location allocated"))?;
    store.insert(&location, step)?;
    Ok(Rewrite::Applied(vec![(location, step.clone())]))
}

fn applied_location(outcome: Rewrite, observation_id: ObservationId) -> RepositoryResult<Location> {
    match outcome {
        Rewrite::Applied(written) => written
            .into_iter()
            .next()
            .map(|(location, _)| location)
            .ok_or_else(|| RepositoryError::internal("Unit of work wrote no step")),
        other => Err(RepositoryError::internal_with_context(
            format!("Unexpected unit outcome {:?}", other),
            ErrorContext::new("place_step").with_entity_id(observation_id),
        )),
    }
}
