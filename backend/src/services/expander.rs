//! Smart GCAL expansion.
//!
//! Expanding the smart GCAL step at a location happens in three stages:
//!
//! 1. Read the step, check that it is a smart GCAL step and derive the
//!    mapping-table search key from its instrument configuration.
//! 2. Look up the calibration configurations mapped to that key and wrap each
//!    one in a concrete `Gcal` step carrying the original instrument
//!    configuration.
//! 3. Replace the smart step with the concrete steps, at fresh locations
//!    strictly between the smart step's neighbours, in one atomic unit.
//!
//! [`SmartGcalExpander::preview`] runs stages 1 and 2 only and never writes.
//!
//! The mapping lookup runs outside the storage transaction. Stage 1 is
//! therefore run again against the live sequence inside the unit of stage 3;
//! if the smart step changed in between, the unit writes nothing and the
//! expansion is resolved again, up to [`ExpansionSettings::max_attempts`] times.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::db::repository::{
    ErrorContext, FullRepository, RepositoryError, RepositoryResult, Rewrite, SequenceUnit,
    StepStore,
};
use crate::models::{
    DeriveSearchKey, ExpandedStep, ExpansionError, ExpansionResult, GcalConfig, InstrumentConfig,
    Location, ObservationId, SearchKey, SmartGcalType, Step,
};

/// Tuning for [`SmartGcalExpander::expand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionSettings {
    /// Resolve-and-apply rounds attempted while the sequence keeps changing
    /// underneath. Values below 1 are treated as 1.
    pub max_attempts: u32,
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// What stage 1 learns from a smart GCAL step.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartGcalContext {
    pub instrument: InstrumentConfig,
    pub smart_gcal_type: SmartGcalType,
    pub key: SearchKey,
}

/// Stage 1: classify the step found at `location`.
pub fn resolve_context(location: &Location, step: Option<Step>) -> ExpansionResult<SmartGcalContext> {
    match step {
        None => Err(ExpansionError::StepNotFound(location.clone())),
        Some(Step::SmartGcal {
            instrument,
            smart_gcal_type,
        }) => {
            let key = instrument
                .search_key()
                .ok_or(ExpansionError::NoMappingDefined)?;
            Ok(SmartGcalContext {
                instrument,
                smart_gcal_type,
                key,
            })
        }
        Some(_) => Err(ExpansionError::NotSmartGcal),
    }
}

/// Stage 2: wrap mapping candidates as concrete steps, keeping their order.
pub fn wrap_candidates(
    context: &SmartGcalContext,
    candidates: Vec<GcalConfig>,
) -> ExpansionResult<Vec<Step>> {
    if candidates.is_empty() {
        return Err(ExpansionError::NoMappingDefined);
    }
    Ok(candidates
        .into_iter()
        .map(|gcal| Step::Gcal {
            instrument: context.instrument.clone(),
            gcal,
        })
        .collect())
}

/// Outcome of stages 1 and 2.
#[derive(Debug, Clone)]
struct Resolution {
    context: SmartGcalContext,
    steps: Vec<Step>,
}

/// Stage 3, run inside a unit of work against the live sequence.
fn apply(
    store: &mut dyn StepStore,
    observation_id: ObservationId,
    location: &Location,
    resolution: &Resolution,
) -> RepositoryResult<Rewrite> {
    let sequence = store.select_all()?;

    let live = match resolve_context(location, sequence.get(location).cloned()) {
        Ok(context) => context,
        Err(e) => return Ok(Rewrite::Rejected(e)),
    };
    if live != resolution.context {
        return Ok(Rewrite::Stale);
    }

    let before = sequence.before(location);
    let after = sequence.after(location);
    let fresh = Location::find(resolution.steps.len(), &before, &after).map_err(|e| {
        RepositoryError::internal_with_context(
            e.to_string(),
            ErrorContext::for_step("expand", observation_id, location),
        )
    })?;

    store.delete_at(location)?;
    let mut written = Vec::with_capacity(fresh.len());
    for (fresh_location, step) in fresh.into_iter().zip(&resolution.steps) {
        store.insert(&fresh_location, step)?;
        written.push((fresh_location, step.clone()));
    }
    Ok(Rewrite::Applied(written))
}

/// Expands smart GCAL steps of the sequences held by a repository.
///
/// # Example
/// ```ignore
/// let expander = SmartGcalExpander::new(repo.as_ref());
/// match expander.expand(observation_id, &location).await? {
///     Ok(steps) => println!("wrote {} calibration steps", steps.len()),
///     Err(reason) => println!("not expanded: {}", reason),
/// }
/// ```
pub struct SmartGcalExpander<'a, R: FullRepository + ?Sized> {
    repo: &'a R,
    settings: ExpansionSettings,
}

impl<'a, R: FullRepository + ?Sized> SmartGcalExpander<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self::with_settings(repo, ExpansionSettings::default())
    }

    pub fn with_settings(repo: &'a R, settings: ExpansionSettings) -> Self {
        Self { repo, settings }
    }

    pub fn settings(&self) -> &ExpansionSettings {
        &self.settings
    }

    async fn resolve(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<ExpansionResult<Resolution>> {
        let step = self.repo.select_one(observation_id, location).await?;
        let context = match resolve_context(location, step) {
            Ok(context) => context,
            Err(e) => {
                debug!("Observation {} at {}: {}", observation_id, location, e);
                return Ok(Err(e));
            }
        };

        let candidates = self
            .repo
            .select_gcal(&context.key, context.smart_gcal_type)
            .await?;
        debug!(
            "Observation {} at {}: {} {} candidate(s)",
            observation_id,
            location,
            candidates.len(),
            context.smart_gcal_type
        );

        Ok(wrap_candidates(&context, candidates).map(|steps| Resolution { context, steps }))
    }

    /// The concrete steps the smart step at `location` would expand into.
    ///
    /// Never writes.
    pub async fn preview(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<ExpansionResult<Vec<Step>>> {
        Ok(self
            .resolve(observation_id, location)
            .await?
            .map(|resolution| resolution.steps))
    }

    /// Replace the smart step at `location` by its concrete steps.
    ///
    /// Returns the written steps with their new locations, in sequence order.
    /// Any domain outcome other than success leaves the sequence unchanged.
    pub async fn expand(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<ExpansionResult<Vec<ExpandedStep>>> {
        let attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=attempts {
            let resolution = match self.resolve(observation_id, location).await? {
                Ok(resolution) => Arc::new(resolution),
                Err(e) => return Ok(Err(e)),
            };

            let unit: SequenceUnit = {
                let location = location.clone();
                Arc::new(move |store: &mut dyn StepStore| {
                    apply(store, observation_id, &location, &resolution)
                })
            };

            match self.repo.atomically(observation_id, unit).await? {
                Rewrite::Applied(written) => {
                    info!(
                        "Expanded smart GCAL step of observation {} at {} into {} step(s)",
                        observation_id,
                        location,
                        written.len()
                    );
                    return Ok(Ok(written.into_iter().map(ExpandedStep::from).collect()));
                }
                Rewrite::Rejected(e) => {
                    debug!("Observation {} at {}: {}", observation_id, location, e);
                    return Ok(Err(e));
                }
                Rewrite::Stale => {
                    warn!(
                        "Smart GCAL step of observation {} at {} changed during expansion (attempt {}/{})",
                        observation_id, location, attempt, attempts
                    );
                }
            }
        }

        Err(RepositoryError::transaction_with_context(
            format!("sequence changed during each of {} expansion attempts", attempts),
            ErrorContext::for_step("expand", observation_id, location).retryable(),
        ))
    }
}

/// Preview the expansion of the smart step at `location`.
pub async fn preview_smart_gcal<R: FullRepository + ?Sized>(
    repo: &R,
    observation_id: ObservationId,
    location: &Location,
) -> RepositoryResult<ExpansionResult<Vec<Step>>> {
    SmartGcalExpander::new(repo)
        .preview(observation_id, location)
        .await
}

/// Expand the smart step at `location` with the given settings.
pub async fn expand_smart_gcal<R: FullRepository + ?Sized>(
    repo: &R,
    observation_id: ObservationId,
    location: &Location,
    settings: ExpansionSettings,
) -> RepositoryResult<ExpansionResult<Vec<ExpandedStep>>> {
    SmartGcalExpander::with_settings(repo, settings)
        .expand(observation_id, location)
        .await
}

#[cfg(test)]
#[path = "expander_tests.rs"]
mod expander_tests;
