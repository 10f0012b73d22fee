//! The ordered step sequence of one observation.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use super::location::Location;
use super::step::Step;

/// Why a step could not be placed at a location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("location {0} is a sequence bound and cannot hold a step")]
    Sentinel(Location),

    #[error("location {0} is already occupied")]
    Occupied(Location),
}

/// Steps of one observation keyed by their (unique) location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepSequence {
    steps: BTreeMap<Location, Step>,
}

impl StepSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, location: &Location) -> Option<&Step> {
        self.steps.get(location)
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.steps.contains_key(location)
    }

    /// Steps in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = (&Location, &Step)> {
        self.steps.iter()
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.steps.keys()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.values()
    }

    /// Location of the last step, or `Beginning` for an empty sequence.
    pub fn last_location(&self) -> Location {
        self.steps
            .keys()
            .next_back()
            .cloned()
            .unwrap_or(Location::Beginning)
    }

    /// Greatest held location strictly below `location`, or `Beginning`.
    pub fn before(&self, location: &Location) -> Location {
        self.steps
            .range((Bound::Unbounded, Bound::Excluded(location)))
            .next_back()
            .map(|(loc, _)| loc.clone())
            .unwrap_or(Location::Beginning)
    }

    /// Least held location strictly above `location`, or `End`.
    pub fn after(&self, location: &Location) -> Location {
        self.steps
            .range((Bound::Excluded(location), Bound::Unbounded))
            .next()
            .map(|(loc, _)| loc.clone())
            .unwrap_or(Location::End)
    }

    /// Place `step` at a free, assignable location.
    pub fn insert(&mut self, location: Location, step: Step) -> Result<(), PlacementError> {
        if !location.is_assignable() {
            return Err(PlacementError::Sentinel(location));
        }
        if self.steps.contains_key(&location) {
            return Err(PlacementError::Occupied(location));
        }
        self.steps.insert(location, step);
        Ok(())
    }

    pub fn remove(&mut self, location: &Location) -> Option<Step> {
        self.steps.remove(location)
    }
}

impl IntoIterator for StepSequence {
    type Item = (Location, Step);
    type IntoIter = std::collections::btree_map::IntoIter<Location, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}
