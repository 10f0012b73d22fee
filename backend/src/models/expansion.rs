//! Outcomes of smart GCAL expansion.

use serde::{Deserialize, Serialize};

use super::location::Location;
use super::step::Step;

/// Result type for the domain outcome of an expansion.
pub type ExpansionResult<T> = Result<T, ExpansionError>;

/// Reasons a smart GCAL step cannot be expanded.
///
/// These are ordinary, reportable outcomes. Storage failures are reported
/// separately as repository errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpansionError {
    #[error("no step at location {0}")]
    StepNotFound(Location),

    #[error("step is not a smart GCAL step")]
    NotSmartGcal,

    /// No search key could be derived, or the mapping table has no rows for it.
    #[error("no GCAL mapping defined for this configuration")]
    NoMappingDefined,
}

/// A calibration step written by an expansion, with its new location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedStep {
    pub location: Location,
    pub step: Step,
}

impl From<(Location, Step)> for ExpandedStep {
    fn from((location, step): (Location, Step)) -> Self {
        Self { location, step }
    }
}
