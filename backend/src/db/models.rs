//! Storage-side records shared by the repository backends.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::repository::{ErrorContext, RepositoryError, RepositoryResult};

use crate::models::{
    GcalBaselineType, GcalConfig, GcalLampType, ObservationId, SearchKey, SmartGcalType,
    StepSequence,
};

/// One row of the smart GCAL mapping table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcalMapping {
    pub key: SearchKey,
    pub baseline: GcalBaselineType,
    pub config: GcalConfig,
}

impl GcalMapping {
    pub fn new(key: SearchKey, baseline: GcalBaselineType, config: GcalConfig) -> Self {
        Self {
            key,
            baseline,
            config,
        }
    }

    /// Lamp category of the row, taken from its configured lamp.
    pub fn lamp_type(&self) -> GcalLampType {
        self.config.lamp.lamp_type()
    }

    /// Whether this row answers a lookup for `key` under `smart_gcal_type`.
    pub fn matches(&self, key: &SearchKey, smart_gcal_type: SmartGcalType) -> bool {
        &self.key == key && smart_gcal_type.selects(self.lamp_type(), self.baseline)
    }
}

/// Initial sequence of one observation in a seed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedSequence {
    pub observation_id: ObservationId,
    #[serde(default)]
    pub steps: StepSequence,
}

/// Data used to pre-populate a repository, typically read from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub gcal_mappings: Vec<GcalMapping>,
    #[serde(default)]
    pub sequences: Vec<SeedSequence>,
}

impl SeedData {
    /// Parse seed data from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read seed data from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        let path = path.as_ref();
        let context = || ErrorContext::new("load_seed").with_details(path.display().to_string());
        let content = fs::read_to_string(path).map_err(|e| {
            RepositoryError::configuration_with_context(
                format!("Failed to read seed file: {}", e),
                context(),
            )
        })?;
        Self::from_json(&content).map_err(|e| {
            RepositoryError::configuration_with_context(
                format!("Failed to parse seed file: {}", e),
                context(),
            )
        })
    }
}
