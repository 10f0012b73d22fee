//! Instrument exposure configurations and their smart GCAL search keys.
//!
//! Each instrument family lives in its own module and implements
//! [`DeriveSearchKey`], the one capability the expansion protocol needs from
//! an otherwise opaque configuration. Only a representative subset of each
//! family's enumerated values is modelled here.

pub mod flamingos2;
pub mod gmos;

use serde::{Deserialize, Serialize};

pub use flamingos2::{Flamingos2Config, Flamingos2SearchKey};
pub use gmos::{GmosConfig, GmosSearchKey};

/// Projection of an exposure configuration used to query the GCAL mapping table.
pub trait DeriveSearchKey {
    /// The search key for this configuration, or `None` when the
    /// configuration has no smart calibration mapping.
    fn search_key(&self) -> Option<SearchKey>;
}

/// Mapping-table search key, one shape per instrument family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum SearchKey {
    Flamingos2(Flamingos2SearchKey),
    Gmos(GmosSearchKey),
}

/// Instrument-specific exposure configuration carried by every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum InstrumentConfig {
    Flamingos2(Flamingos2Config),
    Gmos(GmosConfig),
    /// Visitor instruments have no calibration mapping.
    Visitor { name: String },
}

impl DeriveSearchKey for InstrumentConfig {
    fn search_key(&self) -> Option<SearchKey> {
        match self {
            InstrumentConfig::Flamingos2(config) => config.search_key(),
            InstrumentConfig::Gmos(config) => config.search_key(),
            InstrumentConfig::Visitor { .. } => None,
        }
    }
}

impl From<Flamingos2Config> for InstrumentConfig {
    fn from(config: Flamingos2Config) -> Self {
        InstrumentConfig::Flamingos2(config)
    }
}

impl From<GmosConfig> for InstrumentConfig {
    fn from(config: GmosConfig) -> Self {
        InstrumentConfig::Gmos(config)
    }
}
