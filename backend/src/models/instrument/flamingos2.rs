//! Flamingos-2 exposure configuration.

use serde::{Deserialize, Serialize};

use super::{DeriveSearchKey, SearchKey};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flamingos2Disperser {
    None,
    R1200Jh,
    R1200Hk,
    R3000,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flamingos2Filter {
    Open,
    Y,
    J,
    H,
    Jh,
    Hk,
    KShort,
    KLong,
}

/// Focal plane unit. Custom masks are cut per program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flamingos2Fpu {
    None,
    Pinhole,
    LongSlit1,
    LongSlit2,
    LongSlit3,
    LongSlit4,
    LongSlit6,
    LongSlit8,
    Custom { mask: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flamingos2ReadMode {
    Bright,
    Medium,
    Faint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flamingos2Config {
    pub disperser: Flamingos2Disperser,
    pub filter: Flamingos2Filter,
    pub fpu: Flamingos2Fpu,
    pub exposure_time: qtty::Seconds,
    pub read_mode: Flamingos2ReadMode,
}

impl Default for Flamingos2Config {
    fn default() -> Self {
        Self {
            disperser: Flamingos2Disperser::None,
            filter: Flamingos2Filter::Open,
            fpu: Flamingos2Fpu::None,
            exposure_time: qtty::Seconds::new(85.0),
            read_mode: Flamingos2ReadMode::Bright,
        }
    }
}

/// Flamingos-2 calibrations depend on disperser, filter and focal plane unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flamingos2SearchKey {
    pub disperser: Flamingos2Disperser,
    pub filter: Flamingos2Filter,
    pub fpu: Flamingos2Fpu,
}

impl DeriveSearchKey for Flamingos2Config {
    fn search_key(&self) -> Option<SearchKey> {
        if let Flamingos2Fpu::Custom { .. } = self.fpu {
            return None;
        }
        Some(SearchKey::Flamingos2(Flamingos2SearchKey {
            disperser: self.disperser,
            filter: self.filter,
            fpu: self.fpu.clone(),
        }))
    }
}
