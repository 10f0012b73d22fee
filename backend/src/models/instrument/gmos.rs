//! GMOS (north and south) exposure configuration.

use serde::{Deserialize, Serialize};

use super::{DeriveSearchKey, SearchKey};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GmosSite {
    North,
    South,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GmosDisperser {
    Mirror,
    B600,
    R400,
    R831,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GmosFilter {
    None,
    GPrime,
    RPrime,
    IPrime,
    HAlpha,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GmosFpu {
    None,
    LongSlit050,
    LongSlit100,
    Ifu2Slit,
    Custom { mask: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GmosBinning {
    One,
    Two,
    Four,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GmosAmpGain {
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmosConfig {
    pub site: GmosSite,
    pub disperser: GmosDisperser,
    pub filter: GmosFilter,
    pub fpu: GmosFpu,
    pub x_binning: GmosBinning,
    pub y_binning: GmosBinning,
    pub amp_gain: GmosAmpGain,
    pub exposure_time: qtty::Seconds,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GmosSearchKey {
    pub site: GmosSite,
    pub disperser: GmosDisperser,
    pub filter: GmosFilter,
    pub fpu: GmosFpu,
    pub x_binning: GmosBinning,
    pub y_binning: GmosBinning,
    pub amp_gain: GmosAmpGain,
}

impl DeriveSearchKey for GmosConfig {
    fn search_key(&self) -> Option<SearchKey> {
        if let GmosFpu::Custom { .. } = self.fpu {
            return None;
        }
        Some(SearchKey::Gmos(GmosSearchKey {
            site: self.site,
            disperser: self.disperser,
            filter: self.filter,
            fpu: self.fpu.clone(),
            x_binning: self.x_binning,
            y_binning: self.y_binning,
            amp_gain: self.amp_gain,
        }))
    }
}
