//! Sequence steps.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::gcal::{GcalConfig, SmartGcalType};
use super::instrument::InstrumentConfig;

/// Telescope offset in arcseconds.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub p: qtty::Arcseconds,
    pub q: qtty::Arcseconds,
}

impl Offset {
    pub fn new(p: f64, q: f64) -> Self {
        Self {
            p: qtty::Arcseconds::new(p),
            q: qtty::Arcseconds::new(q),
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// One exposure in an observation's sequence.
///
/// Every variant carries the instrument configuration. Only `Gcal` and
/// `SmartGcal` carry calibration data; a `SmartGcal` step is a placeholder
/// that must be expanded into concrete `Gcal` steps before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Bias {
        instrument: InstrumentConfig,
    },
    Dark {
        instrument: InstrumentConfig,
    },
    Science {
        instrument: InstrumentConfig,
        offset: Offset,
    },
    Gcal {
        instrument: InstrumentConfig,
        gcal: GcalConfig,
    },
    SmartGcal {
        instrument: InstrumentConfig,
        smart_gcal_type: SmartGcalType,
    },
}

/// Discriminant of a [`Step`], used for storage and logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StepKind {
    Bias,
    Dark,
    Science,
    Gcal,
    SmartGcal,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Bias => "bias",
            StepKind::Dark => "dark",
            StepKind::Science => "science",
            StepKind::Gcal => "gcal",
            StepKind::SmartGcal => "smart_gcal",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Bias { .. } => StepKind::Bias,
            Step::Dark { .. } => StepKind::Dark,
            Step::Science { .. } => StepKind::Science,
            Step::Gcal { .. } => StepKind::Gcal,
            Step::SmartGcal { .. } => StepKind::SmartGcal,
        }
    }

    pub fn instrument(&self) -> &InstrumentConfig {
        match self {
            Step::Bias { instrument }
            | Step::Dark { instrument }
            | Step::Science { instrument, .. }
            | Step::Gcal { instrument, .. }
            | Step::SmartGcal { instrument, .. } => instrument,
        }
    }

    pub fn is_smart_gcal(&self) -> bool {
        matches!(self, Step::SmartGcal { .. })
    }
}
