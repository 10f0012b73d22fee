//! Calibration unit (GCAL) configuration and smart calibration recipes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Continuum (flat field) sources.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcalContinuum {
    IrGreyBodyLow,
    IrGreyBodyHigh,
    QuartzHalogen5W,
    QuartzHalogen100W,
}

/// Arc lamps. Several may be lit at once.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcalArc {
    ArArc,
    ThArArc,
    CuArArc,
    XeArc,
}

/// Lamp setting: either one continuum source or a non-empty set of arcs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LampRepr", into = "LampRepr")]
pub enum GcalLamp {
    Continuum(GcalContinuum),
    Arcs(BTreeSet<GcalArc>),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LampRepr {
    Continuum(GcalContinuum),
    Arcs(BTreeSet<GcalArc>),
}

impl TryFrom<LampRepr> for GcalLamp {
    type Error = String;

    fn try_from(repr: LampRepr) -> Result<Self, Self::Error> {
        match repr {
            LampRepr::Continuum(c) => Ok(GcalLamp::Continuum(c)),
            LampRepr::Arcs(arcs) => {
                GcalLamp::arcs(arcs).ok_or_else(|| "arc lamp setting needs at least one arc".into())
            }
        }
    }
}

impl From<GcalLamp> for LampRepr {
    fn from(lamp: GcalLamp) -> Self {
        match lamp {
            GcalLamp::Continuum(c) => LampRepr::Continuum(c),
            GcalLamp::Arcs(arcs) => LampRepr::Arcs(arcs),
        }
    }
}

impl GcalLamp {
    /// Arc setting from the given lamps, `None` when no lamp is given.
    pub fn arcs(arcs: impl IntoIterator<Item = GcalArc>) -> Option<Self> {
        let arcs: BTreeSet<GcalArc> = arcs.into_iter().collect();
        if arcs.is_empty() {
            None
        } else {
            Some(GcalLamp::Arcs(arcs))
        }
    }

    pub fn lamp_type(&self) -> GcalLampType {
        match self {
            GcalLamp::Continuum(_) => GcalLampType::Flat,
            GcalLamp::Arcs(_) => GcalLampType::Arc,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcalFilter {
    None,
    Gmos,
    Hros,
    Nir,
    Nd10,
    Nd20,
    Nd30,
    Nd40,
    Nd45,
    Nd50,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcalDiffuser {
    Ir,
    Visible,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcalShutter {
    Open,
    Closed,
}

/// A concrete calibration unit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcalConfig {
    pub lamp: GcalLamp,
    pub filter: GcalFilter,
    pub diffuser: GcalDiffuser,
    pub shutter: GcalShutter,
    pub exposure_time: qtty::Seconds,
    pub coadds: u16,
}

/// Lamp category a mapping row belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcalLampType {
    Arc,
    Flat,
}

/// Baseline calibration set a mapping row belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcalBaselineType {
    Day,
    Night,
}

impl GcalLampType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GcalLampType::Arc => "arc",
            GcalLampType::Flat => "flat",
        }
    }
}

impl GcalBaselineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GcalBaselineType::Day => "day",
            GcalBaselineType::Night => "night",
        }
    }
}

/// Calibration recipe named by a smart GCAL step.
///
/// `Arc` and `Flat` select mapping rows by lamp type; the two baselines select
/// by baseline set regardless of lamp.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmartGcalType {
    Arc,
    Flat,
    NightBaseline,
    DayBaseline,
}

/// The mapping-table column a [`SmartGcalType`] filters on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SmartGcalSelector {
    Lamp(GcalLampType),
    Baseline(GcalBaselineType),
}

impl SmartGcalType {
    pub fn selector(&self) -> SmartGcalSelector {
        match self {
            SmartGcalType::Arc => SmartGcalSelector::Lamp(GcalLampType::Arc),
            SmartGcalType::Flat => SmartGcalSelector::Lamp(GcalLampType::Flat),
            SmartGcalType::NightBaseline => SmartGcalSelector::Baseline(GcalBaselineType::Night),
            SmartGcalType::DayBaseline => SmartGcalSelector::Baseline(GcalBaselineType::Day),
        }
    }

    /// Whether a mapping row tagged with `lamp` and `baseline` applies.
    pub fn selects(&self, lamp: GcalLampType, baseline: GcalBaselineType) -> bool {
        match self.selector() {
            SmartGcalSelector::Lamp(l) => l == lamp,
            SmartGcalSelector::Baseline(b) => b == baseline,
        }
    }
}

impl fmt::Display for SmartGcalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SmartGcalType::Arc => "arc",
            SmartGcalType::Flat => "flat",
            SmartGcalType::NightBaseline => "night_baseline",
            SmartGcalType::DayBaseline => "day_baseline",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arcs_require_at_least_one_lamp() {
        assert!(GcalLamp::arcs(Vec::<GcalArc>::new()).is_none());
        let lamp = GcalLamp::arcs([GcalArc::XeArc, GcalArc::ArArc, GcalArc::XeArc]).unwrap();
        match &lamp {
            GcalLamp::Arcs(arcs) => assert_eq!(arcs.len(), 2),
            other => panic!("unexpected lamp {:?}", other),
        }
        assert_eq!(lamp.lamp_type(), GcalLampType::Arc);
        assert_eq!(
            GcalLamp::Continuum(GcalContinuum::QuartzHalogen5W).lamp_type(),
            GcalLampType::Flat
        );
    }

    #[test]
    fn test_empty_arc_set_is_rejected_on_decode() {
        let err = serde_json::from_str::<GcalLamp>(r#"{"arcs":[]}"#).unwrap_err();
        assert!(err.to_string().contains("at least one arc"));

        let lamp: GcalLamp = serde_json::from_str(r#"{"arcs":["th_ar_arc"]}"#).unwrap();
        assert_eq!(lamp, GcalLamp::arcs([GcalArc::ThArArc]).unwrap());
    }

    #[test]
    fn test_smart_type_selection() {
        use GcalBaselineType::*;
        use GcalLampType::*;

        assert!(SmartGcalType::Arc.selects(Arc, Day));
        assert!(SmartGcalType::Arc.selects(Arc, Night));
        assert!(!SmartGcalType::Arc.selects(Flat, Night));
        assert!(SmartGcalType::Flat.selects(Flat, Day));
        assert!(SmartGcalType::NightBaseline.selects(Arc, Night));
        assert!(SmartGcalType::NightBaseline.selects(Flat, Night));
        assert!(!SmartGcalType::NightBaseline.selects(Flat, Day));
        assert!(SmartGcalType::DayBaseline.selects(Arc, Day));
    }
}
