//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use smart_gcal::db::{GcalMapping, LocalRepository, SequenceRepository};
use smart_gcal::models::instrument::flamingos2::{
    Flamingos2Config, Flamingos2Disperser, Flamingos2Filter, Flamingos2Fpu,
};
use smart_gcal::models::instrument::gmos::{
    GmosAmpGain, GmosBinning, GmosConfig, GmosDisperser, GmosFilter, GmosFpu, GmosSite,
};
use smart_gcal::models::{
    DeriveSearchKey, GcalArc, GcalBaselineType, GcalConfig, GcalContinuum, GcalDiffuser,
    GcalFilter, GcalLamp, GcalShutter, InstrumentConfig, Location, ObservationId, Offset,
    SmartGcalType, Step, StepSequence,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Restores the variables on unwind and serializes access to the process
/// environment across tests running in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// ==================== Sequence fixtures ====================

pub const OBS: ObservationId = ObservationId(7);

pub fn mid(n: i64) -> Location {
    Location::middle(n).unwrap()
}

/// Flamingos-2 long-slit J/H spectroscopy.
pub fn f2() -> InstrumentConfig {
    InstrumentConfig::Flamingos2(Flamingos2Config {
        disperser: Flamingos2Disperser::R1200Jh,
        filter: Flamingos2Filter::Jh,
        fpu: Flamingos2Fpu::LongSlit2,
        ..Default::default()
    })
}

/// Flamingos-2 with a custom mask, which has no mapping key.
pub fn f2_custom_mask() -> InstrumentConfig {
    InstrumentConfig::Flamingos2(Flamingos2Config {
        fpu: Flamingos2Fpu::Custom {
            mask: "G-2024B-0042".to_string(),
        },
        ..Default::default()
    })
}

/// GMOS-S R400 long-slit, 2x2 binning.
pub fn gmos() -> InstrumentConfig {
    InstrumentConfig::Gmos(GmosConfig {
        site: GmosSite::South,
        disperser: GmosDisperser::R400,
        filter: GmosFilter::RPrime,
        fpu: GmosFpu::LongSlit100,
        x_binning: GmosBinning::Two,
        y_binning: GmosBinning::Two,
        amp_gain: GmosAmpGain::Low,
        exposure_time: qtty::Seconds::new(900.0),
    })
}

pub fn flat(seconds: f64) -> GcalConfig {
    GcalConfig {
        lamp: GcalLamp::Continuum(GcalContinuum::IrGreyBodyHigh),
        filter: GcalFilter::Nir,
        diffuser: GcalDiffuser::Ir,
        shutter: GcalShutter::Open,
        exposure_time: qtty::Seconds::new(seconds),
        coadds: 1,
    }
}

pub fn arc(seconds: f64) -> GcalConfig {
    GcalConfig {
        lamp: GcalLamp::arcs([GcalArc::ArArc, GcalArc::XeArc]).unwrap(),
        filter: GcalFilter::None,
        diffuser: GcalDiffuser::Visible,
        shutter: GcalShutter::Closed,
        exposure_time: qtty::Seconds::new(seconds),
        coadds: 2,
    }
}

pub fn bias(instrument: InstrumentConfig) -> Step {
    Step::Bias { instrument }
}

pub fn dark(instrument: InstrumentConfig) -> Step {
    Step::Dark { instrument }
}

pub fn science(instrument: InstrumentConfig) -> Step {
    Step::Science {
        instrument,
        offset: Offset::new(0.0, 10.0),
    }
}

pub fn smart(instrument: InstrumentConfig, smart_gcal_type: SmartGcalType) -> Step {
    Step::SmartGcal {
        instrument,
        smart_gcal_type,
    }
}

pub fn gcal(instrument: InstrumentConfig, config: GcalConfig) -> Step {
    Step::Gcal {
        instrument,
        gcal: config,
    }
}

/// Mapping rows for `instrument`: `night` as night flats, `day` as day arcs.
pub fn map_instrument(
    repo: &LocalRepository,
    instrument: &InstrumentConfig,
    night: &[GcalConfig],
    day: &[GcalConfig],
) {
    let key = instrument.search_key().unwrap();
    for config in night {
        repo.add_gcal_mapping(GcalMapping::new(
            key.clone(),
            GcalBaselineType::Night,
            config.clone(),
        ));
    }
    for config in day {
        repo.add_gcal_mapping(GcalMapping::new(
            key.clone(),
            GcalBaselineType::Day,
            config.clone(),
        ));
    }
}

/// Insert `steps` into the sequence of [`OBS`] at integer keys.
pub async fn seed(repo: &LocalRepository, steps: Vec<(i64, Step)>) {
    for (n, step) in steps {
        repo.insert(OBS, &mid(n), &step).await.unwrap();
    }
}

pub async fn snapshot(repo: &LocalRepository) -> StepSequence {
    repo.select_all(OBS).await.unwrap()
}
