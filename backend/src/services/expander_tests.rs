use super::*;
use crate::db::models::GcalMapping;
use crate::db::repository::{GcalMappingRepository, SequenceRepository};
use crate::db::LocalRepository;
use crate::models::instrument::flamingos2::{
    Flamingos2Config, Flamingos2Disperser, Flamingos2Filter, Flamingos2Fpu,
};
use crate::models::{
    GcalArc, GcalBaselineType, GcalContinuum, GcalDiffuser, GcalFilter, GcalLamp, GcalShutter,
    StepSequence,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

const OBS: ObservationId = ObservationId(42);

fn mid(n: i64) -> Location {
    Location::middle(n).unwrap()
}

fn f2() -> InstrumentConfig {
    InstrumentConfig::Flamingos2(Flamingos2Config {
        disperser: Flamingos2Disperser::R1200Jh,
        filter: Flamingos2Filter::Jh,
        fpu: Flamingos2Fpu::LongSlit2,
        ..Default::default()
    })
}

fn flat(seconds: f64) -> GcalConfig {
    GcalConfig {
        lamp: GcalLamp::Continuum(GcalContinuum::QuartzHalogen5W),
        filter: GcalFilter::Nir,
        diffuser: GcalDiffuser::Ir,
        shutter: GcalShutter::Open,
        exposure_time: qtty::Seconds::new(seconds),
        coadds: 1,
    }
}

fn arc(seconds: f64) -> GcalConfig {
    GcalConfig {
        lamp: GcalLamp::arcs([GcalArc::ArArc]).unwrap(),
        filter: GcalFilter::None,
        diffuser: GcalDiffuser::Visible,
        shutter: GcalShutter::Closed,
        exposure_time: qtty::Seconds::new(seconds),
        coadds: 1,
    }
}

fn smart(smart_gcal_type: SmartGcalType) -> Step {
    Step::SmartGcal {
        instrument: f2(),
        smart_gcal_type,
    }
}

fn bias() -> Step {
    Step::Bias { instrument: f2() }
}

fn dark() -> Step {
    Step::Dark { instrument: f2() }
}

fn gcal(config: GcalConfig) -> Step {
    Step::Gcal {
        instrument: f2(),
        gcal: config,
    }
}

/// Repository with night flats, day arcs and one day flat for the F2 key.
fn mapped_repo() -> LocalRepository {
    let repo = LocalRepository::new();
    let key = f2().search_key().unwrap();
    repo.add_gcal_mapping(GcalMapping::new(key.clone(), GcalBaselineType::Night, flat(10.0)));
    repo.add_gcal_mapping(GcalMapping::new(key.clone(), GcalBaselineType::Night, flat(20.0)));
    repo.add_gcal_mapping(GcalMapping::new(key.clone(), GcalBaselineType::Day, arc(30.0)));
    repo.add_gcal_mapping(GcalMapping::new(key, GcalBaselineType::Day, flat(40.0)));
    repo
}

async fn seed(repo: &LocalRepository, steps: Vec<(i64, Step)>) {
    for (n, step) in steps {
        repo.insert(OBS, &mid(n), &step).await.unwrap();
    }
}

async fn snapshot(repo: &LocalRepository) -> StepSequence {
    repo.select_all(OBS).await.unwrap()
}

#[test]
fn test_resolve_context_classifies_steps() {
    let loc = mid(3);
    assert_eq!(
        resolve_context(&loc, None),
        Err(ExpansionError::StepNotFound(loc.clone()))
    );
    assert_eq!(
        resolve_context(&loc, Some(bias())),
        Err(ExpansionError::NotSmartGcal)
    );
    assert_eq!(
        resolve_context(&loc, Some(gcal(flat(1.0)))),
        Err(ExpansionError::NotSmartGcal)
    );

    let visitor = Step::SmartGcal {
        instrument: InstrumentConfig::Visitor {
            name: "Zorro".to_string(),
        },
        smart_gcal_type: SmartGcalType::Flat,
    };
    assert_eq!(
        resolve_context(&loc, Some(visitor)),
        Err(ExpansionError::NoMappingDefined)
    );

    let context = resolve_context(&loc, Some(smart(SmartGcalType::Arc))).unwrap();
    assert_eq!(context.instrument, f2());
    assert_eq!(context.smart_gcal_type, SmartGcalType::Arc);
    assert_eq!(Some(context.key), f2().search_key());
}

#[test]
fn test_wrap_candidates_keeps_order_and_instrument() {
    let context = resolve_context(&mid(1), Some(smart(SmartGcalType::Flat))).unwrap();
    assert_eq!(
        wrap_candidates(&context, Vec::new()),
        Err(ExpansionError::NoMappingDefined)
    );

    let steps = wrap_candidates(&context, vec![flat(2.0), flat(1.0)]).unwrap();
    assert_eq!(steps, vec![gcal(flat(2.0)), gcal(flat(1.0))]);
}

#[test]
fn test_default_settings() {
    assert_eq!(ExpansionSettings::default().max_attempts, 3);
    let parsed: ExpansionSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(parsed, ExpansionSettings::default());
}

#[tokio::test]
async fn test_preview_returns_candidates_without_writing() {
    let repo = mapped_repo();
    seed(&repo, vec![(1, bias()), (2, smart(SmartGcalType::NightBaseline))]).await;
    let before = snapshot(&repo).await;

    let preview = SmartGcalExpander::new(&repo)
        .preview(OBS, &mid(2))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(preview, vec![gcal(flat(10.0)), gcal(flat(20.0))]);
    assert_eq!(snapshot(&repo).await, before);
}

#[tokio::test]
async fn test_preview_reports_domain_outcomes() {
    let repo = mapped_repo();
    seed(&repo, vec![(1, bias())]).await;
    let expander = SmartGcalExpander::new(&repo);

    assert_eq!(
        expander.preview(OBS, &mid(1)).await.unwrap(),
        Err(ExpansionError::NotSmartGcal)
    );
    assert_eq!(
        expander.preview(OBS, &mid(8)).await.unwrap(),
        Err(ExpansionError::StepNotFound(mid(8)))
    );
}

#[tokio::test]
async fn test_expand_selects_by_lamp_type() {
    let repo = mapped_repo();
    seed(&repo, vec![(4, smart(SmartGcalType::Flat))]).await;

    let written = SmartGcalExpander::new(&repo)
        .expand(OBS, &mid(4))
        .await
        .unwrap()
        .unwrap();

    let steps: Vec<Step> = written.iter().map(|e| e.step.clone()).collect();
    assert_eq!(
        steps,
        vec![gcal(flat(10.0)), gcal(flat(20.0)), gcal(flat(40.0))]
    );
    let stored: Vec<Step> = snapshot(&repo).await.steps().cloned().collect();
    assert_eq!(stored, steps);
}

#[tokio::test]
async fn test_expand_returns_new_locations_in_order() {
    let repo = mapped_repo();
    seed(
        &repo,
        vec![(1, bias()), (2, smart(SmartGcalType::DayBaseline)), (9, dark())],
    )
    .await;

    let written = SmartGcalExpander::new(&repo)
        .expand(OBS, &mid(2))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(written.len(), 2);
    assert!(mid(1) < written[0].location);
    assert!(written[0].location < written[1].location);
    assert!(written[1].location < mid(9));

    let sequence = snapshot(&repo).await;
    let locations: Vec<Location> = sequence.locations().cloned().collect();
    assert_eq!(
        locations,
        vec![
            mid(1),
            written[0].location.clone(),
            written[1].location.clone(),
            mid(9)
        ]
    );
}

#[tokio::test]
async fn test_expand_failure_on_unhealthy_backend_is_repository_error() {
    let repo = mapped_repo();
    seed(&repo, vec![(1, smart(SmartGcalType::Arc))]).await;
    repo.set_healthy(false);

    let result = SmartGcalExpander::new(&repo).expand(OBS, &mid(1)).await;
    assert!(matches!(
        result,
        Err(RepositoryError::ConnectionError { .. })
    ));

    repo.set_healthy(true);
    assert_eq!(
        repo.select_one(OBS, &mid(1)).await.unwrap(),
        Some(smart(SmartGcalType::Arc))
    );
}

/// Edit applied to the wrapped repository while the mapping table is queried.
#[derive(Clone, Copy)]
enum Interference {
    /// Flip the smart step between `Arc` and `Flat`.
    SwapType,
    /// Delete the smart step.
    Remove,
}

/// Wraps a local repository and edits the sequence between the resolve and
/// apply stages of an expansion, as a concurrent writer would.
struct InterferingRepository {
    inner: LocalRepository,
    location: Location,
    interference: Interference,
    remaining: AtomicU32,
}

impl InterferingRepository {
    fn new(inner: LocalRepository, location: Location, interference: Interference, times: u32) -> Self {
        Self {
            inner,
            location,
            interference,
            remaining: AtomicU32::new(times),
        }
    }

    async fn interfere(&self) {
        if self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return;
        }
        let current = self.inner.select_one(OBS, &self.location).await.unwrap();
        self.inner.delete_at(OBS, &self.location).await.unwrap();
        if let Interference::SwapType = self.interference {
            let swapped = match current {
                Some(Step::SmartGcal {
                    smart_gcal_type: SmartGcalType::Arc,
                    ..
                }) => smart(SmartGcalType::Flat),
                _ => smart(SmartGcalType::Arc),
            };
            self.inner.insert(OBS, &self.location, &swapped).await.unwrap();
        }
    }
}

#[async_trait]
impl SequenceRepository for InterferingRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.inner.health_check().await
    }

    async fn select_all(&self, observation_id: ObservationId) -> RepositoryResult<StepSequence> {
        self.inner.select_all(observation_id).await
    }

    async fn select_one(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<Option<Step>> {
        self.inner.select_one(observation_id, location).await
    }

    async fn insert(
        &self,
        observation_id: ObservationId,
        location: &Location,
        step: &Step,
    ) -> RepositoryResult<()> {
        self.inner.insert(observation_id, location, step).await
    }

    async fn delete_at(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<bool> {
        self.inner.delete_at(observation_id, location).await
    }

    async fn atomically(
        &self,
        observation_id: ObservationId,
        unit: SequenceUnit,
    ) -> RepositoryResult<Rewrite> {
        self.inner.atomically(observation_id, unit).await
    }
}

#[async_trait]
impl GcalMappingRepository for InterferingRepository {
    async fn select_gcal(
        &self,
        key: &SearchKey,
        smart_gcal_type: SmartGcalType,
    ) -> RepositoryResult<Vec<GcalConfig>> {
        let configs = self.inner.select_gcal(key, smart_gcal_type).await?;
        self.interfere().await;
        Ok(configs)
    }
}

#[tokio::test]
async fn test_expand_re_resolves_when_step_changes_underneath() {
    let inner = mapped_repo();
    seed(&inner, vec![(1, bias()), (2, smart(SmartGcalType::Arc))]).await;
    let repo = InterferingRepository::new(inner.clone(), mid(2), Interference::SwapType, 1);

    let written = SmartGcalExpander::new(&repo)
        .expand(OBS, &mid(2))
        .await
        .unwrap()
        .unwrap();

    // The first round resolved arcs; the step had become a flat request by then.
    let steps: Vec<Step> = written.into_iter().map(|e| e.step).collect();
    assert_eq!(
        steps,
        vec![gcal(flat(10.0)), gcal(flat(20.0)), gcal(flat(40.0))]
    );
    assert_eq!(inner.step_count(OBS), 4);
}

#[tokio::test]
async fn test_expand_gives_up_after_max_attempts() {
    let inner = mapped_repo();
    seed(&inner, vec![(2, smart(SmartGcalType::Arc))]).await;
    let repo = InterferingRepository::new(inner.clone(), mid(2), Interference::SwapType, u32::MAX);
    let settings = ExpansionSettings { max_attempts: 2 };

    let err = SmartGcalExpander::with_settings(&repo, settings)
        .expand(OBS, &mid(2))
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::TransactionError { .. }));
    assert!(err.is_retryable());
    let remaining = inner.select_all(OBS).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.get(&mid(2)).unwrap().is_smart_gcal());
}

#[tokio::test]
async fn test_expand_reports_step_removed_underneath() {
    let inner = mapped_repo();
    seed(&inner, vec![(1, bias()), (2, smart(SmartGcalType::Arc))]).await;
    let repo = InterferingRepository::new(inner.clone(), mid(2), Interference::Remove, 1);

    let outcome = SmartGcalExpander::new(&repo)
        .expand(OBS, &mid(2))
        .await
        .unwrap();

    assert_eq!(outcome, Err(ExpansionError::StepNotFound(mid(2))));
    let remaining: Vec<Location> = inner.select_all(OBS).await.unwrap().locations().cloned().collect();
    assert_eq!(remaining, vec![mid(1)]);
}
