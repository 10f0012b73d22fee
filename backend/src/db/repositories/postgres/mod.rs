//! Postgres repository implementation using Diesel.
//!
//! Sequences are stored one row per step in the `steps` table, keyed by
//! observation and the canonical text of the step's location. The smart GCAL
//! mapping table lives in `gcal_mappings`. Both schemas are created by the
//! embedded migrations.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures, including serialization conflicts
//! - SERIALIZABLE transactions for units of work
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::DatabaseErrorKind;
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;
use tokio::task;

use crate::db::models::SeedData;
use crate::db::repository::{
    ErrorContext, GcalMappingRepository, RepositoryError, RepositoryResult, Rewrite,
    SequenceRepository, SequenceUnit, StepStore,
};
use crate::models::{
    GcalConfig, Location, ObservationId, PlacementError, SearchKey, SmartGcalSelector,
    SmartGcalType, Step, StepSequence,
};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// Unset or unparsable numeric variables fall back to the defaults listed
    /// in the module documentation.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let defaults = Self::default();
        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Diesel-backed repository for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    ///
    /// # Returns
    /// * `Ok(PostgresRepository)` on success
    /// * `Err(RepositoryError)` if connection or migration fails
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(Self { pool, config })
    }

    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// The operation is re-run from scratch on a fresh connection after a
    /// retryable error, so a rolled-back unit of work is simply attempted again.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    log::debug!("Retrying database operation (attempt {})", attempt + 1);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1)),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        return Err(err);
                    }
                };

                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Bulk load mapping rows and initial sequences in one transaction.
    ///
    /// Mapping ordinals continue after the rows already stored, so candidates
    /// come back in load order across successive seeds.
    pub async fn load_seed(&self, seed: SeedData) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let stored_max: Option<i32> = gcal_mappings::table
                    .select(diesel::dsl::max(gcal_mappings::ordinal))
                    .first(tx)?;
                let first_ordinal = stored_max.map_or(0, |max| max.saturating_add(1));

                let mappings = seed
                    .gcal_mappings
                    .iter()
                    .enumerate()
                    .map(|(index, mapping)| {
                        Ok(NewGcalMappingRow {
                            search_key: to_json(&mapping.key, "load_seed")?,
                            lamp_type: mapping.lamp_type().as_str().to_string(),
                            baseline: mapping.baseline.as_str().to_string(),
                            ordinal: next_ordinal(first_ordinal, index)?,
                            gcal_config: to_json(&mapping.config, "load_seed")?,
                        })
                    })
                    .collect::<RepositoryResult<Vec<_>>>()?;
                if !mappings.is_empty() {
                    diesel::insert_into(gcal_mappings::table)
                        .values(&mappings)
                        .execute(tx)?;
                }

                for entry in &seed.sequences {
                    let mut store = PgStepStore::new(tx, entry.observation_id);
                    for (location, step) in entry.steps.iter() {
                        store.insert(location, step)?;
                    }
                }
                Ok(())
            })
        })
        .await
    }
}

fn to_json<T: serde::Serialize>(value: &T, operation: &str) -> RepositoryResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| {
        RepositoryError::internal_with_context(
            format!("Failed to encode JSON: {e}"),
            ErrorContext::new(operation),
        )
    })
}

/// Ordinal for the `index`-th row of a seed whose first row gets `first`.
fn next_ordinal(first: i32, index: usize) -> RepositoryResult<i32> {
    i32::try_from(index)
        .ok()
        .and_then(|offset| first.checked_add(offset))
        .ok_or_else(|| {
            RepositoryError::validation_with_context(
                "Too many GCAL mapping rows for the ordinal column",
                ErrorContext::new("load_seed")
                    .with_entity("gcal_mapping")
                    .with_details(format!("first={first}, index={index}")),
            )
        })
}

fn decode_step_row(row: StepRow) -> RepositoryResult<(Location, Step)> {
    let entity_id = format!("{}@{}", row.observation_id, row.location);
    let context = || {
        ErrorContext::new("decode_step")
            .with_entity("step")
            .with_entity_id(&entity_id)
    };
    let location: Location = row.location.parse().map_err(|e| {
        RepositoryError::internal_with_context(format!("Stored location is invalid: {e}"), context())
    })?;
    let step: Step = serde_json::from_value(row.step_json).map_err(|e| {
        RepositoryError::internal_with_context(format!("Stored step is invalid: {e}"), context())
    })?;
    Ok((location, step))
}

/// Outcome of a transaction body that should not commit.
enum UnitAbort {
    Outcome(Rewrite),
    Failed(RepositoryError),
}

impl From<diesel::result::Error> for UnitAbort {
    fn from(err: diesel::result::Error) -> Self {
        UnitAbort::Failed(err.into())
    }
}

/// [`StepStore`] over one observation's rows, on a borrowed connection.
struct PgStepStore<'a> {
    conn: &'a mut PgConnection,
    observation_id: ObservationId,
}

impl<'a> PgStepStore<'a> {
    fn new(conn: &'a mut PgConnection, observation_id: ObservationId) -> Self {
        Self {
            conn,
            observation_id,
        }
    }
}

impl StepStore for PgStepStore<'_> {
    fn select_all(&mut self) -> RepositoryResult<StepSequence> {
        let rows = steps::table
            .filter(steps::observation_id.eq(self.observation_id.0))
            .select(StepRow::as_select())
            .load::<StepRow>(self.conn)?;

        let mut sequence = StepSequence::new();
        for row in rows {
            let (location, step) = decode_step_row(row)?;
            sequence.insert(location, step).map_err(|e| {
                RepositoryError::internal_with_context(
                    e.to_string(),
                    ErrorContext::new("select_all").with_entity_id(self.observation_id),
                )
            })?;
        }
        Ok(sequence)
    }

    fn select_one(&mut self, location: &Location) -> RepositoryResult<Option<Step>> {
        steps::table
            .filter(steps::observation_id.eq(self.observation_id.0))
            .filter(steps::location.eq(location.to_string()))
            .select(StepRow::as_select())
            .first::<StepRow>(self.conn)
            .optional()?
            .map(|row| decode_step_row(row).map(|(_, step)| step))
            .transpose()
    }

    fn insert(&mut self, location: &Location, step: &Step) -> RepositoryResult<()> {
        if !location.is_assignable() {
            return Err(RepositoryError::placement(
                PlacementError::Sentinel(location.clone()),
                self.observation_id,
            ));
        }
        let row = NewStepRow {
            observation_id: self.observation_id.0,
            location: location.to_string(),
            step_type: step.kind().as_str().to_string(),
            step_json: to_json(step, "insert_step")?,
        };
        match diesel::insert_into(steps::table).values(&row).execute(self.conn) {
            Ok(_) => Ok(()),
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(RepositoryError::placement(
                    PlacementError::Occupied(location.clone()),
                    self.observation_id,
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete_at(&mut self, location: &Location) -> RepositoryResult<bool> {
        let deleted = diesel::delete(
            steps::table
                .filter(steps::observation_id.eq(self.observation_id.0))
                .filter(steps::location.eq(location.to_string())),
        )
        .execute(self.conn)?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl SequenceRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(RepositoryError::from)
        })
        .await
    }

    async fn select_all(&self, observation_id: ObservationId) -> RepositoryResult<StepSequence> {
        self.with_conn(move |conn| PgStepStore::new(conn, observation_id).select_all())
            .await
    }

    async fn select_one(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<Option<Step>> {
        let location = location.clone();
        self.with_conn(move |conn| PgStepStore::new(conn, observation_id).select_one(&location))
            .await
    }

    async fn insert(
        &self,
        observation_id: ObservationId,
        location: &Location,
        step: &Step,
    ) -> RepositoryResult<()> {
        let location = location.clone();
        let step = step.clone();
        self.with_conn(move |conn| PgStepStore::new(conn, observation_id).insert(&location, &step))
            .await
    }

    async fn delete_at(
        &self,
        observation_id: ObservationId,
        location: &Location,
    ) -> RepositoryResult<bool> {
        let location = location.clone();
        self.with_conn(move |conn| PgStepStore::new(conn, observation_id).delete_at(&location))
            .await
    }

    async fn atomically(
        &self,
        observation_id: ObservationId,
        unit: SequenceUnit,
    ) -> RepositoryResult<Rewrite> {
        self.with_conn(move |conn| {
            let result = conn
                .build_transaction()
                .serializable()
                .run(|tx| -> Result<Rewrite, UnitAbort> {
                    let mut store = PgStepStore::new(tx, observation_id);
                    match unit(&mut store as &mut dyn StepStore) {
                        Ok(Rewrite::Applied(written)) => Ok(Rewrite::Applied(written)),
                        Ok(other) => Err(UnitAbort::Outcome(other)),
                        Err(e) => Err(UnitAbort::Failed(e)),
                    }
                });
            match result {
                Ok(outcome) | Err(UnitAbort::Outcome(outcome)) => Ok(outcome),
                Err(UnitAbort::Failed(e)) => Err(e.with_operation("atomically")),
            }
        })
        .await
    }
}

#[async_trait]
impl GcalMappingRepository for PostgresRepository {
    async fn select_gcal(
        &self,
        key: &SearchKey,
        smart_gcal_type: SmartGcalType,
    ) -> RepositoryResult<Vec<GcalConfig>> {
        let key_json = to_json(key, "select_gcal")?;
        self.with_conn(move |conn| {
            let mut query = gcal_mappings::table
                .filter(gcal_mappings::search_key.eq(key_json))
                .select(GcalMappingRow::as_select())
                .into_boxed();
            query = match smart_gcal_type.selector() {
                SmartGcalSelector::Lamp(lamp) => {
                    query.filter(gcal_mappings::lamp_type.eq(lamp.as_str()))
                }
                SmartGcalSelector::Baseline(baseline) => {
                    query.filter(gcal_mappings::baseline.eq(baseline.as_str()))
                }
            };

            let rows = query
                .order((gcal_mappings::ordinal.asc(), gcal_mappings::mapping_id.asc()))
                .load::<GcalMappingRow>(conn)?;

            rows.into_iter()
                .map(|row| {
                    serde_json::from_value::<GcalConfig>(row.gcal_config).map_err(|e| {
                        RepositoryError::internal_with_context(
                            format!("Stored GCAL configuration is invalid: {e}"),
                            ErrorContext::new("select_gcal")
                                .with_entity("gcal_mapping")
                                .with_entity_id(row.mapping_id),
                        )
                    })
                })
                .collect()
        })
        .await
    }
}
