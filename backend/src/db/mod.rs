//! Database module for step sequence and GCAL mapping storage.
//!
//! This module provides abstractions for database operations via the Repository pattern,
//! allowing different storage backends to be swapped easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (CLI, higher-level services)         │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (crate::services) - Business Logic       │
//! │  - Smart GCAL expansion                                 │
//! │  - Sequence editing                                     │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository) - Abstract Interface    │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────┐
//!     │                              │
//! ┌───▼──────────────┐   ┌───────────▼──────────┐
//! │ Local Repository │   │ Postgres Repository  │
//! │   (in-memory)    │   │   (Diesel + r2d2)    │
//! └──────────────────┘   └──────────────────────┘
//! ```
//!
//! # Module Layout
//! - `repository`: Trait definitions and error types
//! - `repositories::local`: In-memory implementation for tests and local development
//! - `repositories::postgres`: Postgres implementation with Diesel ORM
//! - `factory`: Factory and builder for creating repository instances
//! - `repo_config`: TOML configuration file support
//! - `models`: Storage-side records (mapping rows, seed data)
//!
//! # Recommended Usage
//! ```ignore
//! use smart_gcal::db::{RepositoryFactory, RepositoryType};
//! use smart_gcal::services;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = RepositoryFactory::from_env().await?;
//!     let steps = services::list_steps(repo.as_ref(), ObservationId(1)).await?;
//!     Ok(())
//! }
//! ```

// Feature flag priority: postgres > local
// When both features are enabled, `RepositoryType::from_env` decides at runtime.
#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod models;
pub mod repo_config;
pub mod repositories;
pub mod repository;

// Postgres config is colocated with the repository implementation.
#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::PostgresConfig;
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}

// ==================== Repository Pattern Exports ====================

pub use models::{GcalMapping, SeedData, SeedSequence};
pub use repo_config::RepositoryConfig;

pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    ErrorContext, FullRepository, GcalMappingRepository, RepositoryError, RepositoryResult,
    Rewrite, SequenceRepository, SequenceUnit, StepStore,
};

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};

/// Global repository instance initialized once per process.
static REPOSITORY: OnceLock<Arc<dyn FullRepository>> = OnceLock::new();

/// Initialize the global repository singleton from the environment.
///
/// Does nothing when a repository is already installed.
pub async fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }

    let repo = RepositoryFactory::from_env()
        .await
        .context("Failed to create repository from environment")?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// Install an already-built repository as the global singleton.
///
/// Fails if a repository was installed before.
pub fn set_repository(repo: Arc<dyn FullRepository>) -> Result<()> {
    REPOSITORY
        .set(repo)
        .map_err(|_| anyhow::anyhow!("Repository already initialized"))
}

/// Get a reference to the global repository instance.
pub fn get_repository() -> Result<&'static Arc<dyn FullRepository>> {
    REPOSITORY
        .get()
        .context("Database not initialized. Call init_repository() first.")
}
