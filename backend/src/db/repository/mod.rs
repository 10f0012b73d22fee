//! Repository trait definitions for sequence storage.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for repository operations
//! - [`sequence`]: Step sequences per observation, including atomic units of work
//! - [`gcal`]: Read-only smart GCAL mapping lookups
//!
//! # Trait Composition
//!
//! A complete backend implements both traits; [`FullRepository`] is the
//! convenience bound used by the service layer:
//!
//! ```ignore
//! async fn my_service<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<()> {
//!     let steps = repo.select_all(observation_id).await?;
//!     let configs = repo.select_gcal(&key, SmartGcalType::Flat).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod gcal;
pub mod sequence;

// Re-export error types
pub use error::{ErrorContext, RepositoryError, RepositoryResult};

// Re-export all traits
pub use gcal::GcalMappingRepository;
pub use sequence::{Rewrite, SequenceRepository, SequenceUnit, StepStore};

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type that implements both repository
/// traits.
pub trait FullRepository: SequenceRepository + GcalMappingRepository {}

impl<T> FullRepository for T where T: SequenceRepository + GcalMappingRepository + ?Sized {}
