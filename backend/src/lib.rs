//! # Smart GCAL
//!
//! Observation step sequences with dense ordering and smart calibration
//! expansion.
//!
//! An observation's sequence is an ordered map from [`models::Location`] to
//! [`models::Step`]. Locations form a dense order: new steps can always be
//! placed between two existing ones without renumbering anything. Some steps
//! are smart GCAL placeholders naming a calibration recipe; before execution
//! they are expanded against the GCAL mapping table into concrete
//! calibration steps, in place and atomically.
//!
//! ## Architecture
//!
//! - [`models`]: Locations, steps, sequences, instrument and GCAL configurations
//! - [`db`]: Repository traits, in-memory and Postgres backends, configuration
//! - [`services`]: Smart GCAL expansion and sequence editing
//!
//! ## Example
//!
//! ```ignore
//! use smart_gcal::db::LocalRepository;
//! use smart_gcal::models::{Location, ObservationId};
//! use smart_gcal::services::SmartGcalExpander;
//!
//! let repo = LocalRepository::new();
//! let expander = SmartGcalExpander::new(&repo);
//! match expander.expand(ObservationId(1), &Location::middle(2)?).await? {
//!     Ok(written) => println!("{} calibration steps", written.len()),
//!     Err(reason) => println!("not expanded: {}", reason),
//! }
//! ```

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod db;
pub mod models;
pub mod services;
