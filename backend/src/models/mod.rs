pub mod expansion;
pub mod gcal;
pub mod instrument;
pub mod location;
pub mod macros;
pub mod sequence;
pub mod step;

pub use expansion::*;
pub use gcal::*;
pub use instrument::{DeriveSearchKey, InstrumentConfig, SearchKey};
pub use location::{Location, LocationError, LocationResult, Position};
pub use sequence::{PlacementError, StepSequence};
pub use step::{Offset, Step, StepKind};

crate::define_id_type!(i64, ObservationId);
