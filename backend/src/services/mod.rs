//! Service layer for business logic and orchestration.
//!
//! Services sit between callers (the CLI, higher-level services) and the
//! repository traits. They are generic over [`FullRepository`] so the same
//! logic runs against the in-memory and Postgres backends.
//!
//! [`FullRepository`]: crate::db::FullRepository

pub mod expander;
pub mod sequence;

pub use expander::{
    expand_smart_gcal, preview_smart_gcal, resolve_context, wrap_candidates, ExpansionSettings,
    SmartGcalContext, SmartGcalExpander,
};
pub use sequence::{
    append_step, get_step, health_check, insert_step_after, list_steps, remove_step,
};
