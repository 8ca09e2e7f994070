//! Per-phase components built on the task tree.
//!
//! Each component runs to completion within one step and makes at most one
//! collaborator round trip. All of their state lives in the run state they
//! are handed; the structs themselves only carry configuration.

pub mod concluder;
pub mod conqueror;
pub mod divider;
pub mod rescue;
