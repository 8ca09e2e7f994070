//! Deterministic divide-and-conquer task-tree runner.
//!
//! An objective is solved by a reasoner that, per node, either answers
//! directly, invokes one external tool, or splits the node into ordered
//! subtasks. This crate implements the task tree, the decision/execution
//! state machine on top of it, and the depth-first traversal that picks the
//! next node and decides termination. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (traversal, phase
//!   classification, decision normalization, working memory). No I/O, fully
//!   testable in isolation.
//! - **[`io`]**: Side-effecting seams (collaborator traits, run-state
//!   persistence, configuration). Substituted by scripted doubles in tests.
//! - **[`agents`]**: Per-phase components (conquer, divide, rescue,
//!   conclude) coordinating core logic with the collaborators.
//!
//! The [`driver`] steps a run; the entire mutable state of a run is one
//! serializable [`io::run_state::RunState`], so an external scheduler can
//! suspend, persist, and resume the run on any worker between steps.

pub mod agents;
pub mod core;
pub mod driver;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
