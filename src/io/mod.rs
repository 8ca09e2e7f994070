//! Side-effecting seams: collaborator traits, persistence, configuration.
//!
//! Everything here either performs I/O or abstracts over a collaborator that
//! does. Core logic must not depend on these modules' side effects; tests
//! substitute scripted implementations.

pub mod config;
pub mod reasoner;
pub mod run_state;
pub mod tool;
