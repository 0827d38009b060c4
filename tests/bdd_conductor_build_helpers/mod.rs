//! Behavioural step helpers for conductor build scenarios.

mod assertions;
mod state;
mod steps;

pub use state::{ConductorBuildState, conductor_build_state};
