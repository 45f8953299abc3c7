//! Orchestrator - main simulation loop
//!
//! Drives the step loop (process phase, event phase, apply phase) and
//! implements checkpoint capture/restore.
//!
//! See `engine.rs` for the loop and `checkpoint.rs` for snapshots.

pub mod checkpoint;
pub mod engine;

// Re-export main types for convenience
pub use checkpoint::{Checkpoint, EventSnapshot, VariableSnapshot};
pub use engine::{
    EventId, Simulation, SimulationConfig, SimulationError, SimulationState, StepResult,
    VariableId,
};
