//! Population Simulator Core - Rust Engine
//!
//! Individual-based stochastic simulation engine: a population of N
//! entities advances through discrete time steps under user-defined
//! per-step processes and scheduled events, with deferred state updates
//! and checkpoint/restore.
//!
//! # Architecture
//!
//! - **bitset**: Population-indexing bit vector with sampling algorithms
//! - **variable**: Per-entity state (categorical, integer, double)
//! - **events**: Scheduled callbacks, optionally targeted at subsets
//! - **render**: Per-step scalar output sink interface
//! - **orchestrator**: Step loop and checkpoint capture/restore
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All randomness is deterministic (engine-owned seeded RNG)
//! 2. Within a step, all reads see pre-step state; queued updates commit
//!    atomically at the step boundary (process-order independence)
//! 3. Categorical membership bitsets always partition the population
//! 4. Checkpoints restore bit-exact future behavior when RNG capture is
//!    enabled

// Module declarations
pub mod bitset;
pub mod events;
pub mod orchestrator;
pub mod render;
pub mod rng;
pub mod variable;

// Re-exports for convenience
pub use bitset::{Bitset, BitsetError};
pub use events::{Event, EventError, EventKind};
pub use orchestrator::{
    Checkpoint, EventId, EventSnapshot, Simulation, SimulationConfig, SimulationError,
    SimulationState, StepResult, VariableId, VariableSnapshot,
};
pub use render::{MemoryRender, Render};
pub use rng::RngManager;
pub use variable::{
    CategoricalVariable, DoubleVariable, IntegerVariable, NumericValue, NumericVariable,
    Selection, Variable, VariableError,
};
