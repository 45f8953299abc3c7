//! Simulation engine - step loop over a fixed population
//!
//! Implements the three-phase step protocol that makes user logic
//! order-independent within a step:
//!
//! ```text
//! For each step t:
//! 1. Process phase: run every process(state, t) in registration order;
//!    processes read pre-step state and queue updates
//! 2. Event phase: fire every event pending at exactly t, listeners in
//!    registration order; listeners also only read and queue
//! 3. Apply phase: update() every variable, committing queued changes
//! 4. Advance t
//! ```
//!
//! All reads in phases 1-2 observe the state as of the step boundary;
//! phase 3 is the sole mutator. For a fixed seed the outcome of a step
//! is therefore independent of process registration order beyond what
//! the user's own logic encodes.
//!
//! # Example
//!
//! ```
//! use popsim_core::{Selection, Simulation, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     population_size: 10,
//!     seed: 42,
//!     capture_rng_state: false,
//! };
//! let mut sim = Simulation::new(config).unwrap();
//! let initial: Vec<String> = vec!["S".into(); 10];
//! let health = sim
//!     .add_categorical(vec!["S".into(), "I".into()], &initial)
//!     .unwrap();
//!
//! sim.add_process(move |state, _t| {
//!     let susceptible = state
//!         .categorical(health)
//!         .unwrap()
//!         .get_index_of("S")?;
//!     let infected = susceptible.sample(0.3, state.rng())?;
//!     state
//!         .categorical_mut(health)
//!         .unwrap()
//!         .queue_update("I", Selection::Bitset(infected))?;
//!     Ok(())
//! });
//!
//! sim.run(5).unwrap();
//! assert_eq!(sim.state().step(), 5);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::bitset::{Bitset, BitsetError};
use crate::events::{Event, EventError};
use crate::render::Render;
use crate::rng::RngManager;
use crate::variable::{
    CategoricalVariable, DoubleVariable, IntegerVariable, Variable, VariableError,
};

use super::checkpoint::{self, Checkpoint};

// ============================================================================
// Configuration Types
// ============================================================================

/// Complete simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of entities in the population (fixed for the run)
    pub population_size: usize,

    /// RNG seed for the engine-owned deterministic stream
    pub seed: u64,

    /// Capture the RNG state in checkpoints
    ///
    /// Opt-in: restoring a checkpoint taken with this flag overwrites
    /// the engine's random stream, so every draw after the restore
    /// replays the original run exactly. Off by default; without it a
    /// resumed run diverges stochastically after the restore point.
    pub capture_rng_state: bool,
}

/// Handle to a variable registered with a [`Simulation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableId(pub(crate) usize);

/// Handle to an event registered with a [`Simulation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub(crate) usize);

/// Errors that can occur while building or running a simulation
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Bitset(#[from] BitsetError),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("Unknown variable handle: {0:?}")]
    UnknownVariable(VariableId),

    #[error("Unknown event handle: {0:?}")]
    UnknownEvent(EventId),

    #[error("Incompatible checkpoint: {reason}")]
    IncompatibleCheckpoint { reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Per-step summary returned by [`Simulation::step`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepResult {
    /// The step that just executed
    pub step: usize,

    /// Number of events that fired this step
    pub events_fired: usize,

    /// Number of queued update operations committed in the apply phase
    pub updates_applied: usize,
}

// ============================================================================
// Simulation State
// ============================================================================

/// A user-supplied per-step update rule
pub type Process = Box<dyn FnMut(&mut SimulationState, usize) -> Result<(), SimulationError>>;

/// An event listener; receives the firing step and, for targeted
/// events, the delivered subset
pub type Listener =
    Box<dyn FnMut(&mut SimulationState, usize, Option<&Bitset>) -> Result<(), SimulationError>>;

/// The data half of a simulation: step counter, variables, event
/// schedules, RNG stream, and render sink
///
/// This is what processes and listeners receive. Everything here is
/// state (checkpointable); process and listener code lives on
/// [`Simulation`] and is never captured.
pub struct SimulationState {
    pub(crate) step: usize,
    pub(crate) population_size: usize,
    pub(crate) variables: Vec<Variable>,
    pub(crate) events: Vec<Event>,
    pub(crate) rng: RngManager,
    pub(crate) render: Option<Box<dyn Render>>,
}

impl SimulationState {
    /// Current step counter
    pub fn step(&self) -> usize {
        self.step
    }

    /// Number of entities in the population
    pub fn population_size(&self) -> usize {
        self.population_size
    }

    /// The engine-owned random stream
    pub fn rng(&mut self) -> &mut RngManager {
        &mut self.rng
    }

    /// Variable behind `id`
    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.0)
    }

    /// Mutable variable behind `id`
    pub fn variable_mut(&mut self, id: VariableId) -> Option<&mut Variable> {
        self.variables.get_mut(id.0)
    }

    /// Categorical variable behind `id`
    pub fn categorical(&self, id: VariableId) -> Option<&CategoricalVariable> {
        self.variable(id).and_then(Variable::as_categorical)
    }

    /// Mutable categorical variable behind `id`
    pub fn categorical_mut(&mut self, id: VariableId) -> Option<&mut CategoricalVariable> {
        self.variable_mut(id).and_then(Variable::as_categorical_mut)
    }

    /// Integer variable behind `id`
    pub fn integer(&self, id: VariableId) -> Option<&IntegerVariable> {
        self.variable(id).and_then(Variable::as_integer)
    }

    /// Mutable integer variable behind `id`
    pub fn integer_mut(&mut self, id: VariableId) -> Option<&mut IntegerVariable> {
        self.variable_mut(id).and_then(Variable::as_integer_mut)
    }

    /// Double variable behind `id`
    pub fn double(&self, id: VariableId) -> Option<&DoubleVariable> {
        self.variable(id).and_then(Variable::as_double)
    }

    /// Mutable double variable behind `id`
    pub fn double_mut(&mut self, id: VariableId) -> Option<&mut DoubleVariable> {
        self.variable_mut(id).and_then(Variable::as_double_mut)
    }

    /// Event behind `id`
    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.get(id.0)
    }

    /// Mutable event behind `id`
    pub fn event_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.events.get_mut(id.0)
    }

    fn event_checked(&mut self, id: EventId) -> Result<&mut Event, SimulationError> {
        self.events
            .get_mut(id.0)
            .ok_or(SimulationError::UnknownEvent(id))
    }

    /// Enqueue a firing of `event` after `delay` steps
    ///
    /// Fails with `PastSchedule` for `delay == 0`.
    pub fn schedule(&mut self, event: EventId, delay: usize) -> Result<(), SimulationError> {
        let target = self.step + delay;
        self.schedule_at(event, target)
    }

    /// Enqueue a firing of `event` at absolute `step`
    pub fn schedule_at(&mut self, event: EventId, step: usize) -> Result<(), SimulationError> {
        let now = self.step;
        self.event_checked(event)?.schedule_at(step, now)?;
        Ok(())
    }

    /// Enqueue a targeted firing after `delay` steps, delivered to `subset`
    pub fn schedule_subset(
        &mut self,
        event: EventId,
        delay: usize,
        subset: &Bitset,
    ) -> Result<(), SimulationError> {
        let target = self.step + delay;
        self.schedule_subset_at(event, target, subset)
    }

    /// Enqueue a targeted firing at absolute `step`
    pub fn schedule_subset_at(
        &mut self,
        event: EventId,
        step: usize,
        subset: &Bitset,
    ) -> Result<(), SimulationError> {
        let now = self.step;
        self.event_checked(event)?
            .schedule_subset_at(step, subset, now)?;
        Ok(())
    }

    /// Write a named scalar for the current step to the render sink
    ///
    /// A no-op when no sink is attached.
    pub fn render_write(&mut self, name: &str, value: f64) {
        let step = self.step;
        if let Some(sink) = self.render.as_mut() {
            sink.write(name, step, value);
        }
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// Individual-based simulation over a fixed population
///
/// Owns the full variable/event graph for one run; handles index into
/// the engine's arenas, so no shared ownership is needed.
/// Structural identity (population size, variables, category sets,
/// events, registration order) is fixed once the run starts and must be
/// recreated identically before restoring a checkpoint.
pub struct Simulation {
    state: SimulationState,
    processes: Vec<Process>,
    /// Listener lists, indexed parallel to `state.events`
    listeners: Vec<Vec<Listener>>,
    capture_rng_state: bool,
}

impl Simulation {
    /// Create an empty simulation over `config.population_size` entities
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        if config.population_size == 0 {
            return Err(BitsetError::InvalidSize { size: 0 }.into());
        }
        Ok(Self {
            state: SimulationState {
                step: 0,
                population_size: config.population_size,
                variables: Vec::new(),
                events: Vec::new(),
                rng: RngManager::new(config.seed),
                render: None,
            },
            processes: Vec::new(),
            listeners: Vec::new(),
            capture_rng_state: config.capture_rng_state,
        })
    }

    /// Read access to the simulation state
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Mutable access to the simulation state
    ///
    /// Intended for setup and inspection between runs; during a step the
    /// state is only reachable from process/listener arguments.
    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    fn check_population(&self, len: usize) -> Result<(), SimulationError> {
        if len != self.state.population_size {
            return Err(BitsetError::SizeMismatch {
                left: len,
                right: self.state.population_size,
            }
            .into());
        }
        Ok(())
    }

    /// Register a categorical variable with one initial label per entity
    pub fn add_categorical<S: AsRef<str>>(
        &mut self,
        categories: Vec<String>,
        initial: &[S],
    ) -> Result<VariableId, SimulationError> {
        self.check_population(initial.len())?;
        let var = CategoricalVariable::new(categories, initial)?;
        self.state.variables.push(Variable::Categorical(var));
        Ok(VariableId(self.state.variables.len() - 1))
    }

    /// Register an integer variable with one initial value per entity
    pub fn add_integer(&mut self, values: Vec<i64>) -> Result<VariableId, SimulationError> {
        self.check_population(values.len())?;
        let var = IntegerVariable::new(values)?;
        self.state.variables.push(Variable::Integer(var));
        Ok(VariableId(self.state.variables.len() - 1))
    }

    /// Register a double variable with one initial value per entity
    pub fn add_double(&mut self, values: Vec<f64>) -> Result<VariableId, SimulationError> {
        self.check_population(values.len())?;
        let var = DoubleVariable::new(values)?;
        self.state.variables.push(Variable::Double(var));
        Ok(VariableId(self.state.variables.len() - 1))
    }

    /// Register a plain event
    pub fn add_event(&mut self) -> EventId {
        self.state.events.push(Event::new());
        self.listeners.push(Vec::new());
        EventId(self.state.events.len() - 1)
    }

    /// Register a targeted event over the population
    pub fn add_targeted_event(&mut self) -> EventId {
        self.state
            .events
            .push(Event::targeted(self.state.population_size));
        self.listeners.push(Vec::new());
        EventId(self.state.events.len() - 1)
    }

    /// Attach a listener to `event`; listeners run in attachment order
    pub fn add_listener<F>(&mut self, event: EventId, listener: F) -> Result<(), SimulationError>
    where
        F: FnMut(&mut SimulationState, usize, Option<&Bitset>) -> Result<(), SimulationError>
            + 'static,
    {
        let slot = self
            .listeners
            .get_mut(event.0)
            .ok_or(SimulationError::UnknownEvent(event))?;
        slot.push(Box::new(listener));
        Ok(())
    }

    /// Register a per-step process; processes run in registration order
    pub fn add_process<F>(&mut self, process: F)
    where
        F: FnMut(&mut SimulationState, usize) -> Result<(), SimulationError> + 'static,
    {
        self.processes.push(Box::new(process));
    }

    /// Attach a render sink for per-step scalar output
    pub fn set_render<R: Render + 'static>(&mut self, sink: R) {
        self.state.render = Some(Box::new(sink));
    }

    /// Execute one step: process phase, event phase, apply phase
    pub fn step(&mut self) -> Result<StepResult, SimulationError> {
        let t = self.state.step;

        trace!(step = t, processes = self.processes.len(), "process phase");
        for process in &mut self.processes {
            process(&mut self.state, t)?;
        }

        let mut events_fired = 0;
        for idx in 0..self.state.events.len() {
            if let Some(target) = self.state.events[idx].take_due(t) {
                events_fired += 1;
                debug!(step = t, event = idx, "firing event");
                for listener in &mut self.listeners[idx] {
                    listener(&mut self.state, t, target.as_ref())?;
                }
            }
        }

        let mut updates_applied = 0;
        for variable in &mut self.state.variables {
            updates_applied += variable.update();
        }

        self.state.step = t + 1;
        Ok(StepResult {
            step: t,
            events_fired,
            updates_applied,
        })
    }

    /// Execute `steps` consecutive steps; returns the new step counter
    pub fn run(&mut self, steps: usize) -> Result<usize, SimulationError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(self.state.step)
    }

    /// Capture a checkpoint at the current step boundary
    ///
    /// Includes the RNG state iff the simulation was configured with
    /// `capture_rng_state`. Process and listener closures are never
    /// captured; the caller re-registers them before restoring.
    pub fn checkpoint(&self) -> Result<Checkpoint, SimulationError> {
        debug!(step = self.state.step, "capturing checkpoint");
        checkpoint::capture(&self.state, self.capture_rng_state)
    }

    /// Overwrite all state from `checkpoint`
    ///
    /// The simulation must be structurally identical to the one that
    /// produced the checkpoint (population size, variable kinds and
    /// category sets, event kinds, registration order); any mismatch
    /// fails with `IncompatibleCheckpoint` and leaves this simulation
    /// unmodified. When the checkpoint carries an RNG state the engine's
    /// random stream is replaced, affecting every subsequent draw.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<(), SimulationError> {
        checkpoint::restore_into(&mut self.state, checkpoint)?;
        debug!(step = self.state.step, "checkpoint restored");
        Ok(())
    }
}
