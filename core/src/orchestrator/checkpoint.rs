//! Checkpoint - capture/restore simulation state
//!
//! A checkpoint is an in-memory snapshot of everything needed to resume
//! a run bit-exactly: the step counter, every variable's full state,
//! every event's pending schedule, and (opt-in) the RNG stream state.
//! Process and listener closures are deliberately excluded; the caller
//! must rebuild a structurally identical simulation before restoring.
//!
//! # Critical Invariants
//!
//! - **Structure matching**: a checkpoint only restores into a
//!   simulation with the same population size, variable kinds and
//!   category sets, and event kinds, in the same registration order
//! - **No partial restore**: all validation happens before any
//!   mutation, so a failed restore leaves the target untouched
//! - **Opaque contract**: the serialized form is an engine-internal
//!   handoff, not a stable persistence format

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::bitset::Bitset;
use crate::events::EventKind;
use crate::variable::Variable;

use super::engine::{SimulationError, SimulationState};

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete simulation state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Step counter at capture time (a step boundary)
    pub step: usize,

    /// Population size (entity count)
    pub population_size: usize,

    /// Full per-variable state, in registration order
    pub variables: Vec<VariableSnapshot>,

    /// Pending event schedules, in registration order
    pub events: Vec<EventSnapshot>,

    /// RNG stream state, present iff capture was opted in
    pub rng_state: Option<u64>,

    /// SHA256 fingerprint of the structural descriptor (for validation)
    pub structure_hash: String,
}

/// Snapshot of one variable's full state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VariableSnapshot {
    /// Category labels plus one membership bitset per category
    Categorical {
        categories: Vec<String>,
        memberships: Vec<Bitset>,
    },
    /// Dense integer values
    Integer { values: Vec<i64> },
    /// Dense double values
    Double { values: Vec<f64> },
}

/// Snapshot of one event's pending schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSnapshot {
    /// Plain or targeted
    pub kind: EventKind,

    /// Pending `(step, target)` firings, ascending by step
    pub schedule: Vec<(usize, Option<Bitset>)>,
}

// ============================================================================
// Structure Fingerprint
// ============================================================================

/// Structural identity of a simulation: everything that must match
/// between capture and restore, and nothing that varies per step
#[derive(Serialize)]
struct StructureDescriptor<'a> {
    population_size: usize,
    variables: Vec<VariableStructure<'a>>,
    events: Vec<EventKind>,
}

#[derive(Serialize)]
enum VariableStructure<'a> {
    Categorical { categories: &'a [String] },
    Integer,
    Double,
}

fn describe(state: &SimulationState) -> StructureDescriptor<'_> {
    StructureDescriptor {
        population_size: state.population_size,
        variables: state
            .variables
            .iter()
            .map(|v| match v {
                Variable::Categorical(c) => VariableStructure::Categorical {
                    categories: c.categories(),
                },
                Variable::Integer(_) => VariableStructure::Integer,
                Variable::Double(_) => VariableStructure::Double,
            })
            .collect(),
        events: state.events.iter().map(|e| e.kind()).collect(),
    }
}

/// Compute the SHA256 structural fingerprint of a simulation
///
/// Field order in the descriptor is fixed by the struct definitions, so
/// plain JSON serialization is already canonical.
fn structure_hash(state: &SimulationState) -> Result<String, SimulationError> {
    let json = serde_json::to_string(&describe(state)).map_err(|e| {
        SimulationError::SerializationError(format!("structure serialization failed: {}", e))
    })?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Capture / Restore
// ============================================================================

/// Snapshot the full state at the current step boundary
pub(crate) fn capture(
    state: &SimulationState,
    capture_rng: bool,
) -> Result<Checkpoint, SimulationError> {
    let variables = state
        .variables
        .iter()
        .map(|v| match v {
            Variable::Categorical(c) => VariableSnapshot::Categorical {
                categories: c.categories().to_vec(),
                memberships: c.memberships().to_vec(),
            },
            Variable::Integer(v) => VariableSnapshot::Integer {
                values: v.values().to_vec(),
            },
            Variable::Double(v) => VariableSnapshot::Double {
                values: v.values().to_vec(),
            },
        })
        .collect();

    let events = state
        .events
        .iter()
        .map(|e| EventSnapshot {
            kind: e.kind(),
            schedule: e
                .pending()
                .iter()
                .map(|(step, target)| (*step, target.clone()))
                .collect(),
        })
        .collect();

    Ok(Checkpoint {
        step: state.step,
        population_size: state.population_size,
        variables,
        events,
        rng_state: if capture_rng { Some(state.rng.state()) } else { None },
        structure_hash: structure_hash(state)?,
    })
}

fn incompatible(reason: impl Into<String>) -> SimulationError {
    SimulationError::IncompatibleCheckpoint {
        reason: reason.into(),
    }
}

/// Validate `checkpoint` against `state`'s structure, then overwrite
/// all state
///
/// Validation is complete before the first mutation: on any error the
/// target simulation is left exactly as it was.
pub(crate) fn restore_into(
    state: &mut SimulationState,
    checkpoint: &Checkpoint,
) -> Result<(), SimulationError> {
    if checkpoint.population_size != state.population_size {
        return Err(incompatible(format!(
            "population size mismatch: checkpoint {}, simulation {}",
            checkpoint.population_size, state.population_size
        )));
    }
    if checkpoint.variables.len() != state.variables.len() {
        return Err(incompatible(format!(
            "variable count mismatch: checkpoint {}, simulation {}",
            checkpoint.variables.len(),
            state.variables.len()
        )));
    }
    if checkpoint.events.len() != state.events.len() {
        return Err(incompatible(format!(
            "event count mismatch: checkpoint {}, simulation {}",
            checkpoint.events.len(),
            state.events.len()
        )));
    }

    for (idx, (snapshot, variable)) in checkpoint
        .variables
        .iter()
        .zip(&state.variables)
        .enumerate()
    {
        match (snapshot, variable) {
            (
                VariableSnapshot::Categorical {
                    categories,
                    memberships,
                },
                Variable::Categorical(var),
            ) => {
                if categories != var.categories() {
                    return Err(incompatible(format!(
                        "variable {} category set mismatch: checkpoint {:?}, simulation {:?}",
                        idx,
                        categories,
                        var.categories()
                    )));
                }
                if memberships.len() != categories.len()
                    || memberships.iter().any(|m| m.size() != state.population_size)
                {
                    return Err(incompatible(format!(
                        "variable {} membership shape does not match population",
                        idx
                    )));
                }
            }
            (VariableSnapshot::Integer { values }, Variable::Integer(_)) => {
                if values.len() != state.population_size {
                    return Err(incompatible(format!(
                        "variable {} value count mismatch: checkpoint {}, population {}",
                        idx,
                        values.len(),
                        state.population_size
                    )));
                }
            }
            (VariableSnapshot::Double { values }, Variable::Double(_)) => {
                if values.len() != state.population_size {
                    return Err(incompatible(format!(
                        "variable {} value count mismatch: checkpoint {}, population {}",
                        idx,
                        values.len(),
                        state.population_size
                    )));
                }
            }
            _ => {
                return Err(incompatible(format!("variable {} kind mismatch", idx)));
            }
        }
    }

    for (idx, (snapshot, event)) in checkpoint.events.iter().zip(&state.events).enumerate() {
        if snapshot.kind != event.kind() {
            return Err(incompatible(format!("event {} kind mismatch", idx)));
        }
    }

    let own_hash = structure_hash(state)?;
    if own_hash != checkpoint.structure_hash {
        return Err(incompatible(
            "structure fingerprint mismatch".to_string(),
        ));
    }

    // Validation complete; mutate
    for (snapshot, variable) in checkpoint.variables.iter().zip(&mut state.variables) {
        match (snapshot, variable) {
            (VariableSnapshot::Categorical { memberships, .. }, Variable::Categorical(var)) => {
                var.set_memberships(memberships.clone());
            }
            (VariableSnapshot::Integer { values }, Variable::Integer(var)) => {
                var.set_values(values.clone());
            }
            (VariableSnapshot::Double { values }, Variable::Double(var)) => {
                var.set_values(values.clone());
            }
            _ => unreachable!("variable kinds validated above"),
        }
    }

    for (snapshot, event) in checkpoint.events.iter().zip(&mut state.events) {
        let schedule: BTreeMap<usize, Option<Bitset>> =
            snapshot.schedule.iter().cloned().collect();
        event.set_schedule(schedule);
    }

    state.step = checkpoint.step;
    if let Some(rng_state) = checkpoint.rng_state {
        state.rng.restore_state(rng_state);
    }
    Ok(())
}
