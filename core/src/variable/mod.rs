//! Per-entity state containers
//!
//! A `Variable` holds one value per entity and comes in three kinds:
//! categorical (label per entity, stored as one membership bitset per
//! category), integer, and double. All kinds share the deferred-update
//! contract that makes the step loop order-independent:
//!
//! 1. Reads (`get_index_of`, value queries) always see pre-step state
//! 2. Writes go through `queue_update` and stay invisible until the
//!    orchestrator calls `update()` at the step boundary
//! 3. Queued updates apply in call order; later calls override earlier
//!    ones for the same entity (last-write-wins)
//!
//! # Critical Invariants
//!
//! - Population size and category set are fixed for the life of the run
//! - Categorical membership bitsets always partition the population

mod categorical;
mod numeric;

pub use categorical::CategoricalVariable;
pub use numeric::{DoubleVariable, IntegerVariable, NumericValue, NumericVariable};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bitset::{Bitset, BitsetError};

/// Errors that can occur during variable operations
#[derive(Debug, Error, PartialEq)]
pub enum VariableError {
    #[error("Unknown category: {name:?}")]
    UnknownCategory { name: String },

    #[error("Update length mismatch: {values} value(s) for {targets} target(s)")]
    SizeMismatch { values: usize, targets: usize },

    #[error(transparent)]
    Bitset(#[from] BitsetError),
}

/// Which entities a queued update applies to
///
/// # Example
/// ```
/// use popsim_core::Selection;
///
/// let everyone = Selection::All;
/// let some: Selection = vec![2usize, 5].into();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Selection {
    /// Every entity in the population
    All,
    /// Entities whose bit is set
    Bitset(Bitset),
    /// Explicit entity indices (order preserved for per-target values)
    Indices(Vec<usize>),
}

impl From<Bitset> for Selection {
    fn from(bs: Bitset) -> Self {
        Selection::Bitset(bs)
    }
}

impl From<Vec<usize>> for Selection {
    fn from(indices: Vec<usize>) -> Self {
        Selection::Indices(indices)
    }
}

impl Selection {
    /// Resolve to an ordered index list over a population of `size`
    ///
    /// Bitset selections yield ascending indices; explicit index lists
    /// keep their given order. Fails on size mismatch or out-of-range
    /// indices.
    pub(crate) fn resolve(&self, size: usize) -> Result<Vec<usize>, VariableError> {
        match self {
            Selection::All => Ok((0..size).collect()),
            Selection::Bitset(bs) => {
                if bs.size() != size {
                    return Err(BitsetError::SizeMismatch {
                        left: bs.size(),
                        right: size,
                    }
                    .into());
                }
                Ok(bs.to_vector())
            }
            Selection::Indices(indices) => {
                for &i in indices {
                    if i >= size {
                        return Err(BitsetError::IndexOutOfRange { index: i, size }.into());
                    }
                }
                Ok(indices.clone())
            }
        }
    }
}

/// A per-entity state container (tagged over the three kinds)
pub enum Variable {
    /// Label per entity, partitioned membership bitsets
    Categorical(CategoricalVariable),
    /// Dense `i64` per entity
    Integer(IntegerVariable),
    /// Dense `f64` per entity
    Double(DoubleVariable),
}

impl Variable {
    /// Population size
    pub fn size(&self) -> usize {
        match self {
            Variable::Categorical(v) => v.size(),
            Variable::Integer(v) => v.size(),
            Variable::Double(v) => v.size(),
        }
    }

    /// Apply every queued update in call order, then clear the buffer
    ///
    /// Returns the number of queued update operations applied. Invoked
    /// only by the orchestrator at the step boundary; a no-op (and
    /// idempotent) when the buffer is empty.
    pub fn update(&mut self) -> usize {
        match self {
            Variable::Categorical(v) => v.update(),
            Variable::Integer(v) => v.update(),
            Variable::Double(v) => v.update(),
        }
    }

    /// Downcast to the categorical kind
    pub fn as_categorical(&self) -> Option<&CategoricalVariable> {
        match self {
            Variable::Categorical(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable downcast to the categorical kind
    pub fn as_categorical_mut(&mut self) -> Option<&mut CategoricalVariable> {
        match self {
            Variable::Categorical(v) => Some(v),
            _ => None,
        }
    }

    /// Downcast to the integer kind
    pub fn as_integer(&self) -> Option<&IntegerVariable> {
        match self {
            Variable::Integer(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable downcast to the integer kind
    pub fn as_integer_mut(&mut self) -> Option<&mut IntegerVariable> {
        match self {
            Variable::Integer(v) => Some(v),
            _ => None,
        }
    }

    /// Downcast to the double kind
    pub fn as_double(&self) -> Option<&DoubleVariable> {
        match self {
            Variable::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable downcast to the double kind
    pub fn as_double_mut(&mut self) -> Option<&mut DoubleVariable> {
        match self {
            Variable::Double(v) => Some(v),
            _ => None,
        }
    }
}
