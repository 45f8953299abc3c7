//! Integer and double variables: dense value per entity
//!
//! No partition invariant here; just a `Vec` of values plus the shared
//! deferred-update buffer. Range queries return bitsets so numeric state
//! composes with categorical membership and sampling.

use tracing::trace;

use super::{Selection, VariableError};
use crate::bitset::{Bitset, BitsetError};

/// Value types storable in a [`NumericVariable`]
pub trait NumericValue: Copy + PartialOrd {}

impl NumericValue for i64 {}
impl NumericValue for f64 {}

/// Queued numeric update: per-target or broadcast values
struct PendingUpdate<T> {
    /// Resolved target indices, in application order
    targets: Vec<usize>,
    /// One value per target, or a single broadcast value
    values: Vec<T>,
}

/// Dense per-entity numeric state with deferred updates
///
/// # Example
/// ```
/// use popsim_core::{IntegerVariable, Selection};
///
/// let mut age = IntegerVariable::new(vec![10, 20, 30]).unwrap();
/// age.queue_update(&[99], Selection::Indices(vec![1])).unwrap();
/// assert_eq!(age.value_at(1).unwrap(), 20); // not yet visible
/// age.update();
/// assert_eq!(age.value_at(1).unwrap(), 99);
/// ```
pub struct NumericVariable<T: NumericValue> {
    values: Vec<T>,
    pending: Vec<PendingUpdate<T>>,
}

/// `i64` per entity
pub type IntegerVariable = NumericVariable<i64>;

/// `f64` per entity
pub type DoubleVariable = NumericVariable<f64>;

impl<T: NumericValue> NumericVariable<T> {
    /// Create a variable with one initial value per entity
    pub fn new(values: Vec<T>) -> Result<Self, VariableError> {
        if values.is_empty() {
            return Err(BitsetError::InvalidSize { size: 0 }.into());
        }
        Ok(Self {
            values,
            pending: Vec::new(),
        })
    }

    /// Population size
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Current values for all entities
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Current value of a single entity
    pub fn value_at(&self, entity: usize) -> Result<T, VariableError> {
        self.values
            .get(entity)
            .copied()
            .ok_or_else(|| {
                BitsetError::IndexOutOfRange {
                    index: entity,
                    size: self.values.len(),
                }
                .into()
            })
    }

    /// Current values for an explicit index list, in the given order
    pub fn values_at(&self, entities: &[usize]) -> Result<Vec<T>, VariableError> {
        entities.iter().map(|&i| self.value_at(i)).collect()
    }

    /// Entities whose value lies in `[lo, hi]` (inclusive)
    ///
    /// An empty bitset when `lo > hi`.
    pub fn get_index_of_range(&self, lo: T, hi: T) -> Bitset {
        let mut out = Bitset::new_unchecked(self.values.len());
        for (i, v) in self.values.iter().enumerate() {
            if *v >= lo && *v <= hi {
                // In range by construction
                let _ = out.set(i);
            }
        }
        out
    }

    /// Number of entities whose value lies in `[lo, hi]`
    pub fn get_size_of_range(&self, lo: T, hi: T) -> usize {
        self.values.iter().filter(|v| **v >= lo && **v <= hi).count()
    }

    /// Queue new values for `selection`
    ///
    /// `values` is either a single broadcast value or one value per
    /// target (bitset targets pair with values in ascending index
    /// order). Fails with `SizeMismatch` otherwise; reads are unaffected
    /// until `update()`.
    pub fn queue_update(&mut self, values: &[T], selection: Selection) -> Result<(), VariableError> {
        let targets = selection.resolve(self.values.len())?;
        if values.len() != 1 && values.len() != targets.len() {
            return Err(VariableError::SizeMismatch {
                values: values.len(),
                targets: targets.len(),
            });
        }
        self.pending.push(PendingUpdate {
            targets,
            values: values.to_vec(),
        });
        Ok(())
    }

    /// Number of queued update operations
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Apply queued updates in call order and clear the buffer
    ///
    /// Invoked by the orchestrator at the step boundary; idempotent on
    /// an empty buffer. Returns the number of operations applied.
    pub fn update(&mut self) -> usize {
        let applied = self.pending.len();
        if applied == 0 {
            return 0;
        }
        trace!(updates = applied, "applying numeric updates");
        for op in self.pending.drain(..) {
            if op.values.len() == 1 {
                for &i in &op.targets {
                    self.values[i] = op.values[0];
                }
            } else {
                for (&i, &v) in op.targets.iter().zip(&op.values) {
                    self.values[i] = v;
                }
            }
        }
        applied
    }

    /// Crate-internal: overwrite values from a checkpoint
    pub(crate) fn set_values(&mut self, values: Vec<T>) {
        debug_assert_eq!(values.len(), self.values.len());
        self.values = values;
        self.pending.clear();
    }
}
