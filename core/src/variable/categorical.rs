//! Categorical variable: one label per entity
//!
//! Internally one membership `Bitset` per category. The bitsets
//! partition the population at every step boundary: pairwise disjoint,
//! union covering all entities. `update()` re-establishes the partition
//! after applying the queued moves.

use tracing::trace;

use super::{Selection, VariableError};
use crate::bitset::Bitset;

/// Label-per-entity variable backed by per-category membership bitsets
///
/// # Example
/// ```
/// use popsim_core::{CategoricalVariable, Selection};
///
/// let initial: Vec<String> = vec!["S".into(); 10];
/// let mut health = CategoricalVariable::new(
///     vec!["S".into(), "I".into()],
///     &initial,
/// ).unwrap();
///
/// health.queue_update("I", Selection::Indices(vec![2, 5])).unwrap();
/// assert_eq!(health.get_size_of("I").unwrap(), 0); // not yet visible
/// health.update();
/// assert_eq!(health.get_size_of("I").unwrap(), 2);
/// ```
#[derive(Debug)]
pub struct CategoricalVariable {
    /// Ordered set of valid labels (fixed for the run)
    categories: Vec<String>,

    /// Membership bitset per category, same order as `categories`
    memberships: Vec<Bitset>,

    /// Queued moves: (category index, target entities), in call order
    pending: Vec<(usize, Bitset)>,

    /// Population size
    size: usize,
}

impl CategoricalVariable {
    /// Create a variable with the given category set and one initial
    /// label per entity
    ///
    /// Fails with `InvalidSize` for an empty population and
    /// `UnknownCategory` if any initial label is not in `categories`.
    pub fn new<S: AsRef<str>>(
        categories: Vec<String>,
        initial: &[S],
    ) -> Result<Self, VariableError> {
        let size = initial.len();
        if size == 0 {
            return Err(crate::bitset::BitsetError::InvalidSize { size }.into());
        }
        let mut memberships = Vec::with_capacity(categories.len());
        for _ in &categories {
            memberships.push(Bitset::new(size)?);
        }
        let mut var = Self {
            categories,
            memberships,
            pending: Vec::new(),
            size,
        };
        for (entity, label) in initial.iter().enumerate() {
            let cat = var.category_index(label.as_ref())?;
            // Index is within [0, size) by construction
            var.memberships[cat].set(entity)?;
        }
        var.assert_partition();
        Ok(var)
    }

    /// Population size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Ordered category labels
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    fn category_index(&self, name: &str) -> Result<usize, VariableError> {
        self.categories
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| VariableError::UnknownCategory {
                name: name.to_string(),
            })
    }

    /// Entities currently in `category`
    pub fn get_index_of(&self, category: &str) -> Result<Bitset, VariableError> {
        let cat = self.category_index(category)?;
        Ok(self.memberships[cat].clone())
    }

    /// Union of entities currently in any of `categories`
    pub fn get_index_of_many<S: AsRef<str>>(
        &self,
        categories: &[S],
    ) -> Result<Bitset, VariableError> {
        let mut out = Bitset::new_unchecked(self.size);
        for name in categories {
            let cat = self.category_index(name.as_ref())?;
            out.union_with(&self.memberships[cat])?;
        }
        Ok(out)
    }

    /// Number of entities currently in `category`
    pub fn get_size_of(&self, category: &str) -> Result<usize, VariableError> {
        let cat = self.category_index(category)?;
        Ok(self.memberships[cat].count())
    }

    /// Current label of a single entity
    pub fn get_category_of(&self, entity: usize) -> Result<&str, VariableError> {
        for (cat, bs) in self.memberships.iter().enumerate() {
            if bs.get(entity)? {
                return Ok(&self.categories[cat]);
            }
        }
        // Partition invariant: every in-range entity has exactly one label
        unreachable!("partition invariant violated: entity {} has no category", entity)
    }

    /// Queue a move of `selection` into `category`
    ///
    /// Not visible to reads until `update()`. Later queued updates
    /// override earlier ones for the same entity.
    pub fn queue_update(
        &mut self,
        category: &str,
        selection: Selection,
    ) -> Result<(), VariableError> {
        let cat = self.category_index(category)?;
        let target = match selection {
            Selection::All => Bitset::full(self.size)?,
            Selection::Bitset(bs) => {
                if bs.size() != self.size {
                    return Err(crate::bitset::BitsetError::SizeMismatch {
                        left: bs.size(),
                        right: self.size,
                    }
                    .into());
                }
                bs
            }
            Selection::Indices(indices) => Bitset::from_indices(self.size, &indices)?,
        };
        self.pending.push((cat, target));
        Ok(())
    }

    /// Number of queued update operations
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Apply queued moves in call order and clear the buffer
    ///
    /// Invoked by the orchestrator at the step boundary; idempotent on
    /// an empty buffer. Returns the number of operations applied.
    pub fn update(&mut self) -> usize {
        let applied = self.pending.len();
        if applied == 0 {
            return 0;
        }
        trace!(updates = applied, "applying categorical updates");
        for (cat, target) in self.pending.drain(..) {
            for (other, membership) in self.memberships.iter_mut().enumerate() {
                if other == cat {
                    // union_with cannot fail: target was size-checked at queue time
                    let _ = membership.union_with(&target);
                } else {
                    let _ = membership.difference_with(&target);
                }
            }
        }
        self.assert_partition();
        applied
    }

    /// Crate-internal: overwrite memberships from a checkpoint
    ///
    /// Caller (restore) has already validated category set and sizes.
    pub(crate) fn set_memberships(&mut self, memberships: Vec<Bitset>) {
        debug_assert_eq!(memberships.len(), self.memberships.len());
        self.memberships = memberships;
        self.pending.clear();
        self.assert_partition();
    }

    /// Crate-internal: current memberships (for checkpoint capture)
    pub(crate) fn memberships(&self) -> &[Bitset] {
        &self.memberships
    }

    fn assert_partition(&self) {
        #[cfg(debug_assertions)]
        {
            let mut seen = Bitset::new_unchecked(self.size);
            let mut total = 0;
            for bs in &self.memberships {
                total += bs.count();
                let _ = seen.union_with(bs);
            }
            debug_assert_eq!(total, self.size, "category bitsets overlap or miss entities");
            debug_assert_eq!(seen.count(), self.size, "category bitsets do not cover population");
        }
    }
}
