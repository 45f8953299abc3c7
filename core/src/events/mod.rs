//! Scheduled events
//!
//! An event is a named firing point: listeners attach before the run
//! starts (listener code lives in the orchestrator, outside the
//! serializable state), and a schedule maps future step numbers to
//! pending firings. Targeted events additionally carry the entity
//! subset to deliver.
//!
//! # Firing semantics
//!
//! - An event fires at most once per scheduled step; duplicate schedules
//!   at the same step merge (targeted: subset union)
//! - Schedules must land strictly in the future (`PastSchedule`
//!   otherwise), so a listener rescheduling its own event can never
//!   recurse within the current step

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::bitset::{Bitset, BitsetError};

/// Errors that can occur during event scheduling
#[derive(Debug, Error, PartialEq)]
pub enum EventError {
    #[error("Cannot schedule step {requested} at step {current}: target must be strictly in the future")]
    PastSchedule { requested: usize, current: usize },

    #[error("Event is not targeted; use schedule()")]
    NotTargeted,

    #[error("Targeted event requires a subset; use schedule_subset()")]
    MissingTarget,

    #[error(transparent)]
    Bitset(#[from] BitsetError),
}

/// Whether an event delivers to the whole population or a subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Fires without an entity subset
    Plain,
    /// Fires with a target subset over a fixed population size
    Targeted { population_size: usize },
}

/// A scheduled firing point with an optional per-firing target subset
///
/// Scheduling is done through the simulation (which supplies the
/// current step); firing is driven by the orchestrator's event phase.
pub struct Event {
    kind: EventKind,
    /// Pending firings: step -> target subset (None for plain events)
    schedule: BTreeMap<usize, Option<Bitset>>,
}

impl Event {
    /// Create a plain (untargeted) event with an empty schedule
    pub fn new() -> Self {
        Self {
            kind: EventKind::Plain,
            schedule: BTreeMap::new(),
        }
    }

    /// Create a targeted event over a population of `population_size`
    pub fn targeted(population_size: usize) -> Self {
        Self {
            kind: EventKind::Targeted { population_size },
            schedule: BTreeMap::new(),
        }
    }

    /// Event kind (plain or targeted)
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// True when a firing is pending at exactly `step`
    pub fn is_scheduled_at(&self, step: usize) -> bool {
        self.schedule.contains_key(&step)
    }

    /// Pending firing steps in ascending order
    pub fn scheduled_steps(&self) -> Vec<usize> {
        self.schedule.keys().copied().collect()
    }

    fn check_future(step: usize, now: usize) -> Result<(), EventError> {
        if step <= now {
            return Err(EventError::PastSchedule {
                requested: step,
                current: now,
            });
        }
        Ok(())
    }

    /// Enqueue a firing of a plain event at absolute `step`
    pub(crate) fn schedule_at(&mut self, step: usize, now: usize) -> Result<(), EventError> {
        if matches!(self.kind, EventKind::Targeted { .. }) {
            return Err(EventError::MissingTarget);
        }
        Self::check_future(step, now)?;
        self.schedule.entry(step).or_insert(None);
        Ok(())
    }

    /// Enqueue a targeted firing at absolute `step`, merging subsets
    /// scheduled for the same step
    pub(crate) fn schedule_subset_at(
        &mut self,
        step: usize,
        subset: &Bitset,
        now: usize,
    ) -> Result<(), EventError> {
        let population_size = match self.kind {
            EventKind::Targeted { population_size } => population_size,
            EventKind::Plain => return Err(EventError::NotTargeted),
        };
        if subset.size() != population_size {
            return Err(BitsetError::SizeMismatch {
                left: subset.size(),
                right: population_size,
            }
            .into());
        }
        Self::check_future(step, now)?;
        let slot = self.schedule.entry(step).or_insert(None);
        match slot {
            Some(existing) => existing.union_with(subset)?,
            None => *slot = Some(subset.clone()),
        }
        Ok(())
    }

    /// Drop every pending firing
    pub fn clear_schedule(&mut self) {
        self.schedule.clear();
    }

    /// Remove `subset` entities from every pending target, dropping
    /// firings whose target becomes empty
    pub fn clear_schedule_for(&mut self, subset: &Bitset) -> Result<(), EventError> {
        if let EventKind::Targeted { population_size } = self.kind {
            if subset.size() != population_size {
                return Err(BitsetError::SizeMismatch {
                    left: subset.size(),
                    right: population_size,
                }
                .into());
            }
        } else {
            return Err(EventError::NotTargeted);
        }
        for target in self.schedule.values_mut().flatten() {
            target.difference_with(subset)?;
        }
        self.schedule
            .retain(|_, target| target.as_ref().map_or(true, |t| !t.is_empty()));
        Ok(())
    }

    /// Remove and return the firing pending at `step`, if any
    ///
    /// `Some(None)` is a due plain firing; `Some(Some(bitset))` carries
    /// the delivered subset.
    pub(crate) fn take_due(&mut self, step: usize) -> Option<Option<Bitset>> {
        self.schedule.remove(&step)
    }

    /// Crate-internal: full pending schedule (for checkpoint capture)
    pub(crate) fn pending(&self) -> &BTreeMap<usize, Option<Bitset>> {
        &self.schedule
    }

    /// Crate-internal: overwrite the schedule from a checkpoint
    pub(crate) fn set_schedule(&mut self, schedule: BTreeMap<usize, Option<Bitset>>) {
        self.schedule = schedule;
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}
