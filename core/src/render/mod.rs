//! Per-step scalar output sink
//!
//! The engine writes `(name, step, value)` triples once per step;
//! storage and export beyond that belong to the host layer. The
//! in-memory implementation here is enough for tests and demos.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Sink for per-step named scalar values
pub trait Render {
    /// Record `value` under `name` for `step`
    fn write(&mut self, name: &str, step: usize, value: f64);
}

/// Shared handle so the caller can keep reading a sink the simulation
/// owns (single-threaded step protocol, no locking needed)
impl<R: Render> Render for Rc<RefCell<R>> {
    fn write(&mut self, name: &str, step: usize, value: f64) {
        self.borrow_mut().write(name, step, value);
    }
}

/// In-memory render sink keeping one series per name
///
/// # Example
/// ```
/// use popsim_core::{MemoryRender, Render};
///
/// let mut sink = MemoryRender::new();
/// sink.write("infected", 0, 12.0);
/// sink.write("infected", 1, 15.0);
/// assert_eq!(sink.series("infected"), Some(&[(0, 12.0), (1, 15.0)][..]));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryRender {
    series: BTreeMap<String, Vec<(usize, f64)>>,
}

impl MemoryRender {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(step, value)` pairs for `name`, in write order
    pub fn series(&self, name: &str) -> Option<&[(usize, f64)]> {
        self.series.get(name).map(Vec::as_slice)
    }

    /// Names with at least one recorded value
    pub fn names(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }
}

impl Render for MemoryRender {
    fn write(&mut self, name: &str, step: usize, value: f64) {
        self.series
            .entry(name.to_string())
            .or_default()
            .push((step, value));
    }
}
