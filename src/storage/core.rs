use std::ops::Range;

use anyhow::{bail, Result};

use crate::forward::Observables;

/// Which recorded simulations to return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
    #[default]
    All,
    Index(usize),
    Range(Range<usize>),
    /// The most recent `n` records, or all of them if fewer were stored.
    Last(usize),
}

impl Selector {
    /// The record indices this selector covers in a storage holding `len`
    /// records.
    pub fn resolve(&self, len: usize) -> Result<Range<usize>> {
        match self {
            Selector::All => Ok(0..len),
            Selector::Index(idx) => {
                if *idx >= len {
                    bail!("Index {} out of bounds for storage with {} records", idx, len);
                }
                Ok(*idx..*idx + 1)
            }
            Selector::Range(range) => {
                if range.start > range.end || range.end > len {
                    bail!(
                        "Range {:?} out of bounds for storage with {} records",
                        range,
                        len
                    );
                }
                Ok(range.clone())
            }
            Selector::Last(n) => Ok(len.saturating_sub(*n)..len),
        }
    }
}

impl From<usize> for Selector {
    fn from(idx: usize) -> Self {
        Selector::Index(idx)
    }
}

impl From<Range<usize>> for Selector {
    fn from(range: Range<usize>) -> Self {
        Selector::Range(range)
    }
}

/// Record of the simulator inputs and outputs produced while solving an
/// inference problem.
///
/// Records are appended in order and addressed by their position.
pub trait SimulationStorage: Send {
    /// Append one simulation.
    fn store(&mut self, inputs: &[f64], outputs: &Observables) -> Result<()>;

    /// Number of stored simulations.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_inputs(&self, selector: Selector) -> Result<Vec<Vec<f64>>>;

    fn get_outputs(&self, selector: Selector) -> Result<Vec<Observables>>;

    /// Flush any buffered data to the backing store.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
