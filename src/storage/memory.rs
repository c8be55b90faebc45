use anyhow::{Context, Result};

use crate::forward::Observables;
use crate::storage::{Selector, SimulationStorage};

/// Keeps every recorded simulation in memory.
#[derive(Debug, Clone, Default)]
pub struct SimulationArrayStorage {
    inputs: Vec<Vec<f64>>,
    outputs: Vec<Observables>,
}

impl SimulationArrayStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inputs: Vec::with_capacity(capacity),
            outputs: Vec::with_capacity(capacity),
        }
    }
}

impl SimulationStorage for SimulationArrayStorage {
    fn store(&mut self, inputs: &[f64], outputs: &Observables) -> Result<()> {
        self.inputs.push(inputs.to_vec());
        self.outputs.push(outputs.clone());
        Ok(())
    }

    fn len(&self) -> usize {
        self.inputs.len()
    }

    fn get_inputs(&self, selector: Selector) -> Result<Vec<Vec<f64>>> {
        let range = selector
            .resolve(self.len())
            .context("Failed to select inputs")?;
        Ok(self.inputs[range].to_vec())
    }

    fn get_outputs(&self, selector: Selector) -> Result<Vec<Observables>> {
        let range = selector
            .resolve(self.len())
            .context("Failed to select outputs")?;
        Ok(self.outputs[range].to_vec())
    }
}
