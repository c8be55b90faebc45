use anyhow::Result;

use crate::forward::Observables;
use crate::storage::{Selector, SimulationStorage};

/// Outcome of running an inference algorithm on a problem.
///
/// Pairs the problem with the algorithm that was run, the algorithm's own
/// result data and the storage holding every recorded simulation. The result
/// and the storage are updated in place as an algorithm makes progress.
#[derive(Debug)]
pub struct SimulatorInferenceSolution<Prob, Alg, R, St> {
    prob: Prob,
    alg: Alg,
    result: R,
    storage: St,
}

impl<Prob, Alg, R, St: SimulationStorage> SimulatorInferenceSolution<Prob, Alg, R, St> {
    pub fn new(prob: Prob, alg: Alg, result: R, storage: St) -> Self {
        Self {
            prob,
            alg,
            result,
            storage,
        }
    }

    pub fn prob(&self) -> &Prob {
        &self.prob
    }

    pub fn alg(&self) -> &Alg {
        &self.alg
    }

    pub fn result(&self) -> &R {
        &self.result
    }

    pub fn result_mut(&mut self) -> &mut R {
        &mut self.result
    }

    pub fn storage(&self) -> &St {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut St {
        &mut self.storage
    }

    /// Recorded simulator inputs.
    pub fn get_inputs(&self, selector: impl Into<Selector>) -> Result<Vec<Vec<f64>>> {
        self.storage.get_inputs(selector.into())
    }

    /// Recorded simulator outputs.
    pub fn get_outputs(&self, selector: impl Into<Selector>) -> Result<Vec<Observables>> {
        self.storage.get_outputs(selector.into())
    }

    pub fn into_parts(self) -> (Prob, Alg, R, St) {
        (self.prob, self.alg, self.result, self.storage)
    }
}
