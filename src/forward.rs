//! Interfaces to the forward simulator.
//!
//! A [`ForwardProblem`] is the parametric model specification. A
//! [`ForwardSolver`] turns a problem into a [`ForwardIntegrator`], which runs
//! the simulation to completion and returns the named observables.

use std::convert::Infallible;
use std::fmt::Debug;

use indexmap::IndexMap;

use crate::error::{InferenceError, Result};
use crate::value::Value;

/// Simulator outputs keyed by observable name, in declaration order.
pub type Observables = IndexMap<String, Vec<f64>>;

/// A parametric forward model.
///
/// Implementations are plain values: [`ForwardProblem::remake`] returns a copy
/// with new parameters and leaves `self` unchanged.
pub trait ForwardProblem: Clone + Debug + Send + Sync {
    /// The simulation parameters currently baked into the problem.
    fn parameters(&self) -> &[f64];

    /// A copy of this problem with different simulation parameters.
    fn remake(&self, parameters: &[f64]) -> Result<Self>;

    /// Names of the observables a solve produces.
    fn observable_names(&self) -> Vec<String>;

    /// Lookup for attributes that are not fields of the inference problem.
    ///
    /// Implementations that expose more attributes should fall back to
    /// [`default_attribute`] for the names they do not handle.
    fn attribute(&self, name: &str) -> Option<Value> {
        default_attribute(self, name)
    }
}

/// Attributes every forward problem answers: `observables` and `parameters`.
pub fn default_attribute<P: ForwardProblem>(problem: &P, name: &str) -> Option<Value> {
    match name {
        "observables" => Some(Value::Strings(problem.observable_names())),
        "parameters" => Some(Value::F64(problem.parameters().to_vec())),
        _ => None,
    }
}

/// A running simulation, created by [`ForwardSolver::init`].
pub trait ForwardIntegrator<P: ForwardProblem> {
    /// Run to completion. Solver failures should be wrapped with
    /// [`InferenceError::forward_solve`] so that their recoverability is kept.
    fn solve(self) -> Result<ForwardSolution<P>>;
}

/// Solver configuration for a forward problem.
pub trait ForwardSolver<P: ForwardProblem>: Clone + Debug + Send + Sync {
    type Integrator: ForwardIntegrator<P>;

    fn init(&self, problem: P) -> Result<Self::Integrator>;
}

/// The outcome of a forward solve: the problem that was solved and its outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardSolution<P> {
    prob: P,
    observables: Observables,
}

impl<P: ForwardProblem> ForwardSolution<P> {
    pub fn new(prob: P, observables: Observables) -> Self {
        Self { prob, observables }
    }

    pub fn prob(&self) -> &P {
        &self.prob
    }

    pub fn observables(&self) -> &Observables {
        &self.observables
    }

    pub fn observable(&self, name: &str) -> Option<&[f64]> {
        self.observables.get(name).map(|values| values.as_slice())
    }

    pub fn into_parts(self) -> (P, Observables) {
        (self.prob, self.observables)
    }
}

/// Solver placeholder for problems without a configured forward solver.
///
/// Any attempt to solve fails with [`InferenceError::NoForwardSolver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoSolver;

impl<P: ForwardProblem> ForwardIntegrator<P> for Infallible {
    fn solve(self) -> Result<ForwardSolution<P>> {
        match self {}
    }
}

impl<P: ForwardProblem> ForwardSolver<P> for NoSolver {
    type Integrator = Infallible;

    fn init(&self, _problem: P) -> Result<Self::Integrator> {
        Err(InferenceError::NoForwardSolver)
    }
}
