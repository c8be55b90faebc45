#![allow(dead_code)]

use siminfer::{
    ForwardIntegrator, ForwardProblem, ForwardSolution, ForwardSolver, InferenceError, LogpError,
    Observables, Result,
};
use thiserror::Error;

/// Simulator whose observable `obs` is its first parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub params: Vec<f64>,
}

impl ForwardProblem for Identity {
    fn parameters(&self) -> &[f64] {
        &self.params
    }

    fn remake(&self, parameters: &[f64]) -> Result<Self> {
        Ok(Self {
            params: parameters.to_vec(),
        })
    }

    fn observable_names(&self) -> Vec<String> {
        vec!["obs".to_string()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentitySolver;

pub struct IdentityRun(Identity);

impl ForwardIntegrator<Identity> for IdentityRun {
    fn solve(self) -> Result<ForwardSolution<Identity>> {
        let obs = self.0.params[0];
        let observables = Observables::from([("obs".to_string(), vec![obs])]);
        Ok(ForwardSolution::new(self.0, observables))
    }
}

impl ForwardSolver<Identity> for IdentitySolver {
    type Integrator = IdentityRun;

    fn init(&self, problem: Identity) -> Result<Self::Integrator> {
        Ok(IdentityRun(problem))
    }
}

/// Exponential decay `dx/dt = -k x`, observed at `times`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decay {
    pub rate: [f64; 1],
    pub x0: f64,
    pub times: Vec<f64>,
}

impl Decay {
    pub fn new(rate: f64, x0: f64, times: Vec<f64>) -> Self {
        Self {
            rate: [rate],
            x0,
            times,
        }
    }
}

impl ForwardProblem for Decay {
    fn parameters(&self) -> &[f64] {
        &self.rate
    }

    fn remake(&self, parameters: &[f64]) -> Result<Self> {
        match parameters {
            [rate] => Ok(Self::new(*rate, self.x0, self.times.clone())),
            _ => Err(InferenceError::ShapeMismatch {
                what: "decay rate".to_string(),
                expected: 1,
                found: parameters.len(),
            }),
        }
    }

    fn observable_names(&self) -> Vec<String> {
        vec!["x".to_string()]
    }

    fn attribute(&self, name: &str) -> Option<siminfer::Value> {
        match name {
            "times" => Some(self.times.clone().into()),
            _ => siminfer::default_attribute(self, name),
        }
    }
}

#[derive(Error, Debug)]
pub enum DecayError {
    #[error("step size {0} is not positive")]
    InvalidStep(f64),
    #[error("explicit Euler is unstable for rate {rate} and step {dt}")]
    Unstable { rate: f64, dt: f64 },
}

impl LogpError for DecayError {
    fn is_recoverable(&self) -> bool {
        matches!(self, DecayError::Unstable { .. })
    }
}

/// Explicit Euler with a fixed step.
#[derive(Debug, Clone, PartialEq)]
pub struct Euler {
    pub dt: f64,
}

pub struct EulerRun {
    problem: Decay,
    dt: f64,
}

impl ForwardSolver<Decay> for Euler {
    type Integrator = EulerRun;

    fn init(&self, problem: Decay) -> Result<Self::Integrator> {
        if self.dt <= 0. {
            return Err(InferenceError::forward_solve(DecayError::InvalidStep(self.dt)));
        }
        Ok(EulerRun {
            problem,
            dt: self.dt,
        })
    }
}

impl ForwardIntegrator<Decay> for EulerRun {
    fn solve(self) -> Result<ForwardSolution<Decay>> {
        let rate = self.problem.rate[0];
        if rate * self.dt >= 1. {
            return Err(InferenceError::forward_solve(DecayError::Unstable {
                rate,
                dt: self.dt,
            }));
        }
        let mut t = 0f64;
        let mut x = self.problem.x0;
        let mut trajectory = Vec::with_capacity(self.problem.times.len());
        for &target in &self.problem.times {
            while t + self.dt <= target + 1e-12 {
                x -= self.dt * rate * x;
                t += self.dt;
            }
            trajectory.push(x);
        }
        let observables = Observables::from([("x".to_string(), trajectory)]);
        Ok(ForwardSolution::new(self.problem, observables))
    }
}

pub fn decay_times() -> Vec<f64> {
    vec![0.25, 0.5, 1.0, 1.5, 2.0, 3.0]
}

/// Trajectory produced by [`Euler`] at the given rate, used as data.
pub fn decay_data(rate: f64, dt: f64) -> Vec<f64> {
    let problem = Decay::new(rate, 1.0, decay_times());
    let solution = Euler { dt }
        .init(problem)
        .and_then(|run| run.solve())
        .unwrap();
    solution.observable("x").unwrap().to_vec()
}
