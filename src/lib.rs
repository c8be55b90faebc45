//! Log-joint densities for simulation-based Bayesian inference.
//!
//! A [`SimulatorInferenceProblem`] bundles a forward simulator, its solver,
//! a [`JointPrior`] and named [`Likelihood`]s. Samplers evaluate it through
//! [`LogDensityProblem`], which maps an unconstrained point to the model's
//! parameter space, runs the simulator and sums the likelihood terms.

mod distributions;
mod ensemble;
mod error;
mod forward;
mod joint_prior;
mod likelihood;
mod logjoint;
mod math;
mod params;
mod problem;
mod solution;
mod storage;
mod transform;
mod value;

pub use distributions::{HalfNormal, LogNormal, Normal, Prior, ProductPrior, Uniform};
pub use ensemble::{ImportanceSamplingSettings, ImportanceWeights, PriorImportanceSampling};
pub use error::{InferenceError, LogpError, Result};
pub use forward::{
    default_attribute, ForwardIntegrator, ForwardProblem, ForwardSolution, ForwardSolver,
    NoSolver, Observables,
};
pub use joint_prior::{JointPrior, MODEL};
pub use likelihood::{GaussianLikelihood, Likelihood, Likelihoods, NoiseScale};
pub use logjoint::{FiniteDiffGradient, LogDensityProblem, LogJoint, LogJointOptions};
pub use params::{ComponentVector, ParamLayout};
pub use problem::{Property, RemakeOptions, SimulatorInferenceProblem};
pub use solution::SimulatorInferenceSolution;
pub use storage::{
    CsvSimulationStorage, CsvStorageConfig, Selector, SimulationArrayStorage, SimulationStorage,
};
pub use transform::{
    bijector_for_bounds, Bijector, IdentityBijector, LogitBijector, LowerBoundedBijector,
    ParameterTransform, UpperBoundedBijector,
};
pub use value::{Metadata, Value};
