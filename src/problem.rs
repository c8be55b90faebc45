use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use rand::RngCore;

use crate::distributions::Prior;
use crate::error::{check_len, InferenceError, Result};
use crate::forward::{ForwardProblem, ForwardSolver, NoSolver};
use crate::joint_prior::JointPrior;
use crate::likelihood::{Likelihood, Likelihoods};
use crate::params::ComponentVector;
use crate::transform::ParameterTransform;
use crate::value::{Metadata, Value};

/// A fully specified simulation-based inference task.
///
/// The problem is a value: [`SimulatorInferenceProblem::remake`] returns a new
/// problem and leaves the original untouched, and density evaluation only
/// reads from it.
#[derive(Debug, Clone)]
pub struct SimulatorInferenceProblem<P, S = NoSolver> {
    u0: ComponentVector,
    forward_prob: P,
    forward_solver: Option<S>,
    prior: JointPrior,
    likelihoods: Likelihoods,
    metadata: Metadata,
}

/// Overrides for [`SimulatorInferenceProblem::remake`]. `None` keeps the
/// current value.
#[derive(Debug, Clone)]
pub struct RemakeOptions<P, S = NoSolver> {
    pub u0: Option<ComponentVector>,
    pub forward_prob: Option<P>,
    pub forward_solver: Option<Option<S>>,
    pub prior: Option<JointPrior>,
    pub likelihoods: Option<Likelihoods>,
    pub metadata: Option<Metadata>,
}

impl<P, S> Default for RemakeOptions<P, S> {
    fn default() -> Self {
        Self {
            u0: None,
            forward_prob: None,
            forward_solver: None,
            prior: None,
            likelihoods: None,
            metadata: None,
        }
    }
}

impl<P, S> RemakeOptions<P, S> {
    pub fn with_u0(mut self, u0: ComponentVector) -> Self {
        self.u0 = Some(u0);
        self
    }

    pub fn with_forward_prob(mut self, forward_prob: P) -> Self {
        self.forward_prob = Some(forward_prob);
        self
    }

    pub fn with_forward_solver(mut self, forward_solver: Option<S>) -> Self {
        self.forward_solver = Some(forward_solver);
        self
    }

    pub fn with_prior(mut self, prior: JointPrior) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn with_likelihoods(mut self, likelihoods: Likelihoods) -> Self {
        self.likelihoods = Some(likelihoods);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Result of a named property lookup.
#[derive(Debug)]
pub enum Property<'a, P, S> {
    U0(&'a ComponentVector),
    ForwardProb(&'a P),
    ForwardSolver(Option<&'a S>),
    Prior(&'a JointPrior),
    Likelihoods(&'a Likelihoods),
    Metadata(&'a Metadata),
    /// Answered by the forward problem.
    Forwarded(Value),
}

impl<P, S> SimulatorInferenceProblem<P, S> {
    /// Properties answered by the inference problem itself. Everything else
    /// is looked up on the forward problem.
    pub const FIELDS: [&'static str; 6] = [
        "u0",
        "forward_prob",
        "forward_solver",
        "prior",
        "likelihoods",
        "metadata",
    ];
}

impl<P, S> SimulatorInferenceProblem<P, S>
where
    P: ForwardProblem,
    S: ForwardSolver<P>,
{
    /// Build a problem from a forward problem, an optional solver, the prior
    /// over the forward problem's parameters and the likelihoods.
    ///
    /// The joint prior gets one block per likelihood and `u0` is set to the
    /// zero vector of its layout.
    pub fn new(
        forward_prob: P,
        forward_solver: Option<S>,
        model_prior: Arc<dyn Prior>,
        likelihoods: impl IntoIterator<Item = Arc<dyn Likelihood>>,
    ) -> Result<Self> {
        check_len(
            "model prior",
            forward_prob.parameters().len(),
            model_prior.dim(),
        )?;
        let likelihoods = Likelihoods::new(likelihoods)?;
        let prior = JointPrior::new(model_prior, &likelihoods)?;
        let u0 = prior.zeros();
        log::debug!(
            "new inference problem with {} parameters and likelihoods [{}]",
            u0.len(),
            likelihoods.names().join(", ")
        );
        Ok(Self {
            u0,
            forward_prob,
            forward_solver,
            prior,
            likelihoods,
            metadata: Metadata::new(),
        })
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// A copy with the given fields replaced.
    ///
    /// Overriding `prior` or `likelihoods` is not checked against `u0`; keeping
    /// them consistent is up to the caller.
    pub fn remake(&self, options: RemakeOptions<P, S>) -> Self {
        log::debug!("remaking inference problem");
        Self {
            u0: options.u0.unwrap_or_else(|| self.u0.clone()),
            forward_prob: options
                .forward_prob
                .unwrap_or_else(|| self.forward_prob.clone()),
            forward_solver: options
                .forward_solver
                .unwrap_or_else(|| self.forward_solver.clone()),
            prior: options.prior.unwrap_or_else(|| self.prior.clone()),
            likelihoods: options
                .likelihoods
                .unwrap_or_else(|| self.likelihoods.clone()),
            metadata: options.metadata.unwrap_or_else(|| self.metadata.clone()),
        }
    }

    pub fn u0(&self) -> &ComponentVector {
        &self.u0
    }

    pub fn forward_prob(&self) -> &P {
        &self.forward_prob
    }

    pub fn forward_solver(&self) -> Option<&S> {
        self.forward_solver.as_ref()
    }

    pub fn prior(&self) -> &JointPrior {
        &self.prior
    }

    pub fn likelihoods(&self) -> &Likelihoods {
        &self.likelihoods
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of parameters a sampler sees.
    pub fn dim(&self) -> usize {
        self.u0.len()
    }

    /// Look up a property by name.
    ///
    /// Names in [`Self::FIELDS`] are answered directly, any other name is
    /// forwarded to [`ForwardProblem::attribute`]. Unknown names fail with
    /// [`InferenceError::UnknownAttribute`].
    pub fn property(&self, name: &str) -> Result<Property<'_, P, S>> {
        match name {
            "u0" => Ok(Property::U0(&self.u0)),
            "forward_prob" => Ok(Property::ForwardProb(&self.forward_prob)),
            "forward_solver" => Ok(Property::ForwardSolver(self.forward_solver.as_ref())),
            "prior" => Ok(Property::Prior(&self.prior)),
            "likelihoods" => Ok(Property::Likelihoods(&self.likelihoods)),
            "metadata" => Ok(Property::Metadata(&self.metadata)),
            _ => self
                .forward_prob
                .attribute(name)
                .map(Property::Forwarded)
                .ok_or_else(|| InferenceError::UnknownAttribute(name.to_string())),
        }
    }

    /// Bijector from the constrained parameter space to the sampler's space.
    pub fn bijector(&self) -> ParameterTransform {
        self.prior.bijector()
    }

    /// A draw from the joint prior, in constrained space.
    pub fn sample_prior(&self, rng: &mut dyn RngCore) -> ComponentVector {
        self.prior.sample(rng)
    }

    /// Map a constrained parameter vector to the sampler's space.
    pub fn to_unconstrained(&self, theta: &ComponentVector) -> Result<ComponentVector> {
        let y = self.bijector().forward(theta.as_slice())?;
        ComponentVector::from_vec(self.u0.layout().clone(), y)
    }

    /// Map a sampler-space vector to constrained parameters.
    pub fn to_constrained(&self, u: &[f64]) -> Result<ComponentVector> {
        let theta = self.bijector().inverse(u)?;
        ComponentVector::from_vec(self.u0.layout().clone(), theta)
    }
}

impl<P: PartialEq, S: PartialEq> PartialEq for SimulatorInferenceProblem<P, S> {
    fn eq(&self, other: &Self) -> bool {
        self.u0 == other.u0
            && self.forward_prob == other.forward_prob
            && self.forward_solver == other.forward_solver
            && self.prior == other.prior
            && self.likelihoods == other.likelihoods
            && self.metadata == other.metadata
    }
}

impl<P, S> fmt::Display for SimulatorInferenceProblem<P, S>
where
    P: ForwardProblem,
    S: ForwardSolver<P>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SimulatorInferenceProblem")?;
        writeln!(f, "  parameters: {}", self.u0.len())?;
        writeln!(f, "  likelihoods: {}", self.likelihoods.names().join(", "))?;
        writeln!(
            f,
            "  observables: {}",
            self.forward_prob.observable_names().iter().join(", ")
        )?;
        writeln!(f, "  forward problem: {}", std::any::type_name::<P>())?;
        match &self.forward_solver {
            Some(solver) => writeln!(f, "  forward solver: {solver:?}")?,
            None => writeln!(f, "  forward solver: none")?,
        }
        writeln!(f, "  prior: {}", self.prior)?;
        write!(f, "  metadata: {{")?;
        for (i, (key, value)) in self.metadata.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        write!(f, "}}")
    }
}
