//! Log-joint density of an inference problem.
//!
//! A candidate vector flows through three stages that can be toggled
//! independently:
//!
//! 1. transform: sampler space to constrained space, adding the log-Jacobian
//!    of the inverse bijector to the prior term;
//! 2. prior: the joint prior density at the constrained point;
//! 3. likelihood: either a fresh forward solve, or the simulator outputs the
//!    likelihoods are already bound to.
//!
//! The terms are kept apart in [`LogJoint`] and only summed on request.

use rayon::prelude::*;

use crate::error::{check_len, InferenceError, LogpError, Result};
use crate::forward::{ForwardIntegrator, ForwardProblem, ForwardSolution, ForwardSolver};
use crate::joint_prior::MODEL;
use crate::math::distance_within;
use crate::params::ComponentVector;
use crate::problem::{RemakeOptions, SimulatorInferenceProblem};

/// Log-likelihood and log-prior at one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogJoint {
    pub loglik: f64,
    pub logprior: f64,
}

impl LogJoint {
    pub fn sum(&self) -> f64 {
        self.loglik + self.logprior
    }
}

/// Settings for [`SimulatorInferenceProblem::logjoint`].
#[derive(Debug, Clone, Copy)]
pub struct LogJointOptions {
    /// Interpret the candidate as a point in unconstrained space.
    pub transform: bool,
    /// Run the forward solver. Otherwise the likelihoods use the outputs
    /// they are bound to.
    pub forward_solve: bool,
    /// Relative tolerance when comparing the model block with the parameters
    /// of the stored forward problem.
    pub param_rtol: f64,
    /// Absolute tolerance for the same comparison.
    pub param_atol: f64,
}

impl Default for LogJointOptions {
    fn default() -> Self {
        Self {
            transform: false,
            forward_solve: true,
            param_rtol: f64::EPSILON.sqrt(),
            param_atol: 0.,
        }
    }
}

impl LogJointOptions {
    pub fn with_transform(mut self, transform: bool) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_forward_solve(mut self, forward_solve: bool) -> Self {
        self.forward_solve = forward_solve;
        self
    }

    pub fn with_tolerance(mut self, rtol: f64, atol: f64) -> Self {
        self.param_rtol = rtol;
        self.param_atol = atol;
        self
    }
}

impl<P, S> SimulatorInferenceProblem<P, S>
where
    P: ForwardProblem,
    S: ForwardSolver<P>,
{
    /// Log-likelihood and log-prior at `u`.
    ///
    /// `u` must have the length of [`Self::u0`]. With `transform` set it is a
    /// point in unconstrained space, otherwise it is used as is.
    pub fn logjoint(&self, u: &[f64], options: LogJointOptions) -> Result<LogJoint> {
        let u = ComponentVector::from_slice(self.u0().layout().clone(), u)?;

        let mut logprior = 0f64;
        let theta = if options.transform {
            let (theta, logabsdet) = self.bijector().inverse_with_logabsdet(u.as_slice())?;
            logprior += logabsdet;
            ComponentVector::from_vec(u.layout().clone(), theta)?
        } else {
            u
        };

        logprior += self.prior().logpdf(&theta)?;

        let loglik = if options.forward_solve {
            let zeta = self.prior().forward_map(&theta)?;
            let solution = self.forward_solve(zeta.field(MODEL)?)?;
            self.likelihoods()
                .iter()
                .map(|(name, lik)| {
                    let predicted = solution
                        .observable(name)
                        .ok_or_else(|| InferenceError::MissingObservable(name.to_string()))?;
                    lik.loglikelihood(predicted, zeta.field(name)?)
                })
                .sum::<Result<f64>>()?
        } else {
            self.check_model_parameters(theta.field(MODEL)?, &options)?;
            self.likelihoods()
                .iter()
                .map(|(name, lik)| lik.loglikelihood_bound(theta.field(name)?))
                .sum::<Result<f64>>()?
        };

        log::trace!("logjoint: loglik = {loglik}, logprior = {logprior}");
        Ok(LogJoint { loglik, logprior })
    }

    /// Log-joint against an existing forward solution.
    ///
    /// Every likelihood is rebound to the solution's observable of the same
    /// name and the solution's problem replaces the stored forward problem.
    /// The simulator is not run again, so the model block of `u` (after the
    /// transform, if requested) has to match the solution's parameters.
    pub fn logjoint_with_solution(
        &self,
        solution: &ForwardSolution<P>,
        u: &[f64],
        options: LogJointOptions,
    ) -> Result<LogJoint> {
        let likelihoods = self.likelihoods().rebind_all(solution.observables())?;
        let problem = self.remake(
            RemakeOptions::default()
                .with_forward_prob(solution.prob().clone())
                .with_likelihoods(likelihoods),
        );
        problem.logjoint(u, options.with_forward_solve(false))
    }

    /// Log density in unconstrained space with a fresh forward solve.
    pub fn logdensity(&self, x: &[f64]) -> Result<f64> {
        let options = LogJointOptions::default()
            .with_transform(true)
            .with_forward_solve(true);
        Ok(self.logjoint(x, options)?.sum())
    }

    /// Log density in constrained space with a fresh forward solve.
    pub fn logprob(&self, u: &[f64]) -> Result<f64> {
        let options = LogJointOptions::default()
            .with_transform(false)
            .with_forward_solve(true);
        Ok(self.logjoint(u, options)?.sum())
    }

    /// Evaluate [`Self::logdensity`] at many points in parallel.
    ///
    /// Every evaluation creates its own integrator, so the points are
    /// independent.
    pub fn logdensity_batch(&self, xs: &[Vec<f64>]) -> Vec<Result<f64>> {
        xs.par_iter().map(|x| self.logdensity(x)).collect()
    }

    /// Solve the forward problem at the given simulation parameters.
    pub fn forward_solve(&self, parameters: &[f64]) -> Result<ForwardSolution<P>> {
        let solver = self
            .forward_solver()
            .ok_or(InferenceError::NoForwardSolver)?;
        let prob = self.forward_prob().remake(parameters)?;
        solver.init(prob)?.solve()
    }

    fn check_model_parameters(&self, model: &[f64], options: &LogJointOptions) -> Result<()> {
        let stored = self.forward_prob().parameters();
        check_len("model parameters", stored.len(), model.len())?;
        let (distance, tolerance, close) =
            distance_within(model, stored, options.param_rtol, options.param_atol);
        if !close {
            return Err(InferenceError::ParameterMismatch {
                distance,
                tolerance,
            });
        }
        Ok(())
    }
}

/// The interface generic samplers and optimizers use.
pub trait LogDensityProblem {
    fn dim(&self) -> usize;

    /// Log density at `x`. Recoverable errors (see [`LogpError`]) mark `x` as
    /// outside the target's support.
    fn logdensity(&self, x: &[f64]) -> Result<f64>;

    /// Like [`LogDensityProblem::logdensity`], with recoverable errors mapped
    /// to `-inf`.
    fn logdensity_or_neg_inf(&self, x: &[f64]) -> Result<f64> {
        match self.logdensity(x) {
            Ok(logp) => Ok(logp),
            Err(err) if err.is_recoverable() => {
                log::trace!("recoverable error in logdensity: {err}");
                Ok(f64::NEG_INFINITY)
            }
            Err(err) => Err(err),
        }
    }
}

impl<P, S> LogDensityProblem for SimulatorInferenceProblem<P, S>
where
    P: ForwardProblem,
    S: ForwardSolver<P>,
{
    fn dim(&self) -> usize {
        self.u0().len()
    }

    fn logdensity(&self, x: &[f64]) -> Result<f64> {
        SimulatorInferenceProblem::logdensity(self, x)
    }
}

/// Central finite-difference gradients for a [`LogDensityProblem`].
///
/// [`FiniteDiffGradient::logp`] has the `logp(position, gradient)` shape that
/// gradient-based samplers call.
#[derive(Debug, Clone)]
pub struct FiniteDiffGradient<L> {
    inner: L,
    step: f64,
}

impl<L: LogDensityProblem> FiniteDiffGradient<L> {
    pub fn new(inner: L) -> Self {
        Self { inner, step: 1e-6 }
    }

    /// Relative step size. The absolute step for coordinate `i` is
    /// `step * max(|x_i|, 1)`.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn dim(&self) -> usize {
        self.inner.dim()
    }

    /// Write the gradient into `gradient` and return the log density.
    pub fn logp(&self, position: &[f64], gradient: &mut [f64]) -> Result<f64> {
        check_len("position", self.dim(), position.len())?;
        check_len("gradient", self.dim(), gradient.len())?;
        let logp = self.inner.logdensity(position)?;
        let mut x = position.to_vec();
        for (i, grad) in gradient.iter_mut().enumerate() {
            let x0 = position[i];
            let h = self.step * x0.abs().max(1.);
            x[i] = x0 + h;
            let upper = self.inner.logdensity(&x)?;
            x[i] = x0 - h;
            let lower = self.inner.logdensity(&x)?;
            x[i] = x0;
            *grad = (upper - lower) / (2. * h);
        }
        Ok(logp)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::distributions::{HalfNormal, Normal, Prior};
    use crate::forward::test_models::{IdentitySimulator, IdentitySolver};
    use crate::forward::{NoSolver, Observables};
    use crate::likelihood::{GaussianLikelihood, Likelihood};
    use crate::math::{normal_logpdf, LN_SQRT_2PI};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    type Problem = SimulatorInferenceProblem<IdentitySimulator, IdentitySolver>;

    fn lik(name: &str, y: f64) -> Arc<dyn Likelihood> {
        Arc::new(GaussianLikelihood::new(name, vec![y], 1.0).unwrap())
    }

    fn problem_with(likelihoods: Vec<Arc<dyn Likelihood>>) -> Problem {
        Problem::new(
            IdentitySimulator::new(vec![0., 0.]),
            Some(IdentitySolver::default()),
            Arc::new(Normal::standard(2)),
            likelihoods,
        )
        .unwrap()
    }

    fn noisy_problem() -> Problem {
        let sigma: Arc<dyn Prior> = Arc::new(HalfNormal::new(1., 1).unwrap());
        let noisy: Arc<dyn Likelihood> =
            Arc::new(GaussianLikelihood::with_learned_noise("sum", vec![0.5], sigma).unwrap());
        problem_with(vec![lik("obs", 1.0), noisy])
    }

    #[test]
    fn identity_simulator_scenario() {
        let prob = problem_with(vec![lik("obs", 1.0)]);

        let lj = prob.logjoint(&[0., 0.], LogJointOptions::default()).unwrap();
        assert_abs_diff_eq!(lj.logprior, -2. * LN_SQRT_2PI, epsilon = 1e-12);
        assert_abs_diff_eq!(lj.loglik, normal_logpdf(1.0, 0.0, 1.0), epsilon = 1e-12);

        let lj = prob.logjoint(&[1., 0.], LogJointOptions::default()).unwrap();
        let max_loglik = -(2. * std::f64::consts::PI).sqrt().ln();
        assert_abs_diff_eq!(lj.loglik, max_loglik, epsilon = 1e-12);
    }

    #[test]
    fn no_likelihoods_give_zero_loglik() {
        let prob = problem_with(vec![]);
        let lj = prob.logjoint(&[0.3, -2.], LogJointOptions::default()).unwrap();
        assert_eq!(lj.loglik, 0.);
        let lj = prob
            .logjoint(&[0., 0.], LogJointOptions::default().with_forward_solve(false))
            .unwrap();
        assert_eq!(lj.loglik, 0.);
    }

    #[test]
    fn wrong_length_fails_fast() {
        let prob = noisy_problem();
        let err = prob.logjoint(&[0., 0.], LogJointOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::ShapeMismatch {
                expected: 3,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn transform_adds_log_jacobian() {
        let prob = noisy_problem();
        let u = [0.2, -0.4, 0.7];
        let transformed = prob
            .logjoint(&u, LogJointOptions::default().with_transform(true))
            .unwrap();
        let (theta, logabsdet) = prob.bijector().inverse_with_logabsdet(&u).unwrap();
        assert_abs_diff_eq!(logabsdet, 0.7);
        let theta = ComponentVector::from_vec(prob.u0().layout().clone(), theta).unwrap();
        let expected = prob.prior().logpdf(&theta).unwrap() + logabsdet;
        assert_abs_diff_eq!(transformed.logprior, expected, epsilon = 1e-12);

        let natural = prob.logjoint(theta.as_slice(), LogJointOptions::default()).unwrap();
        assert_abs_diff_eq!(transformed.loglik, natural.loglik, epsilon = 1e-12);
    }

    #[test]
    fn logdensity_and_logprob_sum_terms() {
        let prob = noisy_problem();
        let u = [0.1, 0.2, -0.3];
        let lj = prob
            .logjoint(&u, LogJointOptions::default().with_transform(true))
            .unwrap();
        assert_abs_diff_eq!(prob.logdensity(&u).unwrap(), lj.sum(), epsilon = 1e-12);

        let theta = [0.1, 0.2, 0.8];
        let lj = prob.logjoint(&theta, LogJointOptions::default()).unwrap();
        assert_abs_diff_eq!(prob.logprob(&theta).unwrap(), lj.sum(), epsilon = 1e-12);
    }

    #[test]
    fn bypass_requires_matching_parameters() {
        let prob = problem_with(vec![lik("obs", 1.0)]);
        let options = LogJointOptions::default().with_forward_solve(false);
        let err = prob.logjoint(&[1., 0.], options).unwrap_err();
        assert!(matches!(err, InferenceError::ParameterMismatch { .. }));

        // parameters match, but nothing has been simulated yet
        let err = prob.logjoint(&[0., 0.], options).unwrap_err();
        assert!(matches!(err, InferenceError::MissingObservable(_)));
    }

    #[test]
    fn reusing_a_solution_matches_a_fresh_solve() {
        let prob = noisy_problem();
        let theta = [0.7, -0.1, 1.3];
        let solution = prob.forward_solve(&theta[..2]).unwrap();
        let reused = prob
            .logjoint_with_solution(&solution, &theta, LogJointOptions::default())
            .unwrap();
        let fresh = prob.logjoint(&theta, LogJointOptions::default()).unwrap();
        assert_abs_diff_eq!(reused.loglik, fresh.loglik, epsilon = 1e-12);
        assert_abs_diff_eq!(reused.logprior, fresh.logprior, epsilon = 1e-12);

        // the problem itself is not modified
        assert_eq!(prob.forward_prob().params, vec![0., 0.]);
        assert!(prob.likelihoods().get("obs").unwrap().bound_outputs().is_none());
    }

    #[test]
    fn reusing_a_solution_with_other_parameters_fails() {
        let prob = noisy_problem();
        let solution = prob.forward_solve(&[0.7, -0.1]).unwrap();
        let err = prob
            .logjoint_with_solution(&solution, &[0.0, -0.1, 1.0], LogJointOptions::default())
            .unwrap_err();
        assert!(matches!(err, InferenceError::ParameterMismatch { .. }));
    }

    #[test]
    fn missing_solver() {
        let prob = SimulatorInferenceProblem::<IdentitySimulator, NoSolver>::new(
            IdentitySimulator::new(vec![0., 0.]),
            None,
            Arc::new(Normal::standard(2)),
            [lik("obs", 1.0)],
        )
        .unwrap();
        let err = prob.logdensity(&[0., 0.]).unwrap_err();
        assert!(matches!(err, InferenceError::NoForwardSolver));

        let mut observables = Observables::new();
        observables.insert("obs".to_string(), vec![0.]);
        observables.insert("sum".to_string(), vec![0.]);
        let solution = ForwardSolution::new(IdentitySimulator::new(vec![0., 0.]), observables);
        let lj = prob
            .logjoint_with_solution(&solution, &[0., 0.], LogJointOptions::default())
            .unwrap();
        assert_abs_diff_eq!(lj.loglik, normal_logpdf(1.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn solver_failures_propagate() {
        let prob = problem_with(vec![lik("obs", 1.0)]).remake(
            RemakeOptions::default().with_forward_solver(Some(IdentitySolver { limit: 1. })),
        );
        let err = prob.logprob(&[2., 0.]).unwrap_err();
        assert!(matches!(err, InferenceError::ForwardSolve { .. }));
        assert_eq!(
            LogDensityProblem::logdensity_or_neg_inf(&prob, &[2., 0.]).unwrap(),
            f64::NEG_INFINITY
        );
        let results = prob.logdensity_batch(&[vec![0., 0.], vec![2., 0.], vec![0.5]]);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(InferenceError::ForwardSolve { .. })));
        assert!(matches!(results[2], Err(InferenceError::ShapeMismatch { .. })));
    }

    #[test]
    fn finite_difference_gradient() {
        let prob = noisy_problem();
        let grad_func = FiniteDiffGradient::new(prob.clone());
        let x = [0.3, -0.2, 0.1];
        let mut grad = vec![0.; 3];
        let logp = grad_func.logp(&x, &mut grad).unwrap();
        assert_abs_diff_eq!(logp, prob.logdensity(&x).unwrap());

        // d/dx1 of the model block: prior N(0, 1) plus the two likelihood terms
        let sigma = 0.1f64.exp();
        let expected = -0.3 + (1.0 - 0.3) + (0.5 - 0.1) / (sigma * sigma);
        assert_abs_diff_eq!(grad[0], expected, epsilon = 1e-5);
        assert!(grad_func.logp(&x, &mut [0.; 2]).is_err());
    }

    proptest! {
        #[test]
        fn loglik_is_additive(a in -3f64..3f64, b in -3f64..3f64, y1 in -2f64..2f64, y2 in -2f64..2f64) {
            let both = problem_with(vec![lik("obs", y1), lik("sum", y2)]);
            let first = problem_with(vec![lik("obs", y1)]);
            let second = problem_with(vec![lik("sum", y2)]);
            let options = LogJointOptions::default();
            let theta = [a, b];
            let lj = both.logjoint(&theta, options).unwrap();
            let l1 = first.logjoint(&theta, options).unwrap().loglik;
            let l2 = second.logjoint(&theta, options).unwrap().loglik;
            prop_assert!((lj.loglik - (l1 + l2)).abs() < 1e-10);
            prop_assert!((both.logprob(&theta).unwrap() - (lj.loglik + lj.logprior)).abs() < 1e-10);
        }

        #[test]
        fn transform_consistency(a in -3f64..3f64, b in -3f64..3f64, s in -4f64..4f64) {
            let prob = noisy_problem();
            let u = [a, b, s];
            let lj = prob.logjoint(&u, LogJointOptions::default().with_transform(true)).unwrap();
            let transform = prob.bijector();
            let theta = transform.inverse(&u).unwrap();
            let theta = ComponentVector::from_vec(prob.u0().layout().clone(), theta).unwrap();
            let expected = prob.prior().logpdf(&theta).unwrap()
                + transform.inverse_log_abs_det_jacobian(&u).unwrap();
            prop_assert!((lj.logprior - expected).abs() < 1e-10);
        }
    }
}
