//! Importance sampling with the prior as proposal.
//!
//! Every ensemble member is drawn from the joint prior, pushed through the
//! forward solver and weighted by its likelihood. Members run independently,
//! so the ensemble can be simulated in parallel; storage is written in member
//! order afterwards.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::error::{InferenceError, LogpError};
use crate::forward::{ForwardProblem, ForwardSolver, Observables};
use crate::joint_prior::MODEL;
use crate::logjoint::LogJointOptions;
use crate::math::logsumexp;
use crate::params::ComponentVector;
use crate::problem::SimulatorInferenceProblem;
use crate::solution::SimulatorInferenceSolution;
use crate::storage::SimulationStorage;

/// Settings for [`PriorImportanceSampling`].
#[derive(Debug, Clone, Copy)]
pub struct ImportanceSamplingSettings {
    /// Number of ensemble members.
    pub num_samples: usize,
    /// Member `i` draws from a ChaCha8 stream `i` seeded with this value, so
    /// results do not depend on the thread schedule.
    pub seed: u64,
    /// Simulate members on the rayon thread pool.
    pub parallel: bool,
    /// Size of a dedicated thread pool. `None` uses the global pool.
    pub num_threads: Option<usize>,
}

impl Default for ImportanceSamplingSettings {
    fn default() -> Self {
        Self {
            num_samples: 100,
            seed: 42,
            parallel: true,
            num_threads: None,
        }
    }
}

impl ImportanceSamplingSettings {
    pub fn with_num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }
}

/// Importance sampling algorithm, see the module documentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorImportanceSampling {
    pub settings: ImportanceSamplingSettings,
}

/// Weighted ensemble produced by [`PriorImportanceSampling`].
#[derive(Debug, Clone)]
pub struct ImportanceWeights {
    /// Prior draws in constrained space, one per member.
    pub samples: Vec<ComponentVector>,
    /// Log-likelihood of each member, `-inf` for failed simulations.
    pub loglik: Vec<f64>,
    /// Normalized log importance weights.
    pub log_weights: Vec<f64>,
    /// Kish effective sample size `1 / sum(w^2)`.
    pub ess: f64,
    /// Members whose forward solve failed with a recoverable error.
    pub failed: usize,
}

impl ImportanceWeights {
    fn from_members(samples: Vec<ComponentVector>, loglik: Vec<f64>, failed: usize) -> Self {
        let log_norm = logsumexp(&loglik);
        let (log_weights, ess) = if log_norm.is_finite() {
            let log_weights: Vec<f64> = loglik.iter().map(|l| l - log_norm).collect();
            let sum_sq: f64 = log_weights.iter().map(|lw| (2. * lw).exp()).sum();
            (log_weights, sum_sq.recip())
        } else {
            (vec![f64::NEG_INFINITY; loglik.len()], 0.)
        };
        Self {
            samples,
            loglik,
            log_weights,
            ess,
            failed,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.log_weights.iter().map(|lw| lw.exp()).collect()
    }

    /// Weighted mean of the samples. `None` if no member has positive weight.
    pub fn mean(&self) -> Option<Vec<f64>> {
        if self.ess == 0. {
            return None;
        }
        let dim = self.samples.first()?.len();
        let mut mean = vec![0f64; dim];
        for (sample, w) in self.samples.iter().zip(self.weights()) {
            if w == 0. {
                continue;
            }
            for (m, x) in mean.iter_mut().zip(sample.as_slice()) {
                *m += w * x;
            }
        }
        Some(mean)
    }
}

struct Member {
    theta: ComponentVector,
    simulation: Option<(Vec<f64>, Observables)>,
    loglik: f64,
}

impl PriorImportanceSampling {
    pub fn new(settings: ImportanceSamplingSettings) -> Self {
        Self { settings }
    }

    /// Run the ensemble and record every successful simulation in `storage`.
    ///
    /// Members that fail with a recoverable error get weight zero. Any other
    /// error aborts the run.
    pub fn solve<P, S, St>(
        self,
        prob: SimulatorInferenceProblem<P, S>,
        mut storage: St,
    ) -> Result<
        SimulatorInferenceSolution<SimulatorInferenceProblem<P, S>, Self, ImportanceWeights, St>,
    >
    where
        P: ForwardProblem,
        S: ForwardSolver<P>,
        St: SimulationStorage,
    {
        let settings = self.settings;
        log::debug!(
            "importance sampling with {} members (seed {}, parallel {})",
            settings.num_samples,
            settings.seed,
            settings.parallel
        );

        let run = || -> std::result::Result<Vec<Member>, InferenceError> {
            if settings.parallel {
                (0..settings.num_samples)
                    .into_par_iter()
                    .map(|idx| simulate_member(&prob, settings.seed, idx))
                    .collect()
            } else {
                (0..settings.num_samples)
                    .map(|idx| simulate_member(&prob, settings.seed, idx))
                    .collect()
            }
        };
        let members = match settings.num_threads {
            Some(num_threads) if settings.parallel => ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build()
                .context("Could not create thread pool")?
                .install(run),
            _ => run(),
        }
        .context("Ensemble simulation failed")?;

        let mut samples = Vec::with_capacity(members.len());
        let mut loglik = Vec::with_capacity(members.len());
        let mut failed = 0;
        for member in members {
            match &member.simulation {
                Some((inputs, outputs)) => storage.store(inputs, outputs)?,
                None => failed += 1,
            }
            samples.push(member.theta);
            loglik.push(member.loglik);
        }
        storage.flush()?;

        let weights = ImportanceWeights::from_members(samples, loglik, failed);
        log::debug!(
            "importance sampling done: ess = {:.2}, {} failed",
            weights.ess,
            weights.failed
        );
        Ok(SimulatorInferenceSolution::new(prob, self, weights, storage))
    }
}

fn simulate_member<P, S>(
    prob: &SimulatorInferenceProblem<P, S>,
    seed: u64,
    idx: usize,
) -> std::result::Result<Member, InferenceError>
where
    P: ForwardProblem,
    S: ForwardSolver<P>,
{
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(idx as u64);
    let theta = prob.sample_prior(&mut rng);

    let evaluate = || {
        let zeta = prob.prior().forward_map(&theta)?;
        let solution = prob.forward_solve(zeta.field(MODEL)?)?;
        let loglik = prob
            .logjoint_with_solution(&solution, theta.as_slice(), LogJointOptions::default())?
            .loglik;
        let (solved, observables) = solution.into_parts();
        Ok::<_, InferenceError>((solved.parameters().to_vec(), observables, loglik))
    };

    match evaluate() {
        Ok((inputs, outputs, loglik)) => Ok(Member {
            theta,
            simulation: Some((inputs, outputs)),
            loglik,
        }),
        Err(err) if err.is_recoverable() => {
            log::warn!("ensemble member {idx} failed: {err}");
            Ok(Member {
                theta,
                simulation: None,
                loglik: f64::NEG_INFINITY,
            })
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::distributions::{Normal, Uniform};
    use crate::forward::test_models::{IdentitySimulator, IdentitySolver};
    use crate::forward::NoSolver;
    use crate::likelihood::{GaussianLikelihood, Likelihood};
    use crate::storage::{Selector, SimulationArrayStorage};
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    type Problem = SimulatorInferenceProblem<IdentitySimulator, IdentitySolver>;

    fn problem(limit: f64) -> Problem {
        let lik: Arc<dyn Likelihood> =
            Arc::new(GaussianLikelihood::new("obs", vec![0.5], 0.5).unwrap());
        Problem::new(
            IdentitySimulator::new(vec![0., 0.]),
            Some(IdentitySolver { limit }),
            Arc::new(Uniform::new(-1., 1., 2).unwrap()),
            [lik],
        )
        .unwrap()
    }

    fn settings() -> ImportanceSamplingSettings {
        ImportanceSamplingSettings::default()
            .with_num_samples(64)
            .with_seed(7)
    }

    #[test]
    fn weights_are_normalized() {
        let alg = PriorImportanceSampling::new(settings());
        let sol = alg
            .solve(problem(f64::INFINITY), SimulationArrayStorage::new())
            .unwrap();
        let weights = sol.result();
        assert_eq!(weights.len(), 64);
        assert_eq!(weights.failed, 0);
        assert_abs_diff_eq!(weights.weights().iter().sum::<f64>(), 1., epsilon = 1e-12);
        assert!(weights.ess > 1. && weights.ess <= 64.);
        assert_eq!(sol.storage().len(), 64);

        // stored inputs are the model block of each sample
        let inputs = sol.get_inputs(Selector::All).unwrap();
        for (input, sample) in inputs.iter().zip(weights.samples.iter()) {
            assert_eq!(input.as_slice(), sample.field(MODEL).unwrap());
        }
        let outputs = sol.get_outputs(Selector::Index(3)).unwrap();
        assert_eq!(outputs[0]["obs"], vec![inputs[3][0]]);

        // weights favour draws close to the data
        let mean = weights.mean().unwrap();
        assert!(mean[0] > 0.);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let parallel = PriorImportanceSampling::new(settings().with_num_threads(2))
            .solve(problem(f64::INFINITY), SimulationArrayStorage::new())
            .unwrap();
        let sequential = PriorImportanceSampling::new(settings().with_parallel(false))
            .solve(problem(f64::INFINITY), SimulationArrayStorage::new())
            .unwrap();
        assert_eq!(parallel.result().loglik, sequential.result().loglik);
        assert_eq!(
            parallel.get_inputs(Selector::All).unwrap(),
            sequential.get_inputs(Selector::All).unwrap()
        );
    }

    #[test]
    fn recoverable_failures_get_zero_weight() {
        let sol = PriorImportanceSampling::new(settings())
            .solve(problem(0.5), SimulationArrayStorage::new())
            .unwrap();
        let weights = sol.result();
        assert!(weights.failed > 0);
        assert_eq!(sol.storage().len(), 64 - weights.failed);
        for (sample, (loglik, lw)) in weights
            .samples
            .iter()
            .zip(weights.loglik.iter().zip(weights.log_weights.iter()))
        {
            let blew_up = sample.field(MODEL).unwrap().iter().any(|&x| x > 0.5);
            assert_eq!(blew_up, *loglik == f64::NEG_INFINITY);
            assert_eq!(blew_up, *lw == f64::NEG_INFINITY);
        }
    }

    #[test]
    fn everything_fails() {
        let sol = PriorImportanceSampling::new(settings().with_num_samples(8))
            .solve(problem(-2.), SimulationArrayStorage::new())
            .unwrap();
        assert_eq!(sol.result().failed, 8);
        assert_eq!(sol.result().ess, 0.);
        assert!(sol.result().mean().is_none());
        assert!(sol.storage().is_empty());
    }

    #[test]
    fn unrecoverable_errors_abort() {
        let prob = SimulatorInferenceProblem::<IdentitySimulator, NoSolver>::new(
            IdentitySimulator::new(vec![0.]),
            None,
            Arc::new(Normal::standard(1)),
            Vec::<Arc<dyn Likelihood>>::new(),
        )
        .unwrap();
        let err = PriorImportanceSampling::default()
            .solve(prob, SimulationArrayStorage::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InferenceError>(),
            Some(InferenceError::NoForwardSolver)
        ));
    }
}
