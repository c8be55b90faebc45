use std::fmt::Debug;
use std::sync::Arc;

use indexmap::IndexMap;
use itertools::izip;

use crate::distributions::Prior;
use crate::error::{check_len, InferenceError, Result};
use crate::forward::Observables;
use crate::math::normal_logpdf;

/// Relates one simulator observable to observed data.
///
/// A likelihood is named after the observable it reads. It may have
/// parameters of its own (for example a noise scale); their prior is
/// returned by [`Likelihood::param_prior`] and becomes a block of the joint
/// prior named after the likelihood.
pub trait Likelihood: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Prior over the likelihood's own parameters, if it has any.
    fn param_prior(&self) -> Option<Arc<dyn Prior>> {
        None
    }

    /// The observed data.
    fn data(&self) -> &[f64];

    /// Simulator outputs this likelihood is currently bound to.
    fn bound_outputs(&self) -> Option<&[f64]>;

    /// Log-likelihood of the data given simulator outputs `predicted` and the
    /// likelihood's own parameter block `params`.
    fn loglikelihood(&self, predicted: &[f64], params: &[f64]) -> Result<f64>;

    /// A copy of this likelihood bound to new simulator outputs.
    fn rebind(&self, outputs: &[f64]) -> Arc<dyn Likelihood>;

    /// Log-likelihood against the bound outputs.
    fn loglikelihood_bound(&self, params: &[f64]) -> Result<f64> {
        let outputs = self
            .bound_outputs()
            .ok_or_else(|| InferenceError::MissingObservable(self.name().to_string()))?;
        self.loglikelihood(outputs, params)
    }
}

/// Likelihoods keyed by name, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Likelihoods {
    inner: IndexMap<String, Arc<dyn Likelihood>>,
}

impl Likelihoods {
    /// Fails with [`InferenceError::DuplicateLikelihood`] if two likelihoods
    /// declare the same name.
    pub fn new(likelihoods: impl IntoIterator<Item = Arc<dyn Likelihood>>) -> Result<Self> {
        let mut inner = IndexMap::new();
        for likelihood in likelihoods {
            let name = likelihood.name().to_string();
            if inner.contains_key(&name) {
                return Err(InferenceError::DuplicateLikelihood(name));
            }
            inner.insert(name, likelihood);
        }
        Ok(Self { inner })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Likelihood>> {
        self.inner.get(name)
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.inner.keys().map(|name| name.as_str())
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Arc<dyn Likelihood>)> {
        self.inner.iter().map(|(name, lik)| (name.as_str(), lik))
    }

    /// Rebind every likelihood to the observable of the same name.
    ///
    /// Each observable must have as many elements as the likelihood's data.
    pub fn rebind_all(&self, observables: &Observables) -> Result<Self> {
        let inner = self
            .inner
            .iter()
            .map(|(name, lik)| {
                let outputs = observables
                    .get(name)
                    .ok_or_else(|| InferenceError::MissingObservable(name.clone()))?;
                check_len(name, lik.data().len(), outputs.len())?;
                Ok((name.clone(), lik.rebind(outputs)))
            })
            .collect::<Result<_>>()?;
        Ok(Self { inner })
    }
}

/// Two collections are equal if they hold the same likelihood objects under
/// the same names. Likelihoods are compared by `Arc` identity, not by value:
/// clones compare equal, separately constructed likelihoods do not.
impl PartialEq for Likelihoods {
    fn eq(&self, other: &Self) -> bool {
        self.inner.len() == other.inner.len()
            && self
                .inner
                .iter()
                .zip(other.inner.iter())
                .all(|((n1, l1), (n2, l2))| {
                    n1 == n2 && std::ptr::addr_eq(Arc::as_ptr(l1), Arc::as_ptr(l2))
                })
    }
}

/// Noise scale of a [`GaussianLikelihood`].
#[derive(Debug, Clone)]
pub enum NoiseScale {
    Fixed(f64),
    /// Inferred jointly with the model; a one-dimensional prior over sigma.
    Learned(Arc<dyn Prior>),
}

/// Independent normal noise around the simulator outputs.
#[derive(Debug, Clone)]
pub struct GaussianLikelihood {
    name: String,
    data: Vec<f64>,
    noise: NoiseScale,
    outputs: Option<Vec<f64>>,
}

impl GaussianLikelihood {
    pub fn new(name: impl Into<String>, data: Vec<f64>, sigma: f64) -> Result<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(InferenceError::InvalidDistribution(format!(
                "noise sigma must be finite and > 0, got {sigma}"
            )));
        }
        Ok(Self {
            name: name.into(),
            data,
            noise: NoiseScale::Fixed(sigma),
            outputs: None,
        })
    }

    pub fn with_learned_noise(
        name: impl Into<String>,
        data: Vec<f64>,
        sigma_prior: Arc<dyn Prior>,
    ) -> Result<Self> {
        check_len("noise scale prior", 1, sigma_prior.dim())?;
        Ok(Self {
            name: name.into(),
            data,
            noise: NoiseScale::Learned(sigma_prior),
            outputs: None,
        })
    }

    pub fn noise(&self) -> &NoiseScale {
        &self.noise
    }

    fn sigma(&self, params: &[f64]) -> Result<f64> {
        match &self.noise {
            NoiseScale::Fixed(sigma) => {
                check_len(&self.name, 0, params.len())?;
                Ok(*sigma)
            }
            NoiseScale::Learned(_) => {
                check_len(&self.name, 1, params.len())?;
                let sigma = params[0];
                if !sigma.is_finite() || sigma <= 0.0 {
                    return Err(InferenceError::InvalidDistribution(format!(
                        "{}: noise sigma must be finite and > 0, got {sigma}",
                        self.name
                    )));
                }
                Ok(sigma)
            }
        }
    }
}

impl Likelihood for GaussianLikelihood {
    fn name(&self) -> &str {
        &self.name
    }

    fn param_prior(&self) -> Option<Arc<dyn Prior>> {
        match &self.noise {
            NoiseScale::Fixed(_) => None,
            NoiseScale::Learned(prior) => Some(prior.clone()),
        }
    }

    fn data(&self) -> &[f64] {
        &self.data
    }

    fn bound_outputs(&self) -> Option<&[f64]> {
        self.outputs.as_deref()
    }

    fn loglikelihood(&self, predicted: &[f64], params: &[f64]) -> Result<f64> {
        check_len(&self.name, self.data.len(), predicted.len())?;
        let sigma = self.sigma(params)?;
        Ok(izip!(self.data.iter(), predicted.iter())
            .map(|(&y, &mu)| normal_logpdf(y, mu, sigma))
            .sum())
    }

    fn rebind(&self, outputs: &[f64]) -> Arc<dyn Likelihood> {
        Arc::new(Self {
            outputs: Some(outputs.to_vec()),
            ..self.clone()
        })
    }
}
