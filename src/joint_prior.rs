//! Structured prior over the model parameters and every likelihood's own
//! parameters.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;

use crate::distributions::Prior;
use crate::error::{InferenceError, Result};
use crate::likelihood::Likelihoods;
use crate::params::{ComponentVector, ParamLayout};
use crate::transform::ParameterTransform;

/// Name of the block holding the forward problem's parameters.
pub const MODEL: &str = "model";

/// Product of the model prior and the likelihood sub-priors.
///
/// The first block is always [`MODEL`]. Every likelihood contributes one block
/// named after it, which is empty when the likelihood has no parameters.
#[derive(Debug, Clone)]
pub struct JointPrior {
    layout: Arc<ParamLayout>,
    components: Vec<Option<Arc<dyn Prior>>>,
}

impl JointPrior {
    pub fn new(model: Arc<dyn Prior>, likelihoods: &Likelihoods) -> Result<Self> {
        let components = std::iter::once((MODEL.to_string(), Some(model))).chain(
            likelihoods
                .iter()
                .map(|(name, lik)| (name.to_string(), lik.param_prior())),
        );
        Self::from_components(components)
    }

    /// Build from explicit `(name, prior)` blocks. `None` marks an empty block.
    pub fn from_components(
        components: impl IntoIterator<Item = (String, Option<Arc<dyn Prior>>)>,
    ) -> Result<Self> {
        let (blocks, components): (Vec<_>, Vec<_>) = components
            .into_iter()
            .map(|(name, prior)| {
                let size = prior.as_ref().map_or(0, |prior| prior.dim());
                ((name, size), prior)
            })
            .unzip();
        let layout = ParamLayout::new(blocks)?;
        if layout.range(MODEL).is_none() {
            return Err(InferenceError::FieldMismatch {
                expected: vec![MODEL.to_string()],
                found: layout.names().map(String::from).collect(),
            });
        }
        Ok(Self {
            layout: Arc::new(layout),
            components,
        })
    }

    pub fn dim(&self) -> usize {
        self.layout.len()
    }

    pub fn layout(&self) -> &Arc<ParamLayout> {
        &self.layout
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.layout.names()
    }

    pub fn component(&self, name: &str) -> Option<&Arc<dyn Prior>> {
        self.layout
            .names()
            .position(|n| n == name)
            .and_then(|idx| self.components[idx].as_ref())
    }

    /// The additive identity of a sample.
    pub fn zeros(&self) -> ComponentVector {
        ComponentVector::zeros(self.layout.clone())
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> ComponentVector {
        let mut out = self.zeros();
        for ((_, range), prior) in self.layout.blocks().zip(self.components.iter()) {
            if let Some(prior) = prior {
                prior.sample_into(rng, &mut out.as_mut_slice()[range]);
            }
        }
        out
    }

    /// Sum of the block log densities.
    ///
    /// `theta` must have exactly this prior's blocks.
    pub fn logpdf(&self, theta: &ComponentVector) -> Result<f64> {
        self.check_fields(theta)?;
        let mut logp = 0f64;
        for ((name, _), prior) in self.layout.blocks().zip(self.components.iter()) {
            if let Some(prior) = prior {
                logp += prior.logpdf(theta.field(name)?)?;
            }
        }
        Ok(logp)
    }

    /// Map a prior sample to the values consumed by the simulator and the
    /// likelihoods. Pure; currently the identity.
    pub fn forward_map(&self, theta: &ComponentVector) -> Result<ComponentVector> {
        self.check_fields(theta)?;
        Ok(theta.clone())
    }

    /// Elementwise bijector to unconstrained space, derived from each
    /// block's support.
    pub fn bijector(&self) -> ParameterTransform {
        let bounds: Vec<(f64, f64)> = self
            .components
            .iter()
            .flatten()
            .flat_map(|prior| prior.support())
            .collect();
        ParameterTransform::from_bounds(&bounds)
    }

    fn check_fields(&self, theta: &ComponentVector) -> Result<()> {
        if theta.layout().as_ref() != self.layout.as_ref() {
            return Err(InferenceError::FieldMismatch {
                expected: self.layout.names().map(String::from).collect(),
                found: theta.layout().names().map(String::from).collect(),
            });
        }
        Ok(())
    }
}

/// Component priors are compared by `Arc` identity, not by value. A prior
/// and its clones compare equal; two joint priors built from separately
/// constructed but identical components do not.
impl PartialEq for JointPrior {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| match (a, b) {
                    (None, None) => true,
                    (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
                    _ => false,
                })
    }
}

impl fmt::Display for JointPrior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JointPrior(")?;
        for (i, (name, prior)) in self.layout.names().zip(self.components.iter()).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match prior {
                Some(prior) => write!(f, "{name}: {}", prior.name())?,
                None => write!(f, "{name}: -")?,
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{HalfNormal, Normal};
    use crate::likelihood::{GaussianLikelihood, Likelihood};
    use crate::math::LN_SQRT_2PI;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn joint() -> JointPrior {
        let sigma: Arc<dyn Prior> = Arc::new(HalfNormal::new(1., 1).unwrap());
        let liks: Vec<Arc<dyn Likelihood>> = vec![
            Arc::new(GaussianLikelihood::new("a", vec![0.], 1.).unwrap()),
            Arc::new(GaussianLikelihood::with_learned_noise("b", vec![0.], sigma).unwrap()),
        ];
        let liks = Likelihoods::new(liks).unwrap();
        JointPrior::new(Arc::new(Normal::standard(2)), &liks).unwrap()
    }

    #[test]
    fn layout_follows_likelihoods() {
        let prior = joint();
        assert_eq!(prior.names().collect::<Vec<_>>(), vec!["model", "a", "b"]);
        assert_eq!(prior.dim(), 3);
        assert!(prior.component("a").is_none());
        assert_eq!(prior.component("b").unwrap().name(), "HalfNormal");
        assert_eq!(prior.to_string(), "JointPrior(model: Normal, a: -, b: HalfNormal)");
    }

    #[test]
    fn sample_has_every_field() {
        let prior = joint();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let theta = prior.sample(&mut rng);
        assert_eq!(theta.layout(), prior.layout());
        assert_eq!(theta.field(MODEL).unwrap().len(), 2);
        assert!(theta.field("a").unwrap().is_empty());
        assert!(theta.field("b").unwrap()[0] >= 0.);
        assert!(prior.logpdf(&theta).unwrap().is_finite());
    }

    #[test]
    fn logpdf_sums_blocks() {
        let prior = joint();
        let theta =
            ComponentVector::from_vec(prior.layout().clone(), vec![0., 0., 1.]).unwrap();
        let expected = -2. * LN_SQRT_2PI + (std::f64::consts::LN_2 - 0.5 - LN_SQRT_2PI);
        assert_abs_diff_eq!(prior.logpdf(&theta).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn logpdf_rejects_other_layouts() {
        let prior = joint();
        let layout = Arc::new(ParamLayout::new([("model", 2), ("c", 1)]).unwrap());
        let theta = ComponentVector::zeros(layout);
        assert!(matches!(
            prior.logpdf(&theta),
            Err(InferenceError::FieldMismatch { .. })
        ));
        assert!(prior.forward_map(&theta).is_err());
    }

    #[test]
    fn bijector_covers_all_parameters() {
        let prior = joint();
        let transform = prior.bijector();
        assert_eq!(transform.dim(), 3);
        let theta = transform.inverse(&[0.3, -0.2, -5.]).unwrap();
        assert_abs_diff_eq!(theta[0], 0.3);
        assert_abs_diff_eq!(theta[1], -0.2);
        assert!(theta[2] > 0.);
    }

    #[test]
    fn model_block_is_required() {
        let err = JointPrior::from_components([(
            "obs".to_string(),
            Some(Arc::new(Normal::standard(1)) as Arc<dyn Prior>),
        )])
        .unwrap_err();
        assert!(matches!(err, InferenceError::FieldMismatch { .. }));
    }

    #[test]
    fn likelihood_named_model_collides() {
        let liks: Vec<Arc<dyn Likelihood>> =
            vec![Arc::new(GaussianLikelihood::new("model", vec![0.], 1.).unwrap())];
        let liks = Likelihoods::new(liks).unwrap();
        let err = JointPrior::new(Arc::new(Normal::standard(1)), &liks).unwrap_err();
        assert!(matches!(err, InferenceError::DuplicateComponent(_)));
    }

    #[test]
    fn equality_is_identity() {
        let prior = joint();
        assert_eq!(prior.clone(), prior);
        assert_ne!(joint(), prior);
    }
}
