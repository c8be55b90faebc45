//! Prior distributions over parameter vectors.
//!
//! The inference core only needs the [`Prior`] capability. The concrete
//! distributions here are small iid families that cover the common cases
//! (location parameters, scales, bounded parameters).

use std::fmt::Debug;
use std::sync::Arc;

use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};

use crate::error::{check_len, InferenceError, Result};
use crate::math::normal_logpdf;

/// A distribution over a fixed-size parameter vector.
pub trait Prior: Debug + Send + Sync {
    /// Short name of the distribution family, used for display.
    fn name(&self) -> &str;

    fn dim(&self) -> usize;

    /// Write a draw into `out`, which has length [`Prior::dim`].
    fn sample_into(&self, rng: &mut dyn RngCore, out: &mut [f64]);

    /// Log density at `x`. Points outside the support have density `-inf`.
    fn logpdf(&self, x: &[f64]) -> Result<f64>;

    /// Elementwise `(lower, upper)` bounds of the support.
    fn support(&self) -> Vec<(f64, f64)> {
        vec![(f64::NEG_INFINITY, f64::INFINITY); self.dim()]
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Vec<f64> {
        let mut out = vec![0f64; self.dim()];
        self.sample_into(rng, &mut out);
        out
    }
}

fn check_scale(name: &str, sigma: f64) -> Result<()> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(InferenceError::InvalidDistribution(format!(
            "{name}: sigma must be finite and > 0, got {sigma}"
        )));
    }
    Ok(())
}

/// Independent `N(mu, sigma)` for every element.
#[derive(Debug, Clone, PartialEq)]
pub struct Normal {
    mu: f64,
    sigma: f64,
    dim: usize,
}

impl Normal {
    pub fn new(mu: f64, sigma: f64, dim: usize) -> Result<Self> {
        check_scale("Normal", sigma)?;
        Ok(Self { mu, sigma, dim })
    }

    pub fn standard(dim: usize) -> Self {
        Self {
            mu: 0.,
            sigma: 1.,
            dim,
        }
    }
}

impl Prior for Normal {
    fn name(&self) -> &str {
        "Normal"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn sample_into(&self, rng: &mut dyn RngCore, out: &mut [f64]) {
        out.iter_mut().for_each(|x| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            *x = self.mu + self.sigma * z;
        });
    }

    fn logpdf(&self, x: &[f64]) -> Result<f64> {
        check_len("Normal prior", self.dim, x.len())?;
        Ok(x.iter().map(|&x| normal_logpdf(x, self.mu, self.sigma)).sum())
    }
}

/// Independent log-normal: `ln(x) ~ N(mu, sigma)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogNormal {
    mu: f64,
    sigma: f64,
    dim: usize,
}

impl LogNormal {
    pub fn new(mu: f64, sigma: f64, dim: usize) -> Result<Self> {
        check_scale("LogNormal", sigma)?;
        Ok(Self { mu, sigma, dim })
    }
}

impl Prior for LogNormal {
    fn name(&self) -> &str {
        "LogNormal"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn sample_into(&self, rng: &mut dyn RngCore, out: &mut [f64]) {
        out.iter_mut().for_each(|x| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            *x = (self.mu + self.sigma * z).exp();
        });
    }

    fn logpdf(&self, x: &[f64]) -> Result<f64> {
        check_len("LogNormal prior", self.dim, x.len())?;
        Ok(x
            .iter()
            .map(|&x| {
                if x <= 0. {
                    return f64::NEG_INFINITY;
                }
                let ln_x = x.ln();
                normal_logpdf(ln_x, self.mu, self.sigma) - ln_x
            })
            .sum())
    }

    fn support(&self) -> Vec<(f64, f64)> {
        vec![(0., f64::INFINITY); self.dim]
    }
}

/// Independent half-normal on `[0, inf)` with scale `sigma`.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfNormal {
    sigma: f64,
    dim: usize,
}

impl HalfNormal {
    pub fn new(sigma: f64, dim: usize) -> Result<Self> {
        check_scale("HalfNormal", sigma)?;
        Ok(Self { sigma, dim })
    }
}

impl Prior for HalfNormal {
    fn name(&self) -> &str {
        "HalfNormal"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn sample_into(&self, rng: &mut dyn RngCore, out: &mut [f64]) {
        out.iter_mut().for_each(|x| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            *x = (self.sigma * z).abs();
        });
    }

    fn logpdf(&self, x: &[f64]) -> Result<f64> {
        check_len("HalfNormal prior", self.dim, x.len())?;
        Ok(x
            .iter()
            .map(|&x| {
                if x < 0. {
                    return f64::NEG_INFINITY;
                }
                std::f64::consts::LN_2 + normal_logpdf(x, 0., self.sigma)
            })
            .sum())
    }

    fn support(&self) -> Vec<(f64, f64)> {
        vec![(0., f64::INFINITY); self.dim]
    }
}

/// Independent uniform on `[lower, upper]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform {
    lower: f64,
    upper: f64,
    dim: usize,
}

impl Uniform {
    pub fn new(lower: f64, upper: f64, dim: usize) -> Result<Self> {
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            return Err(InferenceError::InvalidDistribution(format!(
                "Uniform: need finite lower < upper, got [{lower}, {upper}]"
            )));
        }
        Ok(Self { lower, upper, dim })
    }
}

impl Prior for Uniform {
    fn name(&self) -> &str {
        "Uniform"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn sample_into(&self, rng: &mut dyn RngCore, out: &mut [f64]) {
        let width = self.upper - self.lower;
        out.iter_mut().for_each(|x| {
            let u: f64 = rng.random();
            *x = self.lower + width * u;
        });
    }

    fn logpdf(&self, x: &[f64]) -> Result<f64> {
        check_len("Uniform prior", self.dim, x.len())?;
        let log_width = (self.upper - self.lower).ln();
        Ok(x
            .iter()
            .map(|&x| {
                if x < self.lower || x > self.upper {
                    f64::NEG_INFINITY
                } else {
                    -log_width
                }
            })
            .sum())
    }

    fn support(&self) -> Vec<(f64, f64)> {
        vec![(self.lower, self.upper); self.dim]
    }
}

/// Independent priors stacked into one vector, in order.
#[derive(Debug, Clone)]
pub struct ProductPrior {
    parts: Vec<Arc<dyn Prior>>,
}

impl ProductPrior {
    pub fn new(parts: Vec<Arc<dyn Prior>>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[Arc<dyn Prior>] {
        &self.parts
    }
}

impl Prior for ProductPrior {
    fn name(&self) -> &str {
        "Product"
    }

    fn dim(&self) -> usize {
        self.parts.iter().map(|part| part.dim()).sum()
    }

    fn sample_into(&self, rng: &mut dyn RngCore, out: &mut [f64]) {
        let mut rest = out;
        for part in self.parts.iter() {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(part.dim());
            part.sample_into(rng, head);
            rest = tail;
        }
    }

    fn logpdf(&self, x: &[f64]) -> Result<f64> {
        check_len("Product prior", self.dim(), x.len())?;
        let mut offset = 0;
        let mut logp = 0f64;
        for part in self.parts.iter() {
            let dim = part.dim();
            logp += part.logpdf(&x[offset..offset + dim])?;
            offset += dim;
        }
        Ok(logp)
    }

    fn support(&self) -> Vec<(f64, f64)> {
        self.parts.iter().flat_map(|part| part.support()).collect()
    }
}
