//! Bijectors between the constrained parameter space of a prior and the
//! unconstrained space samplers work in.
//!
//! Orientation: `forward` maps constrained `theta` to unconstrained `y`,
//! `inverse` maps `y` back. The log-Jacobian reported is the one of the
//! inverse map, which is the correction a density over `y` needs.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{check_len, Result};
use crate::math::{log_sigmoid, sigmoid};

/// A scalar bijection between a constrained interval and the real line.
pub trait Bijector: Debug + Send + Sync {
    /// constrained -> unconstrained
    fn forward(&self, theta: f64) -> f64;
    /// unconstrained -> constrained
    fn inverse(&self, y: f64) -> f64;
    /// `log|d inverse(y) / dy|`
    fn inverse_log_abs_det_jacobian(&self, y: f64) -> f64;
}

/// `(-inf, inf)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentityBijector;

impl Bijector for IdentityBijector {
    #[inline]
    fn forward(&self, theta: f64) -> f64 {
        theta
    }
    #[inline]
    fn inverse(&self, y: f64) -> f64 {
        y
    }
    #[inline]
    fn inverse_log_abs_det_jacobian(&self, _y: f64) -> f64 {
        0.0
    }
}

/// `(a, inf)`, `theta = a + exp(y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowerBoundedBijector {
    lower: f64,
}

impl LowerBoundedBijector {
    pub fn new(lower: f64) -> Self {
        Self { lower }
    }
}

impl Bijector for LowerBoundedBijector {
    #[inline]
    fn forward(&self, theta: f64) -> f64 {
        (theta - self.lower).ln()
    }
    #[inline]
    fn inverse(&self, y: f64) -> f64 {
        self.lower + y.exp()
    }
    #[inline]
    fn inverse_log_abs_det_jacobian(&self, y: f64) -> f64 {
        y
    }
}

/// `(-inf, b)`, `theta = b - exp(y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpperBoundedBijector {
    upper: f64,
}

impl UpperBoundedBijector {
    pub fn new(upper: f64) -> Self {
        Self { upper }
    }
}

impl Bijector for UpperBoundedBijector {
    #[inline]
    fn forward(&self, theta: f64) -> f64 {
        (self.upper - theta).ln()
    }
    #[inline]
    fn inverse(&self, y: f64) -> f64 {
        self.upper - y.exp()
    }
    #[inline]
    fn inverse_log_abs_det_jacobian(&self, y: f64) -> f64 {
        y
    }
}

/// `(a, b)`, `theta = a + (b - a) * sigmoid(y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogitBijector {
    lower: f64,
    width: f64,
    log_width: f64,
}

impl LogitBijector {
    pub fn new(lower: f64, upper: f64) -> Self {
        let width = upper - lower;
        Self {
            lower,
            width,
            log_width: width.ln(),
        }
    }
}

impl Bijector for LogitBijector {
    #[inline]
    fn forward(&self, theta: f64) -> f64 {
        let p = (theta - self.lower) / self.width;
        (p / (1.0 - p)).ln()
    }
    #[inline]
    fn inverse(&self, y: f64) -> f64 {
        self.lower + self.width * sigmoid(y)
    }
    #[inline]
    fn inverse_log_abs_det_jacobian(&self, y: f64) -> f64 {
        self.log_width + log_sigmoid(y) + log_sigmoid(-y)
    }
}

/// Pick the bijector for the support `(lower, upper)`.
///
/// Infinite or inverted bounds fall back to the identity.
pub fn bijector_for_bounds(lower: f64, upper: f64) -> Arc<dyn Bijector> {
    let lower_finite = lower.is_finite();
    let upper_finite = upper.is_finite();
    match (lower_finite, upper_finite) {
        (false, false) => Arc::new(IdentityBijector),
        (true, false) => Arc::new(LowerBoundedBijector::new(lower)),
        (false, true) => Arc::new(UpperBoundedBijector::new(upper)),
        (true, true) if upper > lower => Arc::new(LogitBijector::new(lower, upper)),
        (true, true) => Arc::new(IdentityBijector),
    }
}

/// Elementwise bijector for a whole parameter vector.
#[derive(Debug, Clone, Default)]
pub struct ParameterTransform {
    bijectors: Vec<Arc<dyn Bijector>>,
}

impl ParameterTransform {
    pub fn new(bijectors: Vec<Arc<dyn Bijector>>) -> Self {
        Self { bijectors }
    }

    pub fn from_bounds(bounds: &[(f64, f64)]) -> Self {
        let bijectors = bounds
            .iter()
            .map(|&(lower, upper)| bijector_for_bounds(lower, upper))
            .collect();
        Self { bijectors }
    }

    pub fn dim(&self) -> usize {
        self.bijectors.len()
    }

    /// Map constrained -> unconstrained.
    pub fn forward(&self, theta: &[f64]) -> Result<Vec<f64>> {
        check_len("constrained vector", self.dim(), theta.len())?;
        Ok(theta
            .iter()
            .zip(&self.bijectors)
            .map(|(&x, b)| b.forward(x))
            .collect())
    }

    /// Map unconstrained -> constrained.
    pub fn inverse(&self, y: &[f64]) -> Result<Vec<f64>> {
        Ok(self.inverse_with_logabsdet(y)?.0)
    }

    /// Sum of `log|J|` of the inverse map at `y`.
    pub fn inverse_log_abs_det_jacobian(&self, y: &[f64]) -> Result<f64> {
        Ok(self.inverse_with_logabsdet(y)?.1)
    }

    /// Apply the inverse map and return its log-Jacobian alongside.
    pub fn inverse_with_logabsdet(&self, y: &[f64]) -> Result<(Vec<f64>, f64)> {
        check_len("unconstrained vector", self.dim(), y.len())?;
        let mut logabsdet = 0f64;
        let theta = y
            .iter()
            .zip(&self.bijectors)
            .map(|(&y, b)| {
                logabsdet += b.inverse_log_abs_det_jacobian(y);
                b.inverse(y)
            })
            .collect();
        Ok((theta, logabsdet))
    }
}
