/// Natural log of `sqrt(2π)`.
pub(crate) const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

#[inline]
pub(crate) fn logaddexp(a: f64, b: f64) -> f64 {
    if a == b {
        return a + 2f64.ln();
    }
    let diff = a - b;
    if diff > 0. {
        a + (-diff).exp().ln_1p()
    } else if diff < 0. {
        b + diff.exp().ln_1p()
    } else {
        // diff is NAN
        diff
    }
}

pub(crate) fn logsumexp(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, logaddexp)
}

/// `log N(x; mu, sigma)`. The caller checks that `sigma` is positive.
#[inline]
pub(crate) fn normal_logpdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
}

#[inline]
pub(crate) fn sigmoid(x: f64) -> f64 {
    let e = (-x.abs()).exp();
    let recip = 1.0 / (1.0 + e);
    if x >= 0.0 {
        recip
    } else {
        e * recip
    }
}

#[inline]
pub(crate) fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

pub(crate) fn norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Vector approximate equality on the euclidean norm:
/// `|x - y| <= max(atol, rtol * max(|x|, |y|))`.
pub(crate) fn distance_within(x: &[f64], y: &[f64], rtol: f64, atol: f64) -> (f64, f64, bool) {
    assert!(x.len() == y.len());
    let distance = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt();
    let tolerance = atol.max(rtol * norm(x).max(norm(y)));
    (distance, tolerance, distance <= tolerance)
}
