//! Radial wavefunction R_nl(r) of a hydrogen-like atom with nuclear charge Z.
//!
//! This module holds the cache-free evaluation and the pieces shared with
//! [`crate::Engine::radial`], which swaps the Laguerre factor for a cached or
//! precomputed lookup.

use crate::error::{EngineError, EngineResult};
use crate::physics::laguerre::{laguerre_polynomial, LaguerreKey};
use crate::physics::finite_or_zero;

pub fn validate_radial_state(n: u32, l: u32) -> EngineResult<()> {
    if n == 0 || l >= n {
        return Err(EngineError::InvalidRadialState { n, l });
    }
    Ok(())
}

pub fn validate_charge(z: f64) -> EngineResult<()> {
    if z.is_finite() && z > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidCharge(z))
    }
}

/// (2Z/n)^(3/2) * sqrt((n-l-1)! / (2n (n+l)!))
///
/// The factorial ratio is 1 / prod_{j=n-l}^{n+l} j, summed in log space so
/// it stays finite past n + l = 170.
pub fn radial_normalization(n: u32, l: u32, z: f64) -> f64 {
    let n_f = f64::from(n);
    let log_ratio: f64 = -((n - l)..=(n + l)).map(|j| f64::from(j).ln()).sum::<f64>();
    (2.0 * z / n_f).powf(1.5) * (0.5 * (log_ratio - (2.0 * n_f).ln())).exp()
}

/// rho = 2 Z r / n, with r clipped to the physical half-line first.
pub fn scaled_radius(r: f64, n: u32, z: f64) -> f64 {
    2.0 * z * r.max(0.0) / n as f64
}

/// norm * exp(-rho/2) * rho^l * L, with every non-finite product replaced by 0.
pub(crate) fn assemble(n: u32, l: u32, z: f64, rho: &[f64], laguerre: &[f64]) -> Vec<f64> {
    let norm = radial_normalization(n, l, z);
    rho.iter()
        .zip(laguerre)
        .map(|(&rho, &lag)| finite_or_zero(norm * (-0.5 * rho).exp() * rho.powi(l as i32) * lag))
        .collect()
}

/// Direct evaluation: the Laguerre factor comes straight from the recurrence.
pub fn radial_wavefunction(n: u32, l: u32, r: &[f64], z: f64) -> EngineResult<Vec<f64>> {
    validate_radial_state(n, l)?;
    validate_charge(z)?;

    let key = LaguerreKey::for_state(n, l);
    let rho: Vec<f64> = r.iter().map(|&r| scaled_radius(r, n, z)).collect();
    let laguerre: Vec<f64> = rho
        .iter()
        .map(|&x| laguerre_polynomial(x, key.k, key.alpha as f64))
        .collect();
    Ok(assemble(n, l, z, &rho, &laguerre))
}

/// Radial probability density r^2 R(r)^2.
pub fn radial_probability(r: &[f64], radial: &[f64]) -> Vec<f64> {
    r.iter()
        .zip(radial)
        .map(|(&r, &v)| finite_or_zero(r * r * v * v))
        .collect()
}

/// Indices of strict interior local maxima.
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }
    (1..values.len() - 1)
        .filter(|&i| values[i] > values[i - 1] && values[i] > values[i + 1])
        .collect()
}
