//! Complex spherical harmonics Y_l^m(theta, phi).
//!
//! Convention: theta is the colatitude in [0, pi], phi the azimuth in
//! [0, 2pi). Orthonormal on the unit sphere, Condon-Shortley phase included
//! (Y_1^1 = -sqrt(3/8pi) sin(theta) e^{i phi}), and
//! Y_l^{-m} = (-1)^m conj(Y_l^m).

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::error::{EngineError, EngineResult};
use crate::physics::{broadcast_at, broadcast_len, factorial};

pub fn validate_angular_state(l: u32, m: i32) -> EngineResult<()> {
    if m.unsigned_abs() > l {
        return Err(EngineError::InvalidAngularState { l, m });
    }
    Ok(())
}

/// P_l(x) by Bonnet's recurrence, (j+1) P_{j+1} = (2j+1) x P_j - j P_{j-1}.
pub fn legendre_polynomial(x: f64, l: u32) -> f64 {
    let (mut prev, mut curr) = (1.0, x);
    if l == 0 {
        return prev;
    }
    for j in 1..l {
        let j = f64::from(j);
        (prev, curr) = (curr, ((2.0 * j + 1.0) * x * curr - j * prev) / (j + 1.0));
    }
    curr
}

/// Associated Legendre function P_l^m(x) for m >= 0, Condon-Shortley phase included.
pub fn associated_legendre(x: f64, l: u32, m: u32) -> f64 {
    if m > l {
        return 0.0;
    }
    if m == 0 {
        return legendre_polynomial(x, l);
    }

    // P_m^m = (-1)^m (2m-1)!! (1-x^2)^{m/2}
    let somx2 = ((1.0 - x) * (1.0 + x)).max(0.0).sqrt();
    let mut pmm = 1.0;
    let mut odd = 1.0;
    for _ in 0..m {
        pmm *= -odd * somx2;
        odd += 2.0;
    }

    if l == m {
        return pmm;
    }

    let m_f = m as f64;
    let pm1m = x * (2.0 * m_f + 1.0) * pmm;

    if l == m + 1 {
        return pm1m;
    }

    let mut pmn = pmm;
    let mut pm1n = pm1m;

    for i in (m + 2)..=l {
        let i_f = i as f64;
        let pn = ((2.0 * i_f - 1.0) * x * pm1n - (i_f + m_f - 1.0) * pmn) / (i_f - m_f);
        pmn = pm1n;
        pm1n = pn;
    }

    pm1n
}

fn harmonic_normalization(l: u32, m_abs: u32) -> f64 {
    let l_f = l as f64;
    ((2.0 * l_f + 1.0) / (4.0 * PI) * factorial(l - m_abs) / factorial(l + m_abs)).sqrt()
}

/// Y_l^m at a single point. `|m| <= l` is the caller's responsibility;
/// out-of-range orders evaluate to zero.
pub fn spherical_harmonic(l: u32, m: i32, theta: f64, phi: f64) -> Complex64 {
    let m_abs = m.unsigned_abs();
    if m_abs > l {
        return Complex64::new(0.0, 0.0);
    }

    let amplitude = harmonic_normalization(l, m_abs) * associated_legendre(theta.cos(), l, m_abs);
    let positive = Complex64::from_polar(amplitude, m_abs as f64 * phi);

    if m >= 0 {
        positive
    } else {
        let sign = if m_abs % 2 == 0 { 1.0 } else { -1.0 };
        positive.conj() * sign
    }
}

/// Y_l^m over the broadcast of `theta` and `phi`.
pub fn harmonic(l: u32, m: i32, theta: &[f64], phi: &[f64]) -> EngineResult<Vec<Complex64>> {
    validate_angular_state(l, m)?;
    let len = broadcast_len(&[theta.len(), phi.len()]).ok_or(EngineError::LengthMismatch {
        r: 1,
        theta: theta.len(),
        phi: phi.len(),
    })?;
    Ok((0..len)
        .map(|i| spherical_harmonic(l, m, broadcast_at(theta, i), broadcast_at(phi, i)))
        .collect())
}

pub fn harmonic_real(l: u32, m: i32, theta: &[f64], phi: &[f64]) -> EngineResult<Vec<f64>> {
    Ok(harmonic(l, m, theta, phi)?.into_iter().map(|y| y.re).collect())
}

pub fn harmonic_imag(l: u32, m: i32, theta: &[f64], phi: &[f64]) -> EngineResult<Vec<f64>> {
    Ok(harmonic(l, m, theta, phi)?.into_iter().map(|y| y.im).collect())
}

/// Cheap check on a 5 x 5 set of angles for a non-vanishing imaginary part.
pub fn has_nonzero_imag(l: u32, m: i32) -> bool {
    const SAMPLES: usize = 5;
    const ATOL: f64 = 1e-8;

    if m == 0 {
        return false;
    }
    let step = |lo: f64, hi: f64, i: usize| lo + (hi - lo) * i as f64 / (SAMPLES - 1) as f64;
    (0..SAMPLES).any(|i| {
        let theta = step(0.1, PI - 0.1, i);
        (0..SAMPLES).any(|j| {
            let phi = step(0.0, 2.0 * PI, j);
            spherical_harmonic(l, m, theta, phi).im.abs() > ATOL
        })
    })
}

/// Flattened theta-major grid over the full sphere; both axes include their endpoints.
#[derive(Debug, Clone)]
pub struct SphericalGrid {
    pub theta_points: usize,
    pub phi_points: usize,
    pub theta: Vec<f64>,
    pub phi: Vec<f64>,
}

pub fn spherical_grid(theta_points: usize, phi_points: usize) -> SphericalGrid {
    let theta_points = theta_points.max(2);
    let phi_points = phi_points.max(2);
    let mut theta = Vec::with_capacity(theta_points * phi_points);
    let mut phi = Vec::with_capacity(theta_points * phi_points);
    for i in 0..theta_points {
        let t = PI * i as f64 / (theta_points - 1) as f64;
        for j in 0..phi_points {
            theta.push(t);
            phi.push(2.0 * PI * j as f64 / (phi_points - 1) as f64);
        }
    }
    SphericalGrid {
        theta_points,
        phi_points,
        theta,
        phi,
    }
}
