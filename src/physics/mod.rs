//! Hydrogen-like atom quantum physics.
//! All lengths are in units of the Bohr radius a0.

pub mod laguerre;
pub mod radial;
pub mod sampler;
pub mod spherical;
pub mod wave;

use serde::Serialize;

use crate::error::{EngineError, EngineResult};

/// Represents quantum numbers (n, l, m_l)
/// n: Principal quantum number (1, 2, 3, ...)
/// l: Azimuthal quantum number (0 to n-1)
/// m_l: Magnetic quantum number (-l to l)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct QuantumNumbers {
    pub n: u32,
    pub l: u32,
    pub m_l: i32,
}

impl QuantumNumbers {
    pub fn new(n: u32, l: u32, m_l: i32) -> EngineResult<Self> {
        if n == 0 || l >= n || m_l.unsigned_abs() > l {
            return Err(EngineError::InvalidQuantumNumbers { n, l, m: m_l });
        }
        Ok(QuantumNumbers { n, l, m_l })
    }

    /// Spectroscopic label, e.g. `3d(m=-1)`.
    pub fn label(&self) -> String {
        format!("{}{}(m={})", self.n, l_to_letter(self.l), self.m_l)
    }
}

pub fn l_to_letter(l: u32) -> &'static str {
    match l {
        0 => "s",
        1 => "p",
        2 => "d",
        3 => "f",
        4 => "g",
        5 => "h",
        6 => "i",
        _ => "?",
    }
}

pub fn available_n_values(max_n: u32) -> Vec<u32> {
    (1..=max_n).collect()
}

pub fn available_l_values(n: u32) -> Vec<u32> {
    (0..n).collect()
}

pub fn available_m_values(l: u32) -> Vec<i32> {
    let l = l as i32;
    (-l..=l).collect()
}

/// Every valid state up to `max_n`, ordered by (n, l, m).
pub fn all_states(max_n: u32) -> Vec<QuantumNumbers> {
    let mut states = Vec::new();
    for n in available_n_values(max_n) {
        for l in available_l_values(n) {
            for m_l in available_m_values(l) {
                states.push(QuantumNumbers { n, l, m_l });
            }
        }
    }
    states
}

/// n! as f64; exact for every n this engine reaches.
pub fn factorial(n: u32) -> f64 {
    (1..=n).fold(1.0, |acc, value| acc * value as f64)
}

pub fn spherical_to_cartesian(r: f64, theta: f64, phi: f64) -> [f64; 3] {
    let (sin_t, cos_t) = theta.sin_cos();
    let (sin_p, cos_p) = phi.sin_cos();
    [r * sin_t * cos_p, r * sin_t * sin_p, r * cos_t]
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Common length of inputs that are either that length or scalars (len 1).
pub(crate) fn broadcast_len(lens: &[usize]) -> Option<usize> {
    let target = lens.iter().copied().max()?;
    if lens.iter().all(|&len| len == target || len == 1) {
        Some(target)
    } else {
        None
    }
}

pub(crate) fn broadcast_at(values: &[f64], i: usize) -> f64 {
    if values.len() == 1 {
        values[0]
    } else {
        values[i]
    }
}
