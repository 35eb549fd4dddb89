//! Inverse-CDF sampling of |psi|^2 r^2 sin(theta).
//!
//! The density factorizes into r^2 R(r)^2 times |Y(theta, phi)|^2 sin(theta),
//! so radius and angles are drawn independently, each from its own tabulated
//! distribution. The radial domain is cut a little past the outermost shell
//! so that the tail does not soak up the normalization and leave the outer
//! shell too faint to see.

use std::f64::consts::{PI, TAU};

use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SamplerConfig;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::physics::laguerre::uniform_grid;
use crate::physics::radial::{
    local_maxima, radial_probability, radial_wavefunction, validate_charge,
};
use crate::physics::spherical::{spherical_harmonic, validate_angular_state};
use crate::physics::{spherical_to_cartesian, QuantumNumbers};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub r: f64,
    pub theta: f64,
    pub phi: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Radii of the strict interior maxima of `density`, innermost first.
pub fn find_shell_peaks(grid: &[f64], density: &[f64]) -> Vec<f64> {
    local_maxima(density).into_iter().map(|i| grid[i]).collect()
}

/// Outer edge of the sampled domain before truncation: `factor * n^2`.
pub fn theory_radius(factor: f64, n: u32) -> f64 {
    factor * f64::from(n).powi(2)
}

/// Domain end: `factor` times the outermost shell, never past `theory_radius`.
pub fn truncation_radius(shell_radii: &[f64], theory_radius: f64, factor: f64) -> f64 {
    match shell_radii.last() {
        Some(&last) => theory_radius.min(last * factor),
        None => theory_radius,
    }
}

fn sanitize(density: f64) -> f64 {
    if density.is_finite() && density > 0.0 {
        density
    } else {
        0.0
    }
}

/// Trapezoidal cumulative distribution of `density` over `grid`.
///
/// Returns the CDF (starting at 0, ending at exactly 1) and whether the
/// uniform fallback was used because the total mass was not positive.
pub fn build_cdf(grid: &[f64], density: &[f64]) -> (Vec<f64>, bool) {
    let len = grid.len().min(density.len());
    let mut cdf = vec![0.0; len];
    let mut total = 0.0_f64;
    for i in 1..len {
        let dr = grid[i] - grid[i - 1];
        total += 0.5 * (sanitize(density[i - 1]) + sanitize(density[i])) * dr;
        cdf[i] = total;
    }

    if total.is_finite() && total > 0.0 {
        for v in &mut cdf {
            *v /= total;
        }
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }
        return (cdf, false);
    }

    if len < 2 {
        return (vec![1.0; len], true);
    }
    let start = grid[0];
    let span = grid[len - 1] - start;
    let uniform = (0..len)
        .map(|i| {
            if span > 0.0 {
                (grid[i] - start) / span
            } else {
                i as f64 / (len - 1) as f64
            }
        })
        .collect();
    (uniform, true)
}

/// Running sum of bin weights, normalized to end at exactly 1.
pub fn discrete_cdf(weights: &[f64]) -> (Vec<f64>, bool) {
    let mut total = 0.0_f64;
    let mut cdf: Vec<f64> = weights
        .iter()
        .map(|&w| {
            total += sanitize(w);
            total
        })
        .collect();

    let degenerate = !(total.is_finite() && total > 0.0);
    if degenerate {
        let len = cdf.len() as f64;
        for (i, v) in cdf.iter_mut().enumerate() {
            *v = (i + 1) as f64 / len;
        }
    } else {
        for v in &mut cdf {
            *v /= total;
        }
    }
    if let Some(last) = cdf.last_mut() {
        *last = 1.0;
    }
    (cdf, degenerate)
}

/// Index of the nearest shell for every radius; 0 when there are no shells.
pub fn assign_shells(radii: &[f64], shell_radii: &[f64]) -> Vec<usize> {
    radii
        .iter()
        .map(|&r| {
            shell_radii
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| (r - **a).abs().total_cmp(&(r - **b).abs()))
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
        .collect()
}

/// Radial part: truncated grid plus the CDF of r^2 R^2 over it.
#[derive(Debug, Clone)]
pub struct RadialDistribution {
    grid: Vec<f64>,
    cdf: Vec<f64>,
    theory_radius: f64,
    cutoff_radius: f64,
    shells: Vec<f64>,
    degenerate: bool,
}

impl RadialDistribution {
    pub fn prepare(engine: &mut Engine, n: u32, l: u32, z: f64) -> EngineResult<Self> {
        let cfg = engine.config().sampler.clone();
        let theory_radius = theory_radius(cfg.theory_radius_factor, n);

        // Coarse pass to find the shells. Exact values: the kinks of an
        // interpolated Laguerre factor can split a flat peak in two.
        let probe = uniform_grid(theory_radius, cfg.probe_points);
        let probe_radial = radial_wavefunction(n, l, &probe, z)?;
        let probe_density = radial_probability(&probe, &probe_radial);
        let shells = find_shell_peaks(&probe, &probe_density);
        let cutoff_radius = truncation_radius(&shells, theory_radius, cfg.shell_cutoff_factor);

        // Fine pass keeps the reference spacing, only over [0, cutoff].
        let base_step = theory_radius / (cfg.reference_points - 1) as f64;
        let fine_points = ((cutoff_radius / base_step).ceil() as usize + 1).max(cfg.min_fine_points);
        let grid = uniform_grid(cutoff_radius, fine_points);
        let radial = engine.radial(n, l, &grid, z)?;
        let density = radial_probability(&grid, &radial);
        let (cdf, degenerate) = build_cdf(&grid, &density);

        if degenerate {
            warn!(n, l, z, "radial density has no mass; sampling r uniformly");
        }
        debug!(
            n,
            l,
            z,
            theory_radius,
            cutoff_radius,
            shells = shells.len(),
            fine_points,
            "radial distribution prepared"
        );

        Ok(RadialDistribution {
            grid,
            cdf,
            theory_radius,
            cutoff_radius,
            shells,
            degenerate,
        })
    }

    /// Radius whose CDF value is `u`, by linear interpolation between grid points.
    pub fn invert(&self, u: f64) -> f64 {
        let last = self.cdf.len() - 1;
        let idx = self.cdf.partition_point(|&c| c < u).min(last);
        if idx == 0 {
            return self.grid[0];
        }
        let c0 = self.cdf[idx - 1];
        let c1 = self.cdf[idx];
        let r0 = self.grid[idx - 1];
        let r1 = self.grid[idx];
        let t = if c1 > c0 { (u - c0) / (c1 - c0) } else { 0.0 };
        r0 + (r1 - r0) * t
    }

    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    pub fn cdf(&self) -> &[f64] {
        &self.cdf
    }

    pub fn theory_radius(&self) -> f64 {
        self.theory_radius
    }

    pub fn cutoff_radius(&self) -> f64 {
        self.cutoff_radius
    }

    pub fn shells(&self) -> &[f64] {
        &self.shells
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

/// Angular part: (theta, phi) bins weighted by |Y|^2 sin(theta), flattened theta-major.
#[derive(Debug, Clone)]
pub struct AngularDistribution {
    theta_bins: usize,
    phi_bins: usize,
    theta_edges: Vec<f64>,
    phi_edges: Vec<f64>,
    theta_centers: Vec<f64>,
    phi_centers: Vec<f64>,
    cdf: Vec<f64>,
    degenerate: bool,
}

fn centers(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}

impl AngularDistribution {
    pub fn prepare(l: u32, m: i32, cfg: &SamplerConfig) -> EngineResult<Self> {
        validate_angular_state(l, m)?;

        let theta_bins = cfg.theta_bins(l);
        let phi_bins = cfg.phi_bins(l);
        let theta_edges = uniform_grid(PI, theta_bins + 1);
        let phi_edges = uniform_grid(TAU, phi_bins + 1);
        let theta_centers = centers(&theta_edges);
        let phi_centers = centers(&phi_edges);

        let mut weights = Vec::with_capacity(theta_bins * phi_bins);
        for &theta in &theta_centers {
            let sin_t = theta.sin();
            for &phi in &phi_centers {
                weights.push(sin_t * spherical_harmonic(l, m, theta, phi).norm_sqr());
            }
        }
        let (cdf, degenerate) = discrete_cdf(&weights);
        if degenerate {
            warn!(l, m, "angular density has no mass; sampling bins uniformly");
        }
        debug!(l, m, theta_bins, phi_bins, "angular distribution prepared");

        Ok(AngularDistribution {
            theta_bins,
            phi_bins,
            theta_edges,
            phi_edges,
            theta_centers,
            phi_centers,
            cdf,
            degenerate,
        })
    }

    /// (theta bin, phi bin) holding the CDF value `u`.
    pub fn locate(&self, u: f64) -> (usize, usize) {
        let idx = self
            .cdf
            .partition_point(|&c| c <= u)
            .min(self.cdf.len() - 1);
        (idx / self.phi_bins, idx % self.phi_bins)
    }

    pub fn theta_width(&self) -> f64 {
        self.theta_edges[1] - self.theta_edges[0]
    }

    pub fn phi_width(&self) -> f64 {
        self.phi_edges[1] - self.phi_edges[0]
    }

    /// One (theta, phi) draw: pick a bin, then jitter inside it.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, jitter_fraction: f64) -> (f64, f64) {
        let (it, ip) = self.locate(rng.gen::<f64>());
        let theta = self.theta_centers[it]
            + (rng.gen::<f64>() - 0.5) * self.theta_width() * jitter_fraction;
        let phi = self.phi_centers[ip]
            + (rng.gen::<f64>() - 0.5) * self.phi_width() * jitter_fraction;

        let theta = theta.clamp(0.0, PI);
        let mut phi = phi.rem_euclid(TAU);
        if phi >= TAU {
            phi = 0.0;
        }
        (theta, phi)
    }

    pub fn theta_bins(&self) -> usize {
        self.theta_bins
    }

    pub fn phi_bins(&self) -> usize {
        self.phi_bins
    }

    pub fn theta_centers(&self) -> &[f64] {
        &self.theta_centers
    }

    pub fn phi_centers(&self) -> &[f64] {
        &self.phi_centers
    }

    pub fn cdf(&self) -> &[f64] {
        &self.cdf
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

/// Sampler for one (n, l, m, Z). Construction prepares both distributions,
/// so every constructed sampler is ready to draw.
#[derive(Debug, Clone)]
pub struct OrbitalSampler {
    qn: QuantumNumbers,
    z: f64,
    radial: RadialDistribution,
    angular: AngularDistribution,
    jitter_fraction: f64,
}

impl OrbitalSampler {
    pub fn new(engine: &mut Engine, qn: QuantumNumbers, z: f64) -> EngineResult<Self> {
        validate_charge(z)?;
        let radial = RadialDistribution::prepare(engine, qn.n, qn.l, z)?;
        let angular = AngularDistribution::prepare(qn.l, qn.m_l, &engine.config().sampler)?;
        Ok(OrbitalSampler {
            qn,
            z,
            radial,
            angular,
            jitter_fraction: engine.config().sampler.jitter_fraction,
        })
    }

    pub fn sample(&self, count: usize) -> Vec<Sample> {
        self.sample_with(count, &mut rand::thread_rng())
    }

    /// `count` i.i.d. samples; radii are drawn first, then angles.
    pub fn sample_with<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Sample> {
        let radii: Vec<f64> = (0..count)
            .map(|_| self.radial.invert(rng.gen::<f64>()))
            .collect();

        radii
            .into_iter()
            .map(|r| {
                let (theta, phi) = self.angular.draw(rng, self.jitter_fraction);
                let [x, y, z] = spherical_to_cartesian(r, theta, phi);
                Sample {
                    r,
                    theta,
                    phi,
                    x,
                    y,
                    z,
                }
            })
            .collect()
    }

    pub fn quantum_numbers(&self) -> QuantumNumbers {
        self.qn
    }

    pub fn charge(&self) -> f64 {
        self.z
    }

    pub fn radial(&self) -> &RadialDistribution {
        &self.radial
    }

    pub fn angular(&self) -> &AngularDistribution {
        &self.angular
    }

    pub fn cutoff_radius(&self) -> f64 {
        self.radial.cutoff_radius
    }

    pub fn shells(&self) -> &[f64] {
        &self.radial.shells
    }
}
