//! Process-wide engine constants.
//!
//! Everything here is read once when an [`crate::Engine`] is created and
//! stays fixed for its lifetime. Defaults match the values the desktop
//! viewer shipped with; a JSON file may override any subset of them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Largest principal quantum number offered and precomputed.
    pub max_n: u32,
    /// Extent of the radial plotting grid, in Bohr radii.
    pub radial_extent: f64,
    pub radial_points: usize,
    pub laguerre: LaguerreGridConfig,
    pub angular: AngularGridConfig,
    pub sampler: SamplerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_n: 7,
            radial_extent: 40.0,
            radial_points: 600,
            laguerre: LaguerreGridConfig::default(),
            angular: AngularGridConfig::default(),
            sampler: SamplerConfig::default(),
        }
    }
}

/// Evaluation grid shared by the on-demand cache and the precomputed table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaguerreGridConfig {
    pub rho_max: f64,
    pub points: usize,
}

impl Default for LaguerreGridConfig {
    fn default() -> Self {
        LaguerreGridConfig {
            rho_max: 80.0,
            points: 4000,
        }
    }
}

/// Spherical grid used by surface views of Y_lm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AngularGridConfig {
    pub theta_points: usize,
    pub phi_points: usize,
}

impl Default for AngularGridConfig {
    fn default() -> Self {
        AngularGridConfig {
            theta_points: 80,
            phi_points: 160,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// r_theory = factor * n^2
    pub theory_radius_factor: f64,
    /// Coarse grid used only to locate shells.
    pub probe_points: usize,
    /// Spacing of the fine grid is r_theory / (reference_points - 1).
    pub reference_points: usize,
    pub min_fine_points: usize,
    /// Domain ends at factor * (radius of the outermost shell).
    pub shell_cutoff_factor: f64,
    pub theta_bins_base: usize,
    pub theta_bins_per_l: usize,
    pub phi_bins_base: usize,
    pub phi_bins_per_l: usize,
    /// Width of the in-bin angular jitter, as a fraction of the bin width.
    pub jitter_fraction: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            theory_radius_factor: 8.0,
            probe_points: 8000,
            reference_points: 30_000,
            min_fine_points: 2000,
            shell_cutoff_factor: 1.4,
            theta_bins_base: 60,
            theta_bins_per_l: 20,
            phi_bins_base: 120,
            phi_bins_per_l: 40,
            jitter_fraction: 1.0,
        }
    }
}

impl SamplerConfig {
    pub fn theta_bins(&self, l: u32) -> usize {
        self.theta_bins_base + self.theta_bins_per_l * (l as usize + 1)
    }

    pub fn phi_bins(&self, l: u32) -> usize {
        self.phi_bins_base + self.phi_bins_per_l * (l as usize + 1)
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_n == 0 {
            return Err(invalid("max_n", "must be >= 1"));
        }
        positive("radial_extent", self.radial_extent)?;
        at_least_two("radial_points", self.radial_points)?;
        positive("laguerre.rho_max", self.laguerre.rho_max)?;
        at_least_two("laguerre.points", self.laguerre.points)?;
        at_least_two("angular.theta_points", self.angular.theta_points)?;
        at_least_two("angular.phi_points", self.angular.phi_points)?;

        let s = &self.sampler;
        positive("sampler.theory_radius_factor", s.theory_radius_factor)?;
        positive("sampler.shell_cutoff_factor", s.shell_cutoff_factor)?;
        at_least_two("sampler.probe_points", s.probe_points)?;
        at_least_two("sampler.reference_points", s.reference_points)?;
        at_least_two("sampler.min_fine_points", s.min_fine_points)?;
        if s.theta_bins_base + s.theta_bins_per_l == 0 {
            return Err(invalid("sampler.theta_bins_base", "yields zero theta bins"));
        }
        if s.phi_bins_base + s.phi_bins_per_l == 0 {
            return Err(invalid("sampler.phi_bins_base", "yields zero phi bins"));
        }
        if !(0.0..=1.0).contains(&s.jitter_fraction) {
            return Err(invalid(
                "sampler.jitter_fraction",
                format!("must lie in [0, 1], got {}", s.jitter_fraction),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be finite and > 0, got {value}")))
    }
}

fn at_least_two(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value >= 2 {
        Ok(())
    } else {
        Err(invalid(field, format!("needs at least 2 points, got {value}")))
    }
}
