//! Engine session: configuration, the on-demand Laguerre cache, and the
//! precomputed table once the background worker has delivered it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::physics::laguerre::{
    laguerre_polynomial, uniform_grid, LaguerreCache, LaguerreKey, LaguerreTable,
};
use crate::physics::radial::{
    assemble, local_maxima, radial_probability, radial_wavefunction, scaled_radius,
    validate_charge, validate_radial_state,
};
use crate::physics::sampler::OrbitalSampler;
use crate::physics::QuantumNumbers;
use crate::precompute::{self, PrecomputeHandle, PrecomputeRequest, PrecomputeStatus};

/// R(r) and r^2 R(r)^2 over the plotting grid.
#[derive(Debug, Clone, Serialize)]
pub struct RadialProfile {
    pub r: Vec<f64>,
    pub radial: Vec<f64>,
    pub probability: Vec<f64>,
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    cache: LaguerreCache,
    table: Option<Arc<LaguerreTable>>,
    precompute: Option<PrecomputeHandle>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = LaguerreCache::from_config(&config.laguerre);
        Engine {
            config,
            cache,
            table: None,
            precompute: None,
        }
    }

    /// Like [`Engine::new`], and starts the worker that precomputes every
    /// Laguerre key up to `max_n`. Failure to start is logged; the engine
    /// then runs on the on-demand cache alone.
    pub fn with_background_precompute(config: EngineConfig) -> Self {
        let mut engine = Self::new(config);
        let request = PrecomputeRequest::from_config(&engine.config);
        match precompute::spawn(request) {
            Ok(handle) => {
                info!(max_n = request.max_n, "laguerre precompute started");
                engine.precompute = Some(handle);
            }
            Err(err) => warn!(error = %err, "could not start laguerre precompute"),
        }
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Non-blocking check on the worker; installs its table on arrival.
    /// Returns whether a precomputed table is installed.
    pub fn poll_precompute(&mut self) -> bool {
        let Some(handle) = self.precompute.as_mut() else {
            return self.table.is_some();
        };
        match handle.try_take() {
            PrecomputeStatus::Pending => {}
            PrecomputeStatus::Ready(table) => {
                self.precompute = None;
                self.install_table(table);
            }
            PrecomputeStatus::Disconnected => {
                self.precompute = None;
                warn!("laguerre precompute exited without a table; staying on the on-demand cache");
            }
        }
        self.table.is_some()
    }

    pub fn is_precompute_pending(&self) -> bool {
        self.precompute.is_some()
    }

    /// Replaces the precomputed table as a whole.
    pub fn install_table(&mut self, table: LaguerreTable) {
        info!(
            keys = table.len(),
            points = table.grid().len(),
            "precomputed laguerre table installed"
        );
        self.table = Some(Arc::new(table));
    }

    pub fn precomputed_table(&self) -> Option<Arc<LaguerreTable>> {
        self.table.clone()
    }

    pub fn laguerre_cache(&self) -> &LaguerreCache {
        &self.cache
    }

    /// L_k^alpha at each `rho`: installed table first, then the on-demand
    /// cache, then the recurrence for arguments past both grids.
    pub fn laguerre_at(&mut self, key: LaguerreKey, rho: &[f64]) -> Vec<f64> {
        let table = self.table.clone();
        rho.iter()
            .map(|&x| {
                if let Some(value) = table.as_deref().and_then(|t| t.interpolate_at(key, x)) {
                    value
                } else if self.cache.covers(x) {
                    self.cache.value_at(key, x)
                } else {
                    laguerre_polynomial(x, key.k, key.alpha as f64)
                }
            })
            .collect()
    }

    /// R_nl(r) for nuclear charge `z`.
    pub fn radial(&mut self, n: u32, l: u32, r: &[f64], z: f64) -> EngineResult<Vec<f64>> {
        validate_radial_state(n, l)?;
        validate_charge(z)?;

        let key = LaguerreKey::for_state(n, l);
        let rho: Vec<f64> = r.iter().map(|&r| scaled_radius(r, n, z)).collect();
        let laguerre = self.laguerre_at(key, &rho);
        Ok(assemble(n, l, z, &rho, &laguerre))
    }

    pub fn radial_grid(&self) -> Vec<f64> {
        uniform_grid(self.config.radial_extent, self.config.radial_points)
    }

    pub fn radial_with_grid(&mut self, n: u32, l: u32, z: f64) -> EngineResult<RadialProfile> {
        let r = self.radial_grid();
        let radial = self.radial(n, l, &r, z)?;
        let probability = radial_probability(&r, &radial);
        Ok(RadialProfile {
            r,
            radial,
            probability,
        })
    }

    /// Radii of the r^2 R^2 maxima on the plotting grid; the global maximum
    /// when the grid shows no interior peak.
    pub fn shell_radii(&self, n: u32, l: u32, z: f64) -> EngineResult<Vec<f64>> {
        let r = self.radial_grid();
        let probability = radial_probability(&r, &radial_wavefunction(n, l, &r, z)?);
        let peaks = local_maxima(&probability);
        if !peaks.is_empty() {
            return Ok(peaks.into_iter().map(|i| r[i]).collect());
        }
        Ok(probability
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| vec![r[i]])
            .unwrap_or_default())
    }

    pub fn sampler(&mut self, qn: QuantumNumbers, z: f64) -> EngineResult<OrbitalSampler> {
        OrbitalSampler::new(self, qn, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.max_n = 4;
        config
    }

    #[test]
    fn cached_radial_matches_direct_evaluation() {
        let mut engine = Engine::new(small_config());
        let r = [0.0, 0.3, 1.7, 5.2, 11.9, 23.0, 38.0];
        for n in 1..=4 {
            for l in 0..n {
                let cached = engine.radial(n, l, &r, 1.0).unwrap();
                let direct = radial_wavefunction(n, l, &r, 1.0).unwrap();
                for (a, b) in cached.iter().zip(&direct) {
                    assert!((a - b).abs() < 1e-3 * b.abs().max(1e-3), "n={n} l={l}");
                }
            }
        }
        assert_eq!(engine.laguerre_cache().len(), 10);
    }

    #[test]
    fn arguments_past_the_grid_use_the_recurrence() {
        let mut engine = Engine::new(small_config());
        // rho = 2 * 3 * 30 / 2 = 90, beyond rho_max = 80
        let cached = engine.radial(2, 0, &[30.0], 3.0).unwrap();
        let direct = radial_wavefunction(2, 0, &[30.0], 3.0).unwrap();
        assert_eq!(cached, direct);
    }

    #[test]
    fn installing_a_table_keeps_values_within_tolerance() {
        let mut engine = Engine::new(small_config());
        let r: Vec<f64> = (0..200).map(|i| i as f64 * 0.2).collect();
        let before = engine.radial(4, 1, &r, 1.0).unwrap();

        let cfg = engine.config().laguerre.clone();
        engine.install_table(LaguerreTable::compute(4, cfg.rho_max, cfg.points, || false).unwrap());
        assert!(engine.poll_precompute());
        let after = engine.radial(4, 1, &r, 1.0).unwrap();

        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn background_table_is_installed_by_polling() {
        let mut engine = Engine::with_background_precompute(small_config());
        let mut installed = false;
        for _ in 0..5_000 {
            if engine.poll_precompute() {
                installed = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert!(installed);
        assert!(!engine.is_precompute_pending());
        assert_eq!(engine.precomputed_table().map(|t| t.len()), Some(10));
    }

    #[test]
    fn plotting_profile_spans_configured_grid() {
        let mut engine = Engine::new(EngineConfig::default());
        let profile = engine.radial_with_grid(3, 1, 1.0).unwrap();
        assert_eq!(profile.r.len(), 600);
        assert_eq!(profile.r[599], 40.0);
        assert_eq!(profile.probability.len(), 600);
    }

    #[test]
    fn shell_radii_count_nodes_plus_one() {
        let engine = Engine::new(EngineConfig::default());
        assert_eq!(engine.shell_radii(1, 0, 1.0).unwrap().len(), 1);
        assert_eq!(engine.shell_radii(3, 0, 1.0).unwrap().len(), 3);
        assert_eq!(engine.shell_radii(3, 1, 1.0).unwrap().len(), 2);
        let twop = engine.shell_radii(2, 1, 1.0).unwrap();
        assert_eq!(twop.len(), 1);
        assert!((twop[0] - 4.0).abs() < 0.1);
    }

    #[test]
    fn invalid_states_are_rejected() {
        let mut engine = Engine::new(EngineConfig::default());
        assert_eq!(
            engine.radial(3, 3, &[1.0], 1.0),
            Err(EngineError::InvalidRadialState { n: 3, l: 3 })
        );
        assert!(engine.radial(1, 0, &[1.0], f64::INFINITY).is_err());
        assert!(engine.laguerre_cache().is_empty());
    }
}
