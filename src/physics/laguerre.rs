//! Associated Laguerre polynomials L_k^alpha and the two caches built on them.
//!
//! [`LaguerreCache`] fills one key at a time on first access.
//! [`LaguerreTable`] holds every key up to some n_max at once and is what the
//! background worker delivers. Both sample the same kind of uniform grid and
//! are read through the same piecewise-linear interpolation, so they agree
//! to within interpolation error for any shared key.

use std::collections::HashMap;

use once_cell::unsync::OnceCell;

use crate::config::LaguerreGridConfig;

/// Identifies L_k^alpha. For a hydrogen state (n, l): k = n-l-1, alpha = 2l+1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaguerreKey {
    pub k: u32,
    pub alpha: u32,
}

impl LaguerreKey {
    pub fn new(k: u32, alpha: u32) -> Self {
        LaguerreKey { k, alpha }
    }

    /// Caller guarantees `l < n`.
    pub fn for_state(n: u32, l: u32) -> Self {
        LaguerreKey {
            k: n - l - 1,
            alpha: 2 * l + 1,
        }
    }
}

/// Generalized Laguerre polynomial L^alpha_k(x), forward three-term recurrence.
/// Only the two most recent terms are kept.
pub fn laguerre_polynomial(x: f64, k: u32, alpha: f64) -> f64 {
    if k == 0 {
        return 1.0;
    }

    let mut l0 = 1.0;
    let mut l1 = 1.0 + alpha - x;

    if k == 1 {
        return l1;
    }

    for i in 2..=k {
        let i_f = i as f64;
        let l_new = ((2.0 * i_f - 1.0 + alpha - x) * l1 - (i_f - 1.0 + alpha) * l0) / i_f;
        l0 = l1;
        l1 = l_new;
    }

    l1
}

/// L_k^alpha evaluated pointwise over `x`.
pub fn evaluate(k: u32, alpha: f64, x: &[f64]) -> Vec<f64> {
    x.iter().map(|&x| laguerre_polynomial(x, k, alpha)).collect()
}

fn evaluate_key(key: LaguerreKey, x: &[f64]) -> Vec<f64> {
    evaluate(key.k, key.alpha as f64, x)
}

/// `points` evenly spaced values on [0, max].
pub fn uniform_grid(max: f64, points: usize) -> Vec<f64> {
    let count = points.max(2);
    let denom = (count - 1) as f64;
    (0..count).map(|i| max * (i as f64 / denom)).collect()
}

/// Piecewise-linear interpolation on a monotone grid; clamps outside it.
pub fn interpolate(grid: &[f64], values: &[f64], x: f64) -> f64 {
    if grid.is_empty() || values.is_empty() {
        return 0.0;
    }
    if x <= grid[0] {
        return values[0];
    }
    let last = grid.len().min(values.len()) - 1;
    if x >= grid[last] {
        return values[last];
    }
    let idx = grid[..=last].partition_point(|&g| g < x).clamp(1, last);
    let x0 = grid[idx - 1];
    let x1 = grid[idx];
    let v0 = values[idx - 1];
    let v1 = values[idx];
    let t = if x1 > x0 { (x - x0) / (x1 - x0) } else { 0.0 };
    v0 + (v1 - v0) * t
}

fn grid_covers(grid: &[f64], x: f64) -> bool {
    match (grid.first(), grid.last()) {
        (Some(&lo), Some(&hi)) => x >= lo && x <= hi,
        _ => false,
    }
}

/// On-demand cache: compute once per key, reuse for the life of the owner.
#[derive(Debug)]
pub struct LaguerreCache {
    rho_max: f64,
    points: usize,
    grid: OnceCell<Vec<f64>>,
    entries: HashMap<LaguerreKey, Vec<f64>>,
}

impl LaguerreCache {
    pub fn new(rho_max: f64, points: usize) -> Self {
        LaguerreCache {
            rho_max,
            points,
            grid: OnceCell::new(),
            entries: HashMap::new(),
        }
    }

    pub fn from_config(config: &LaguerreGridConfig) -> Self {
        Self::new(config.rho_max, config.points)
    }

    pub fn grid(&self) -> &[f64] {
        self.grid
            .get_or_init(|| uniform_grid(self.rho_max, self.points))
    }

    pub fn covers(&self, x: f64) -> bool {
        x >= 0.0 && x <= self.rho_max
    }

    pub fn get(&mut self, key: LaguerreKey) -> &[f64] {
        let grid = self
            .grid
            .get_or_init(|| uniform_grid(self.rho_max, self.points));
        self.entries
            .entry(key)
            .or_insert_with(|| evaluate_key(key, grid))
    }

    /// Already-computed entry, if any.
    pub fn cached(&self, key: LaguerreKey) -> Option<&[f64]> {
        self.entries.get(&key).map(Vec::as_slice)
    }

    pub fn interpolate_at(&mut self, key: LaguerreKey, x: &[f64]) -> Vec<f64> {
        self.get(key);
        let grid = self.grid();
        let values = &self.entries[&key];
        x.iter().map(|&x| interpolate(grid, values, x)).collect()
    }

    /// Single-point form of [`LaguerreCache::interpolate_at`].
    pub fn value_at(&mut self, key: LaguerreKey, x: f64) -> f64 {
        self.get(key);
        interpolate(self.grid(), &self.entries[&key], x)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bulk table for every key reachable from n = 1..=max_n. Immutable once built.
#[derive(Debug, Clone)]
pub struct LaguerreTable {
    grid: Vec<f64>,
    entries: HashMap<LaguerreKey, Vec<f64>>,
}

impl LaguerreTable {
    /// Evaluates every key from [`table_keys`]. `cancelled` is checked before
    /// each key; `None` means it fired and the partial table was dropped.
    pub fn compute(
        max_n: u32,
        rho_max: f64,
        points: usize,
        mut cancelled: impl FnMut() -> bool,
    ) -> Option<Self> {
        let grid = uniform_grid(rho_max, points);
        let mut entries = HashMap::new();
        for key in table_keys(max_n) {
            if cancelled() {
                return None;
            }
            entries.insert(key, evaluate_key(key, &grid));
        }
        Some(LaguerreTable { grid, entries })
    }

    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    pub fn get(&self, key: LaguerreKey) -> Option<&[f64]> {
        self.entries.get(&key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: LaguerreKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn covers(&self, x: f64) -> bool {
        grid_covers(&self.grid, x)
    }

    /// `None` when the key is missing or `x` lies off the grid.
    pub fn interpolate_at(&self, key: LaguerreKey, x: f64) -> Option<f64> {
        if !self.covers(x) {
            return None;
        }
        self.get(key).map(|values| interpolate(&self.grid, values, x))
    }

    pub fn keys(&self) -> impl Iterator<Item = LaguerreKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One key per (n, l) with 1 <= n <= max_n, 0 <= l < n.
pub fn table_keys(max_n: u32) -> Vec<LaguerreKey> {
    let mut keys = Vec::new();
    for n in 1..=max_n {
        for l in 0..n {
            keys.push(LaguerreKey::for_state(n, l));
        }
    }
    keys
}
