use orbital_engine::physics::laguerre::uniform_grid;
use orbital_engine::physics::radial::{radial_probability, radial_wavefunction};
use orbital_engine::physics::sampler::assign_shells;
use orbital_engine::{Engine, EngineConfig, OrbitalSampler, QuantumNumbers, Sample};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn build_sampler(n: u32, l: u32, m: i32) -> OrbitalSampler {
    let mut engine = Engine::new(EngineConfig::default());
    let qn = QuantumNumbers::new(n, l, m).expect("quantum numbers should be valid");
    engine.sampler(qn, 1.0).expect("sampler should build")
}

fn draw(sampler: &OrbitalSampler, count: usize, seed: u64) -> Vec<Sample> {
    sampler.sample_with(count, &mut StdRng::seed_from_u64(seed))
}

fn histogram(values: impl Iterator<Item = f64>, max: f64, bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins];
    for v in values {
        let idx = ((v / max) * bins as f64) as usize;
        counts[idx.min(bins - 1)] += 1;
    }
    counts
}

/// Mass of the exact r^2 R^2 in each of `bins` equal bins on [0, max].
fn expected_bin_mass(n: u32, l: u32, max: f64, bins: usize) -> Vec<f64> {
    let per_bin = 200;
    let grid = uniform_grid(max, bins * per_bin + 1);
    let radial = radial_wavefunction(n, l, &grid, 1.0).expect("radial should evaluate");
    let density = radial_probability(&grid, &radial);

    let mut mass = vec![0.0; bins];
    for i in 0..grid.len() - 1 {
        let piece = 0.5 * (density[i] + density[i + 1]) * (grid[i + 1] - grid[i]);
        mass[(i / per_bin).min(bins - 1)] += piece;
    }
    let total: f64 = mass.iter().sum();
    mass.iter().map(|m| m / total).collect()
}

#[test]
fn two_s_radii_follow_the_truncated_density() {
    let sampler = build_sampler(2, 0, 0);
    let cutoff = sampler.cutoff_radius();
    assert_eq!(sampler.shells().len(), 2, "2s has an inner and an outer shell");
    assert!(cutoff < sampler.radial().theory_radius());

    let count = 200_000;
    let bins = 40;
    let samples = draw(&sampler, count, 2024);
    let observed = histogram(samples.iter().map(|s| s.r), cutoff, bins);
    let expected = expected_bin_mass(2, 0, cutoff, bins);

    let mut chi2 = 0.0;
    let mut used = 0;
    for (o, p) in observed.iter().zip(&expected) {
        let e = p * count as f64;
        if e < 5.0 {
            continue;
        }
        chi2 += (*o as f64 - e).powi(2) / e;
        used += 1;
    }
    let dof = (used - 1) as f64;
    assert!(chi2 < 2.0 * dof + 30.0, "chi2 = {chi2} over {used} bins");
}

#[test]
fn p_zero_angles_follow_cos_squared() {
    let sampler = build_sampler(2, 1, 0);
    let samples = draw(&sampler, 200_000, 11);

    // |cos theta| < 1/2 holds 1/8 of the cos^2 theta sin theta mass, and
    // half of a uniform sphere.
    let equatorial = samples
        .iter()
        .filter(|s| s.theta.cos().abs() < 0.5)
        .count() as f64
        / samples.len() as f64;
    assert!((equatorial - 0.125).abs() < 0.01, "fraction = {equatorial}");
}

#[test]
fn two_p_zero_end_to_end() {
    let sampler = build_sampler(2, 1, 0);
    assert_eq!(sampler.shells().len(), 1);
    assert!((sampler.shells()[0] - 4.0).abs() < 0.01);

    let samples = draw(&sampler, 50_000, 5);
    assert_eq!(samples.len(), 50_000);

    let bin_width = 0.5;
    let bins = (sampler.cutoff_radius() / bin_width).ceil() as usize;
    let counts = histogram(
        samples.iter().map(|s| s.r),
        bins as f64 * bin_width,
        bins,
    );
    let peak = counts
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| **c)
        .map(|(i, _)| (i as f64 + 0.5) * bin_width)
        .expect("histogram should not be empty");
    assert!((3.0..=5.0).contains(&peak), "histogram peaks at r = {peak}");

    let upper = samples.iter().filter(|s| s.z > 0.0).count() as f64 / samples.len() as f64;
    assert!((upper - 0.5).abs() < 0.01, "upper lobe fraction = {upper}");

    for s in &samples {
        let norm = (s.x * s.x + s.y * s.y + s.z * s.z).sqrt();
        assert!((norm - s.r).abs() <= 1e-9 * s.r.max(1.0));
    }
}

#[test]
fn three_s_populates_three_shells() {
    let sampler = build_sampler(3, 0, 0);
    let shells = sampler.shells();
    assert_eq!(shells.len(), 3);
    assert!(shells.windows(2).all(|w| w[0] < w[1]));
    assert!((sampler.cutoff_radius() - 1.4 * shells[2]).abs() < 1e-9);

    let samples = draw(&sampler, 50_000, 99);
    let radii: Vec<f64> = samples.iter().map(|s| s.r).collect();
    let assigned = assign_shells(&radii, shells);
    for shell in 0..3 {
        assert!(
            assigned.iter().filter(|&&i| i == shell).count() > 500,
            "shell {shell} is underpopulated"
        );
    }
}

#[test]
fn ground_state_stays_inside_the_theoretical_domain() {
    let sampler = build_sampler(1, 0, 0);
    assert!(sampler.cutoff_radius() <= sampler.radial().theory_radius());
    assert!(draw(&sampler, 10_000, 1)
        .iter()
        .all(|s| s.r <= sampler.cutoff_radius()));
}

#[test]
fn single_shell_states_are_cut_past_the_shell() {
    // 4f: r^2 R^2 ~ r^8 exp(-r/2), one shell at r = 16
    let sampler = build_sampler(4, 3, -2);
    assert_eq!(sampler.shells().len(), 1);
    assert!((sampler.shells()[0] - 16.0).abs() < 0.05);
    assert!((sampler.cutoff_radius() - 1.4 * sampler.shells()[0]).abs() < 1e-9);
}
