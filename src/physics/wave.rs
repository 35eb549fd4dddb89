//! Combined wavefunction psi(r, theta, phi) = R(r) * Y(theta, phi).

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::physics::spherical::harmonic;
use crate::physics::{broadcast_at, broadcast_len, QuantumNumbers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveComponent {
    Real,
    #[serde(alias = "imaginary")]
    Imag,
    #[serde(alias = "probability")]
    Prob,
}

impl WaveComponent {
    pub fn from_query(value: Option<&str>) -> Self {
        match value.unwrap_or("prob").to_lowercase().as_str() {
            "real" | "psi_real" => WaveComponent::Real,
            "imag" | "imaginary" | "psi_imag" => WaveComponent::Imag,
            _ => WaveComponent::Prob,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WaveComponent::Real => "real",
            WaveComponent::Imag => "imag",
            WaveComponent::Prob => "prob",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            WaveComponent::Real => "Re(psi)",
            WaveComponent::Imag => "Im(psi)",
            WaveComponent::Prob => "|psi|^2",
        }
    }
}

/// Pointwise combination of radial values and harmonic values.
pub fn combine(component: WaveComponent, radial: &[f64], angular: &[Complex64]) -> Vec<f64> {
    radial
        .iter()
        .zip(angular)
        .map(|(&r, y)| match component {
            WaveComponent::Real => r * y.re,
            WaveComponent::Imag => r * y.im,
            WaveComponent::Prob => (r * r) * (y.re * y.re + y.im * y.im),
        })
        .collect()
}

/// One of Re psi, Im psi, |psi|^2 over the broadcast of (r, theta, phi).
pub fn evaluate(
    engine: &mut Engine,
    component: WaveComponent,
    qn: QuantumNumbers,
    z: f64,
    r: &[f64],
    theta: &[f64],
    phi: &[f64],
) -> EngineResult<Vec<f64>> {
    let len = broadcast_len(&[r.len(), theta.len(), phi.len()]).ok_or(
        EngineError::LengthMismatch {
            r: r.len(),
            theta: theta.len(),
            phi: phi.len(),
        },
    )?;
    let r_full: Vec<f64> = (0..len).map(|i| broadcast_at(r, i)).collect();
    let theta_full: Vec<f64> = (0..len).map(|i| broadcast_at(theta, i)).collect();
    let phi_full: Vec<f64> = (0..len).map(|i| broadcast_at(phi, i)).collect();

    let radial = engine.radial(qn.n, qn.l, &r_full, z)?;
    let angular = harmonic(qn.l, qn.m_l, &theta_full, &phi_full)?;
    Ok(combine(component, &radial, &angular))
}

pub fn psi_real(
    engine: &mut Engine,
    qn: QuantumNumbers,
    r: &[f64],
    theta: &[f64],
    phi: &[f64],
) -> EngineResult<Vec<f64>> {
    evaluate(engine, WaveComponent::Real, qn, 1.0, r, theta, phi)
}

pub fn psi_imag(
    engine: &mut Engine,
    qn: QuantumNumbers,
    r: &[f64],
    theta: &[f64],
    phi: &[f64],
) -> EngineResult<Vec<f64>> {
    evaluate(engine, WaveComponent::Imag, qn, 1.0, r, theta, phi)
}

pub fn psi_prob(
    engine: &mut Engine,
    qn: QuantumNumbers,
    r: &[f64],
    theta: &[f64],
    phi: &[f64],
) -> EngineResult<Vec<f64>> {
    evaluate(engine, WaveComponent::Prob, qn, 1.0, r, theta, phi)
}

/// True when every value is within `atol` of zero, e.g. Im psi for m = 0.
pub fn is_identically_zero(values: &[f64], atol: f64) -> bool {
    values.iter().all(|v| v.abs() <= atol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::physics::radial::radial_wavefunction;
    use crate::physics::spherical::spherical_harmonic;

    fn points() -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let r = vec![0.0, 0.4, 1.3, 4.0, 9.5, 17.0];
        let theta = vec![0.1, 0.8, 1.5, 2.2, 2.9, 3.1];
        let phi = vec![0.0, 1.0, 2.5, 3.7, 5.1, 6.2];
        (r, theta, phi)
    }

    #[test]
    fn components_match_pointwise_products() {
        let mut engine = Engine::new(EngineConfig::default());
        let qn = QuantumNumbers::new(3, 2, 1).unwrap();
        let (r, theta, phi) = points();

        let re = psi_real(&mut engine, qn, &r, &theta, &phi).unwrap();
        let im = psi_imag(&mut engine, qn, &r, &theta, &phi).unwrap();
        let prob = psi_prob(&mut engine, qn, &r, &theta, &phi).unwrap();
        let radial = radial_wavefunction(3, 2, &r, 1.0).unwrap();

        for i in 0..r.len() {
            let y = spherical_harmonic(2, 1, theta[i], phi[i]);
            let tol = 1e-6 * radial[i].abs().max(1e-3);
            assert!((re[i] - radial[i] * y.re).abs() < tol);
            assert!((im[i] - radial[i] * y.im).abs() < tol);
            assert!((prob[i] - (re[i] * re[i] + im[i] * im[i])).abs() < 1e-9);
        }
    }

    #[test]
    fn probability_is_never_negative() {
        let mut engine = Engine::new(EngineConfig::default());
        let (r, theta, phi) = points();
        for qn in crate::physics::all_states(4) {
            let prob = psi_prob(&mut engine, qn, &r, &theta, &phi).unwrap();
            assert!(prob.iter().all(|&p| p >= 0.0), "{qn:?}");
        }
    }

    #[test]
    fn imaginary_part_vanishes_for_zero_order() {
        let mut engine = Engine::new(EngineConfig::default());
        let qn = QuantumNumbers::new(4, 3, 0).unwrap();
        let (r, theta, phi) = points();
        let im = psi_imag(&mut engine, qn, &r, &theta, &phi).unwrap();
        assert!(is_identically_zero(&im, 1e-14));

        let qn = QuantumNumbers::new(4, 3, 2).unwrap();
        let im = psi_imag(&mut engine, qn, &r, &theta, &phi).unwrap();
        assert!(!is_identically_zero(&im, 1e-14));
    }

    #[test]
    fn scalar_angles_broadcast_against_radii() {
        let mut engine = Engine::new(EngineConfig::default());
        let qn = QuantumNumbers::new(2, 1, 0).unwrap();
        let r = [1.0, 2.0, 3.0, 4.0];
        let values = psi_real(&mut engine, qn, &r, &[0.0], &[0.0]).unwrap();
        assert_eq!(values.len(), 4);

        let err = psi_real(&mut engine, qn, &r, &[0.0, 1.0], &[0.0]).unwrap_err();
        assert_eq!(
            err,
            EngineError::LengthMismatch {
                r: 4,
                theta: 2,
                phi: 1
            }
        );
    }

    #[test]
    fn component_names_parse_from_queries() {
        assert_eq!(WaveComponent::from_query(Some("REAL")), WaveComponent::Real);
        assert_eq!(WaveComponent::from_query(Some("psi_imag")), WaveComponent::Imag);
        assert_eq!(WaveComponent::from_query(None), WaveComponent::Prob);
        let parsed: WaveComponent = serde_json::from_str("\"imaginary\"").unwrap();
        assert_eq!(parsed, WaveComponent::Imag);
    }
}
