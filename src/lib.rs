//! Numerical engine for hydrogen-like orbitals: radial functions, spherical
//! harmonics, psi = R * Y, and Monte Carlo sampling of |psi|^2.

pub mod config;
pub mod engine;
pub mod error;
pub mod physics;
pub mod precompute;

pub use config::EngineConfig;
pub use engine::{Engine, RadialProfile};
pub use error::{ConfigError, EngineError, EngineResult};
pub use physics::sampler::{OrbitalSampler, Sample};
pub use physics::wave::WaveComponent;
pub use physics::QuantumNumbers;
