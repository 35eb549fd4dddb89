use std::path::PathBuf;

use thiserror::Error;

/// Errors raised at the call boundary of the numerical engine.
///
/// Numeric underflow/overflow is never reported here: those points are
/// treated as zero density.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid quantum numbers n={n}, l={l}, m={m}: require n >= 1, 0 <= l <= n-1, |m| <= l")]
    InvalidQuantumNumbers { n: u32, l: u32, m: i32 },
    #[error("invalid radial state n={n}, l={l}: require n >= 1 and 0 <= l <= n-1")]
    InvalidRadialState { n: u32, l: u32 },
    #[error("invalid angular state l={l}, m={m}: require |m| <= l")]
    InvalidAngularState { l: u32, m: i32 },
    #[error("inputs do not broadcast: r={r}, theta={theta}, phi={phi}")]
    LengthMismatch { r: usize, theta: usize, phi: usize },
    #[error("nuclear charge must be finite and > 0, got {0}")]
    InvalidCharge(f64),
    #[error("principal quantum number n={n} exceeds the served maximum {max_n}")]
    PrincipalOutOfRange { n: u32, max_n: u32 },
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config field '{field}' {reason}")]
    Invalid { field: &'static str, reason: String },
}
