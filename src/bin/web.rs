use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use orbital_engine::physics::sampler::assign_shells;
use orbital_engine::physics::spherical::{harmonic, has_nonzero_imag, spherical_grid};
use orbital_engine::physics::wave::{self, combine, is_identically_zero};
use orbital_engine::physics::{all_states, l_to_letter};
use orbital_engine::{Engine, EngineConfig, EngineError, QuantumNumbers, WaveComponent};

const CONFIG_ENV: &str = "ORBITAL_ENGINE_CONFIG";
const ADDR_ENV: &str = "ORBITAL_ENGINE_ADDR";
const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_SAMPLE_COUNT: usize = 200_000;
const SAMPLE_COUNT_STEP: usize = 10_000;

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<Engine>>,
}

#[derive(Debug)]
enum ApiError {
    Engine(EngineError),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Engine(err) => err.to_string(),
            ApiError::Internal(message) => {
                error!(%message, "request failed");
                message
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Runs `f` on the blocking pool with the engine locked, after polling the
/// precompute worker.
async fn with_engine<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Engine) -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    tokio::task::spawn_blocking(move || {
        // A panic in an earlier request leaves the engine itself consistent.
        let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
        engine.poll_precompute();
        f(&mut engine).map_err(ApiError::from)
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))?
}

fn check_served(engine: &Engine, n: u32) -> Result<(), EngineError> {
    let max_n = engine.config().max_n;
    if n > max_n {
        return Err(EngineError::PrincipalOutOfRange { n, max_n });
    }
    Ok(())
}

/// Largest sample count offered for principal quantum number `n`.
fn sample_count_limit(n: u32) -> usize {
    let raw = (200_000 + 200_000 * n as usize).max(SAMPLE_COUNT_STEP);
    raw / SAMPLE_COUNT_STEP * SAMPLE_COUNT_STEP
}

#[derive(Deserialize)]
struct StatesQuery {
    max_n: Option<u32>,
}

#[derive(Serialize)]
struct StateInfo {
    n: u32,
    l: u32,
    m: i32,
    orbital: String,
    label: String,
}

async fn states(
    State(state): State<AppState>,
    Query(q): Query<StatesQuery>,
) -> Result<Json<Vec<StateInfo>>, ApiError> {
    let out = with_engine(&state, move |engine| {
        let limit = engine.config().max_n;
        let max_n = q.max_n.unwrap_or(limit).clamp(1, limit);
        Ok(all_states(max_n)
            .into_iter()
            .map(|qn| StateInfo {
                n: qn.n,
                l: qn.l,
                m: qn.m_l,
                orbital: format!("{}{}", qn.n, l_to_letter(qn.l)),
                label: qn.label(),
            })
            .collect())
    })
    .await?;
    Ok(Json(out))
}

#[derive(Deserialize)]
struct RadialQuery {
    n: Option<u32>,
    l: Option<u32>,
    z: Option<f64>,
}

#[derive(Debug, Serialize)]
struct RadialResponse {
    n: u32,
    l: u32,
    z: f64,
    r: Vec<f64>,
    radial: Vec<f64>,
    probability: Vec<f64>,
    shells: Vec<f64>,
}

async fn radial(
    State(state): State<AppState>,
    Query(q): Query<RadialQuery>,
) -> Result<Json<RadialResponse>, ApiError> {
    let n = q.n.unwrap_or(1);
    let l = q.l.unwrap_or(0);
    let z = q.z.unwrap_or(1.0);
    let out = with_engine(&state, move |engine| {
        check_served(engine, n)?;
        let profile = engine.radial_with_grid(n, l, z)?;
        let shells = engine.shell_radii(n, l, z)?;
        Ok(RadialResponse {
            n,
            l,
            z,
            r: profile.r,
            radial: profile.radial,
            probability: profile.probability,
            shells,
        })
    })
    .await?;
    Ok(Json(out))
}

#[derive(Deserialize)]
struct HarmonicQuery {
    l: Option<u32>,
    m: Option<i32>,
    component: Option<String>,
}

#[derive(Serialize)]
struct HarmonicResponse {
    l: u32,
    m: i32,
    component: &'static str,
    theta_points: usize,
    phi_points: usize,
    theta: Vec<f64>,
    phi: Vec<f64>,
    values: Option<Vec<f64>>,
    imag_is_zero: bool,
}

async fn harmonic_surface(
    State(state): State<AppState>,
    Query(q): Query<HarmonicQuery>,
) -> Result<Json<HarmonicResponse>, ApiError> {
    let l = q.l.unwrap_or(0);
    let m = q.m.unwrap_or(0);
    let component = match WaveComponent::from_query(q.component.as_deref()) {
        WaveComponent::Imag => WaveComponent::Imag,
        _ => WaveComponent::Real,
    };
    let out = with_engine(&state, move |engine| {
        let angular = engine.config().angular.clone();
        let grid = spherical_grid(angular.theta_points, angular.phi_points);
        let ys = harmonic(l, m, &grid.theta, &grid.phi)?;
        let imag_is_zero = !has_nonzero_imag(l, m);
        let values = if component == WaveComponent::Imag && imag_is_zero {
            None
        } else {
            Some(combine(component, &vec![1.0; ys.len()], &ys))
        };
        Ok(HarmonicResponse {
            l,
            m,
            component: component.as_str(),
            theta_points: grid.theta_points,
            phi_points: grid.phi_points,
            theta: grid.theta,
            phi: grid.phi,
            values,
            imag_is_zero,
        })
    })
    .await?;
    Ok(Json(out))
}

#[derive(Deserialize)]
struct SampleQuery {
    n: Option<u32>,
    l: Option<u32>,
    m: Option<i32>,
    z: Option<f64>,
    count: Option<usize>,
    mode: Option<String>,
}

#[derive(Serialize)]
struct SampleResponse {
    n: u32,
    l: u32,
    m: i32,
    z: f64,
    label: String,
    count: usize,
    mode: &'static str,
    title: &'static str,
    cutoff_radius: f64,
    shells: Vec<f64>,
    samples: Vec<[f64; 3]>,
    values: Option<Vec<f64>>,
    shell_index: Vec<usize>,
}

async fn samples(
    State(state): State<AppState>,
    Query(q): Query<SampleQuery>,
) -> Result<Json<SampleResponse>, ApiError> {
    let qn = QuantumNumbers::new(q.n.unwrap_or(2), q.l.unwrap_or(1), q.m.unwrap_or(0))?;
    let z = q.z.unwrap_or(1.0);
    let count = q
        .count
        .unwrap_or(DEFAULT_SAMPLE_COUNT)
        .min(sample_count_limit(qn.n));
    let mode = WaveComponent::from_query(q.mode.as_deref());

    let out = with_engine(&state, move |engine| {
        check_served(engine, qn.n)?;
        let sampler = engine.sampler(qn, z)?;
        let drawn = sampler.sample(count);

        let r: Vec<f64> = drawn.iter().map(|s| s.r).collect();
        let theta: Vec<f64> = drawn.iter().map(|s| s.theta).collect();
        let phi: Vec<f64> = drawn.iter().map(|s| s.phi).collect();
        let values = if drawn.is_empty() {
            Vec::new()
        } else {
            wave::evaluate(engine, mode, qn, z, &r, &theta, &phi)?
        };
        // An identically-zero field carries nothing worth plotting.
        let values = (!is_identically_zero(&values, 1e-12)).then_some(values);

        Ok(SampleResponse {
            n: qn.n,
            l: qn.l,
            m: qn.m_l,
            z,
            label: qn.label(),
            count: drawn.len(),
            mode: mode.as_str(),
            title: mode.title(),
            cutoff_radius: sampler.cutoff_radius(),
            shells: sampler.shells().to_vec(),
            shell_index: assign_shells(&r, sampler.shells()),
            samples: drawn.iter().map(|s| s.position()).collect(),
            values,
        })
    })
    .await?;
    info!(label = %out.label, count = out.count, "samples served");
    Ok(Json(out))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    precomputed: bool,
    pending: bool,
    cached_keys: usize,
    max_n: u32,
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let out = with_engine(&state, |engine| {
        Ok(StatusResponse {
            precomputed: engine.precomputed_table().is_some(),
            pending: engine.is_precompute_pending(),
            cached_keys: engine.laguerre_cache().len(),
            max_n: engine.config().max_n,
        })
    })
    .await?;
    Ok(Json(out))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/states", get(states))
        .route("/radial", get(radial))
        .route("/harmonic", get(harmonic_surface))
        .route("/samples", get(samples))
        .route("/status", get(status))
        .with_state(state)
}

fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let config = EngineConfig::from_json_file(&path)
                .with_context(|| format!("loading {}", path.to_string_lossy()))?;
            info!(path = %path.to_string_lossy(), "configuration loaded");
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let state = AppState {
        engine: Arc::new(Mutex::new(Engine::with_background_precompute(config))),
    };
    let app = router(state);

    let addr: SocketAddr = std::env::var(ADDR_ENV)
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .context("parsing bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "serving orbital engine");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_limit_grows_with_n() {
        assert_eq!(sample_count_limit(1), 400_000);
        assert_eq!(sample_count_limit(2), 600_000);
        assert_eq!(sample_count_limit(7), 1_600_000);
        assert_eq!(sample_count_limit(0) % SAMPLE_COUNT_STEP, 0);
    }

    #[test]
    fn engine_errors_are_client_errors() {
        let err = ApiError::from(EngineError::InvalidCharge(-1.0));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn requests_poll_and_report_status() {
        let state = AppState {
            engine: Arc::new(Mutex::new(Engine::new(EngineConfig::default()))),
        };
        let Json(out) = status(State(state.clone())).await.unwrap();
        assert!(!out.precomputed);
        assert!(!out.pending);
        assert_eq!(out.max_n, 7);

        let query = RadialQuery {
            n: Some(2),
            l: Some(1),
            z: None,
        };
        let Json(profile) = radial(State(state.clone()), Query(query)).await.unwrap();
        assert_eq!(profile.shells.len(), 1);

        let query = RadialQuery {
            n: Some(2),
            l: Some(2),
            z: None,
        };
        let err = radial(State(state), Query(query)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    fn test_state() -> AppState {
        AppState {
            engine: Arc::new(Mutex::new(Engine::new(EngineConfig::default()))),
        }
    }

    #[tokio::test]
    async fn principal_numbers_past_max_n_are_rejected() {
        let state = test_state();
        let query = RadialQuery {
            n: Some(60_000),
            l: Some(0),
            z: None,
        };
        let err = radial(State(state.clone()), Query(query)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(matches!(
            err,
            ApiError::Engine(EngineError::PrincipalOutOfRange { n: 60_000, max_n: 7 })
        ));

        let query = SampleQuery {
            n: Some(70_000),
            l: Some(0),
            m: Some(0),
            z: None,
            count: Some(10),
            mode: None,
        };
        let err = samples(State(state), Query(query)).await.err().unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn a_panicked_request_does_not_wedge_the_service() {
        let state = test_state();
        let engine = Arc::clone(&state.engine);
        let crashed = std::thread::spawn(move || {
            let _guard = engine.lock().unwrap();
            panic!("request handler crashed");
        })
        .join();
        assert!(crashed.is_err());
        assert!(state.engine.is_poisoned());

        let Json(out) = status(State(state.clone())).await.unwrap();
        assert_eq!(out.max_n, 7);
        let query = RadialQuery {
            n: Some(1),
            l: Some(0),
            z: None,
        };
        let Json(profile) = radial(State(state), Query(query)).await.unwrap();
        assert_eq!(profile.shells.len(), 1);
    }
}
