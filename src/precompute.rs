//! Background computation of the full Laguerre table.
//!
//! The worker owns its request and its result. Its only link to the engine
//! is a one-shot channel: it sends the finished table once and exits, or
//! notices the receiver is gone and stops early.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::debug;

use crate::config::EngineConfig;
use crate::physics::laguerre::LaguerreTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecomputeRequest {
    pub max_n: u32,
    pub rho_max: f64,
    pub points: usize,
}

impl PrecomputeRequest {
    pub fn from_config(config: &EngineConfig) -> Self {
        PrecomputeRequest {
            max_n: config.max_n,
            rho_max: config.laguerre.rho_max,
            points: config.laguerre.points,
        }
    }
}

pub fn spawn(request: PrecomputeRequest) -> io::Result<PrecomputeHandle> {
    let (sender, receiver) = oneshot::channel();
    let thread = thread::Builder::new()
        .name("laguerre-precompute".into())
        .spawn(move || {
            let started = Instant::now();
            let table = LaguerreTable::compute(request.max_n, request.rho_max, request.points, || {
                sender.is_closed()
            });
            let Some(table) = table else {
                debug!("laguerre precompute cancelled");
                return;
            };
            let keys = table.len();
            match sender.send(table) {
                Ok(()) => debug!(
                    keys,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "laguerre table sent"
                ),
                Err(_) => debug!("laguerre table discarded, receiver dropped"),
            }
        })?;
    Ok(PrecomputeHandle { receiver, thread })
}

#[derive(Debug)]
pub enum PrecomputeStatus {
    Pending,
    Ready(LaguerreTable),
    /// The worker exited without delivering, or the table was already taken.
    Disconnected,
}

/// Receiving end of a running precompute. Dropping it cancels the worker.
#[derive(Debug)]
pub struct PrecomputeHandle {
    receiver: oneshot::Receiver<LaguerreTable>,
    thread: JoinHandle<()>,
}

impl PrecomputeHandle {
    /// Non-blocking poll.
    pub fn try_take(&mut self) -> PrecomputeStatus {
        match self.receiver.try_recv() {
            Ok(table) => PrecomputeStatus::Ready(table),
            Err(TryRecvError::Empty) => PrecomputeStatus::Pending,
            Err(TryRecvError::Closed) => PrecomputeStatus::Disconnected,
        }
    }

    /// Blocks until the worker delivers or exits. Not for use inside an async runtime.
    pub fn wait(self) -> Option<LaguerreTable> {
        self.receiver.blocking_recv().ok()
    }

    /// Closes the channel; the worker stops before its next key.
    pub fn cancel(&mut self) {
        self.receiver.close();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
