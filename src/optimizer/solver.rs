//! Boundary between the formulators and the MILP backend.
//!
//! good_lp does not expose solver time limits in a portable way, so the
//! budget is enforced from outside: each solve runs on its own thread and
//! the caller waits on a channel with a deadline. A solve that misses the
//! deadline is reported as [`SolveError::TimedOut`]; the worker thread is
//! left to finish in the background and its late result is dropped.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use good_lp::ResolutionError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SolveError;

/// Wall-clock budget applied to every individual solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Budget per solve in seconds
    pub timeout_seconds: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { timeout_seconds: 120 }
    }
}

impl SolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Runs `build_and_solve` on a watchdog thread and waits at most the
/// configured budget for its result.
pub(crate) fn solve_with_timeout<T, F>(
    config: &SolverConfig,
    label: &str,
    build_and_solve: F,
) -> Result<T, SolveError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SolveError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker = thread::Builder::new()
        .name(format!("solve-{label}"))
        .spawn(move || {
            // The receiver may be gone after a timeout; a failed send
            // just means nobody is waiting any more.
            let _ = tx.send(build_and_solve());
        })
        .map_err(|e| SolveError::Backend(format!("cannot spawn solver thread: {e}")))?;

    match rx.recv_timeout(config.timeout()) {
        Ok(result) => {
            let _ = worker.join();
            result
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(label, timeout_seconds = config.timeout_seconds, "solve exceeded its budget");
            Err(SolveError::TimedOut)
        }
        Err(RecvTimeoutError::Disconnected) => {
            let _ = worker.join();
            Err(SolveError::Backend(
                "solver thread exited without a result".to_string(),
            ))
        }
    }
}

/// Maps the backend's resolution status onto the solve-outcome taxonomy.
pub(crate) fn map_resolution_error(err: ResolutionError) -> SolveError {
    match err {
        ResolutionError::Infeasible => SolveError::Infeasible,
        ResolutionError::Unbounded => SolveError::Unbounded,
        other => SolveError::Backend(other.to_string()),
    }
}
