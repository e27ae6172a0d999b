use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy for a harvest run.
///
/// Quota exhaustion is deliberately absent: it is a scheduling signal
/// absorbed by the rate governor, never an error surfaced to callers.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Network, timeout or provider 5xx that persisted through the bounded
    /// retry budget. Fatal for the run; the active stratum is left
    /// non-Done so a resume retries it.
    #[error("provider request failed after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    /// Provider rejected the query as too broad. Treated as a forced
    /// split by the orchestrator, never shown to the user.
    #[error("query too broad for a single search window")]
    TooBroad,

    /// The checkpoint file exists but cannot be parsed. Fatal at startup:
    /// the run refuses to silently re-harvest or silently skip.
    #[error("checkpoint file {path:?} is corrupt at line {line}: {reason}")]
    CheckpointCorrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("checkpoint io error: {0}")]
    CheckpointIo(#[from] io::Error),

    /// The persistence sink failed to store a record. The affected stratum
    /// is left non-Done and reported at exit; the run continues.
    #[error("persistence write failed: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
