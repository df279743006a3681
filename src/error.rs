//! Error types for Startgate
//!
//! Two families of failures exist during a startup run:
//!
//! - [`StartupError`]: structural or ambient failures that abort the whole
//!   call (cyclic graph, unorderable graph, bad config, I/O).
//! - [`ServiceError`]: failures of a single service's init, liveness or
//!   readiness step. These never escape `initialize`; the orchestrator turns
//!   them into `failed` entries of the status snapshot.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Per-service failures
// ============================================================================

/// Failure of one step of bringing a single service up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The init routine reported failure.
    #[error("init failed: {0}")]
    Init(String),

    /// The init routine did not finish within the configured bound.
    #[error("init timed out after {0:?}")]
    InitTimeout(Duration),

    /// The liveness check did not pass.
    #[error("liveness check failed: {0}")]
    Liveness(String),

    /// One or more readiness sub-checks did not pass.
    #[error("readiness check failed: {0}")]
    Readiness(String),
}

impl ServiceError {
    /// Short machine-friendly label for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            ServiceError::Init(_) | ServiceError::InitTimeout(_) => "init",
            ServiceError::Liveness(_) => "liveness",
            ServiceError::Readiness(_) => "readiness",
        }
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for Startgate operations.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Validation found at least one dependency cycle. Nothing was started.
    #[error("dependency graph is cyclic: {}", format_cycles(.cycles))]
    InvalidGraph { cycles: Vec<Vec<String>> },

    /// Topological sort could not place every node (cycle or dangling edge).
    #[error("dependency graph cannot be fully ordered: placed {ordered} of {total} services")]
    Unorderable { ordered: usize, total: usize },

    /// Two nodes share the same identifier.
    #[error("duplicate service id: {0}")]
    DuplicateService(String),

    /// Configuration-related errors (invalid manifest, bad values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Lifecycle bus delivery problems (buffer full, etc.)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Lifecycle bus receiver dropped
    #[error("Bus error: channel closed")]
    BusClosed,
}

/// A specialized `Result` type for Startgate operations.
pub type Result<T> = std::result::Result<T, StartupError>;

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| cycle.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}
