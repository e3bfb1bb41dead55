//! Error types for metric resolution and series retrieval.
use thiserror::Error;

/// The primary error type for operations within this library.
#[derive(Error, Debug)]
pub enum FinderError {
    /// The requested window starts after it ends.
    #[error("Invalid time interval: from time {start} is after until time {end}")]
    InvalidRange { start: i64, end: i64 },

    /// The requested window starts after the reference clock.
    #[error("Invalid time interval: from time {start} is in the future (now {now})")]
    StartInFuture { start: i64, now: i64 },

    /// Wraps an error raised by the store collaborator.
    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),

    /// A leaf row carries retention or method metadata that cannot be parsed.
    #[error("Invalid retention metadata on row '{row_id}': {reason}")]
    InvalidRetention { row_id: String, reason: String },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The per-fetch scan pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Every tier scan planned for a metric failed.
    #[error("All tier scans failed for metric '{metric}': {}", failures.join("; "))]
    AllTiersFailed {
        metric: String,
        failures: Vec<String>,
    },

    /// Every source of a multi-source read failed.
    #[error("All sub-fetches failed: {}", failures.join("; "))]
    AllSourcesFailed { failures: Vec<String> },
}

/// A convenience type alias for `Result<T, FinderError>`.
pub type Result<T, E = FinderError> = std::result::Result<T, E>;
