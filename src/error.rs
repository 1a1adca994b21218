//! Error types for the analytics worker.

use crate::model::{JobId, ResultId};

/// Top-level error type for a worker run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Store-related errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Which half of the job lifecycle was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Start,
    Finish,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Finish => write!(f, "finish"),
        }
    }
}

/// The step of a job start/finish sequence that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleStep {
    /// Writing the job's own status.
    JobStatus,
    /// Transitioning the combined result.
    CombinedResult { result_id: ResultId },
    /// Transitioning a named sub-result.
    SubResult { name: String, result_id: ResultId },
}

impl std::fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JobStatus => write!(f, "job status"),
            Self::CombinedResult { result_id } => write!(f, "combined result {result_id}"),
            Self::SubResult { name, result_id } => {
                write!(f, "sub-result {name:?} ({result_id})")
            }
        }
    }
}

/// Job/result lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// A start/finish sequence failed partway. Transitions counted in
    /// `applied` stay persisted; nothing is rolled back.
    #[error("Job {job_id} {phase} failed at {step} after {applied} transition(s): {source}")]
    Partial {
        job_id: JobId,
        phase: LifecyclePhase,
        step: LifecycleStep,
        applied: usize,
        #[source]
        source: StoreError,
    },

    /// The first write of a sequence failed; nothing was changed.
    #[error(transparent)]
    Store(StoreError),

    #[error("No job is bound to this worker")]
    NotBound,
}

/// Descriptor merge errors.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("Invalid operation: result {result_id} is a result list, not single metadata")]
    InvalidOperation { result_id: ResultId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for the worker.
pub type Result<T> = std::result::Result<T, Error>;
