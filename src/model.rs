//! Job and result records as the store hands them to a worker.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Store identifier of a job.
pub type JobId = i64;

/// Store identifier of a result.
pub type ResultId = i64;

/// Lifecycle status of a job or result.
///
/// The store may define more statuses than the ones named here. Unknown
/// tokens are kept verbatim in `Other` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Pending,
    Running,
    Completed,
    Error,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        match status {
            Status::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shape, chunking and element type of a result, filled in as workers
/// observe the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDescriptor {
    pub id: ResultId,
    #[serde(default)]
    pub base_name: Option<String>,
    #[serde(default)]
    pub shape: Option<Vec<u64>>,
    #[serde(default)]
    pub chunk: Option<Vec<u64>>,
    #[serde(default)]
    pub dtype: Option<String>,
}

impl ResultDescriptor {
    /// A descriptor with only its id set.
    pub fn new(id: ResultId) -> Self {
        Self {
            id,
            base_name: None,
            shape: None,
            chunk: None,
            dtype: None,
        }
    }

    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Self {
        self.base_name = Some(base_name.into());
        self
    }

    pub fn with_chunk(mut self, chunk: Vec<u64>) -> Self {
        self.chunk = Some(chunk);
        self
    }

    /// Fold a newly observed shape and dtype into this descriptor.
    ///
    /// `base_name` and `chunk` are only filled when unset; `chunk` falls back
    /// to the observed shape. `shape` and `dtype` always take the new values.
    pub fn merge_observed(&mut self, shape: &[u64], dtype: &str, source: &ResultDescriptor) {
        if self.base_name.is_none() {
            self.base_name = source.base_name.clone();
        }
        self.shape = Some(shape.to_vec());
        if self.chunk.is_none() {
            self.chunk = Some(shape.to_vec());
        }
        self.dtype = Some(dtype.to_string());
    }
}

/// Stored metadata of a single result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub descriptor: ResultDescriptor,
}

impl ResultMetadata {
    pub fn new(descriptor: ResultDescriptor) -> Self {
        Self { descriptor }
    }
}

/// A result record as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StoredResult {
    /// One combined result or sub-result.
    Single(ResultMetadata),
    /// A list of result records. Not eligible for descriptor merges.
    Collection(Vec<ResultMetadata>),
}

/// A job as handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// The job's combined result.
    pub result_id: ResultId,
    /// Sub-results keyed by name.
    #[serde(default)]
    pub result_descriptors: HashMap<String, ResultDescriptor>,
}

impl Job {
    pub fn new(id: JobId, result_id: ResultId) -> Self {
        Self {
            id,
            result_id,
            result_descriptors: HashMap::new(),
        }
    }

    pub fn with_sub_result(mut self, name: impl Into<String>, descriptor: ResultDescriptor) -> Self {
        self.result_descriptors.insert(name.into(), descriptor);
        self
    }
}
