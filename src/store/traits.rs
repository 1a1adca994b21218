//! `Store` trait: the capability set a worker consumes from the job store.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{JobId, ResultId, ResultMetadata, Status, StoredResult};

/// Backend-agnostic job/result store.
///
/// Every call is atomic at single-record granularity. Nothing here offers
/// multi-call transactions or compare-and-swap. Unknown ids must surface as
/// `StoreError::NotFound`.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Jobs ────────────────────────────────────────────────────────

    /// Read a job's current status.
    async fn get_job_status(&self, job_id: JobId) -> Result<Status, StoreError>;

    /// Overwrite a job's status.
    async fn set_job_status(&self, job_id: JobId, status: Status) -> Result<(), StoreError>;

    // ── Results ─────────────────────────────────────────────────────

    /// Read a result's current status.
    async fn get_result_status(&self, result_id: ResultId) -> Result<Status, StoreError>;

    /// Overwrite a result's status.
    async fn set_result_status(
        &self,
        result_id: ResultId,
        status: Status,
    ) -> Result<(), StoreError>;

    /// Fetch a result record.
    async fn get_result(&self, result_id: ResultId) -> Result<StoredResult, StoreError>;

    /// Replace a result record with single-result metadata.
    async fn update_result(
        &self,
        result_id: ResultId,
        metadata: &ResultMetadata,
    ) -> Result<(), StoreError>;
}
