//! Worker instance and its job binding.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{DescriptorError, LifecycleError, StoreError};
use crate::events::{EventSink, LifecycleEvent};
use crate::model::{Job, JobId, ResultDescriptor, ResultId, Status};
use crate::store::Store;
use crate::worker::descriptor::DescriptorMerger;
use crate::worker::lifecycle::JobLifecycle;

/// Shared dependencies for the lifecycle controllers.
#[derive(Clone)]
pub struct WorkerDeps {
    pub store: Arc<dyn Store>,
    pub events: Arc<dyn EventSink>,
    /// Instance id, stamped on every event.
    pub worker_id: Uuid,
    /// Component name, e.g. `AnalyticsWorker` or `ExecutionWorker`.
    pub component: String,
}

impl WorkerDeps {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventSink>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            store,
            events,
            worker_id: Uuid::new_v4(),
            component: component.into(),
        }
    }

    pub(crate) fn emit(&self, job_id: Option<JobId>, result_id: Option<ResultId>, status: Status) {
        self.events.emit(&LifecycleEvent {
            worker_id: self.worker_id,
            component: self.component.clone(),
            job_id,
            result_id,
            status,
            at: Utc::now(),
        });
    }
}

/// A worker bound to at most one job at a time.
///
/// The controllers underneath take their target explicitly; `Worker` only
/// remembers which job the bound convenience calls refer to. Rebinding
/// drops the previous job without finishing it.
pub struct Worker {
    deps: WorkerDeps,
    jobs: JobLifecycle,
    merger: DescriptorMerger,
    job: Option<Job>,
}

impl Worker {
    /// Create a new worker, optionally bound to a job.
    pub fn new(deps: WorkerDeps, job: Option<Job>) -> Self {
        Self {
            jobs: JobLifecycle::new(deps.clone()),
            merger: DescriptorMerger::new(deps.store.clone()),
            deps,
            job,
        }
    }

    pub fn worker_id(&self) -> Uuid {
        self.deps.worker_id
    }

    /// The bound job, if any.
    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    /// Bind a job, or clear the binding with `None`.
    pub fn set_job(&mut self, job: Option<Job>) {
        self.job = job;
    }

    /// Id of the bound job; `None` when nothing is bound.
    pub fn job_id(&self) -> Option<JobId> {
        self.job.as_ref().map(|job| job.id)
    }

    fn bound_job(&self) -> Result<&Job, LifecycleError> {
        self.job.as_ref().ok_or(LifecycleError::NotBound)
    }

    /// Start the bound job, its combined result and every sub-result.
    pub async fn job_starts(&self) -> Result<(), LifecycleError> {
        self.jobs.start(self.bound_job()?).await
    }

    /// Finish every sub-result, then the combined result, then the bound job.
    pub async fn job_finishes(&self) -> Result<(), LifecycleError> {
        self.jobs.finish(self.bound_job()?).await
    }

    /// Set one result to running. The bound job id only labels the event.
    pub async fn result_starts(&self, result_id: ResultId) -> Result<Status, StoreError> {
        self.jobs.results().start(self.job_id(), result_id).await
    }

    /// Set one result to completed.
    pub async fn result_finishes(&self, result_id: ResultId) -> Result<Status, StoreError> {
        self.jobs.results().finish(self.job_id(), result_id).await
    }

    /// Merge an observed shape and dtype into the result `descriptor.id`.
    pub async fn update_result_descriptor(
        &self,
        descriptor: &ResultDescriptor,
        shape: &[u64],
        dtype: &str,
    ) -> Result<ResultDescriptor, DescriptorError> {
        self.merger.merge(descriptor.id, shape, dtype, descriptor).await
    }
}
