//! Job and result status sequencing.
//!
//! Start order: job, combined result, sub-results.
//! Finish order: sub-results, combined result, job. A reader polling the
//! combined result never sees it completed while a sub-result is still
//! running.
//!
//! A failing status write stops the sequence. Whatever was already written
//! stays written; the error says which step failed and how many
//! transitions went through. If the very first write fails nothing changed,
//! and the store error comes back as is.
//!
//! The read-back after each write only feeds the emitted event. When it
//! fails the event carries the status that was written.

use tracing::warn;

use crate::error::{LifecycleError, LifecyclePhase, LifecycleStep, StoreError};
use crate::model::{Job, JobId, ResultId, Status};
use crate::worker::worker::WorkerDeps;

/// Transitions a single result.
#[derive(Clone)]
pub struct ResultLifecycle {
    deps: WorkerDeps,
}

impl ResultLifecycle {
    pub fn new(deps: WorkerDeps) -> Self {
        Self { deps }
    }

    /// Set the result to running. Returns the status read back from the store,
    /// or `Running` if the read-back failed.
    pub async fn start(
        &self,
        job_id: Option<JobId>,
        result_id: ResultId,
    ) -> Result<Status, StoreError> {
        self.transition(job_id, result_id, Status::Running).await
    }

    /// Set the result to completed. Same read-back rule as `start`.
    pub async fn finish(
        &self,
        job_id: Option<JobId>,
        result_id: ResultId,
    ) -> Result<Status, StoreError> {
        self.transition(job_id, result_id, Status::Completed).await
    }

    async fn transition(
        &self,
        job_id: Option<JobId>,
        result_id: ResultId,
        status: Status,
    ) -> Result<Status, StoreError> {
        let store = &self.deps.store;
        store.set_result_status(result_id, status.clone()).await?;
        let current = match store.get_result_status(result_id).await {
            Ok(current) => current,
            Err(e) => {
                warn!(result_id, error = %e, "Result status read-back failed");
                status
            }
        };
        self.deps.emit(job_id, Some(result_id), current.clone());
        Ok(current)
    }
}

/// Transitions a job together with all of its results.
#[derive(Clone)]
pub struct JobLifecycle {
    deps: WorkerDeps,
    results: ResultLifecycle,
}

impl JobLifecycle {
    pub fn new(deps: WorkerDeps) -> Self {
        Self {
            results: ResultLifecycle::new(deps.clone()),
            deps,
        }
    }

    pub fn results(&self) -> &ResultLifecycle {
        &self.results
    }

    /// Mark the job running, then its combined result, then every sub-result.
    pub async fn start(&self, job: &Job) -> Result<(), LifecycleError> {
        let phase = LifecyclePhase::Start;
        let mut applied = 0;

        self.set_job_status(job.id, Status::Running)
            .await
            .map_err(|e| partial(job, phase, LifecycleStep::JobStatus, applied, e))?;
        applied += 1;

        self.results
            .start(Some(job.id), job.result_id)
            .await
            .map_err(|e| partial(job, phase, combined(job), applied, e))?;
        applied += 1;

        for (name, descriptor) in &job.result_descriptors {
            self.results
                .start(Some(job.id), descriptor.id)
                .await
                .map_err(|e| partial(job, phase, sub_result(name, descriptor.id), applied, e))?;
            applied += 1;
        }

        Ok(())
    }

    /// Complete every sub-result, then the combined result, then the job.
    pub async fn finish(&self, job: &Job) -> Result<(), LifecycleError> {
        let phase = LifecyclePhase::Finish;
        let mut applied = 0;

        for (name, descriptor) in &job.result_descriptors {
            self.results
                .finish(Some(job.id), descriptor.id)
                .await
                .map_err(|e| partial(job, phase, sub_result(name, descriptor.id), applied, e))?;
            applied += 1;
        }

        self.results
            .finish(Some(job.id), job.result_id)
            .await
            .map_err(|e| partial(job, phase, combined(job), applied, e))?;
        applied += 1;

        self.set_job_status(job.id, Status::Completed)
            .await
            .map_err(|e| partial(job, phase, LifecycleStep::JobStatus, applied, e))?;

        Ok(())
    }

    async fn set_job_status(&self, job_id: JobId, status: Status) -> Result<(), StoreError> {
        let store = &self.deps.store;
        store.set_job_status(job_id, status.clone()).await?;
        let current = match store.get_job_status(job_id).await {
            Ok(current) => current,
            Err(e) => {
                warn!(job_id, error = %e, "Job status read-back failed");
                status
            }
        };
        self.deps.emit(Some(job_id), None, current);
        Ok(())
    }
}

fn combined(job: &Job) -> LifecycleStep {
    LifecycleStep::CombinedResult {
        result_id: job.result_id,
    }
}

fn sub_result(name: &str, result_id: ResultId) -> LifecycleStep {
    LifecycleStep::SubResult {
        name: name.to_string(),
        result_id,
    }
}

fn partial(
    job: &Job,
    phase: LifecyclePhase,
    step: LifecycleStep,
    applied: usize,
    source: StoreError,
) -> LifecycleError {
    if applied == 0 {
        return LifecycleError::Store(source);
    }
    warn!(
        job_id = job.id,
        %phase,
        %step,
        applied,
        error = %source,
        "Job lifecycle stopped partway"
    );
    LifecycleError::Partial {
        job_id: job.id,
        phase,
        step,
        applied,
        source,
    }
}
