//! Shared helpers for integration tests: a store wrapper that records every
//! write in call order and can be told to fail on chosen ids.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use analytics_worker::error::StoreError;
use analytics_worker::events::BroadcastSink;
use analytics_worker::model::{Job, JobId, ResultId, ResultMetadata, Status, StoredResult};
use analytics_worker::store::{LibSqlStore, Store};
use analytics_worker::worker::WorkerDeps;

/// A store write as seen by the wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    JobStatus(JobId, Status),
    ResultStatus(ResultId, Status),
    Result(ResultId),
}

/// In-memory libSQL store that logs writes and injects failures.
pub struct RecordingStore {
    inner: LibSqlStore,
    writes: Mutex<Vec<Write>>,
    failing_results: Mutex<HashSet<ResultId>>,
    unreadable_results: Mutex<HashSet<ResultId>>,
}

impl RecordingStore {
    pub async fn new() -> Self {
        Self {
            inner: LibSqlStore::new_memory().await.unwrap(),
            writes: Mutex::new(Vec::new()),
            failing_results: Mutex::new(HashSet::new()),
            unreadable_results: Mutex::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &LibSqlStore {
        &self.inner
    }

    /// Writes so far, in call order.
    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Make every status write to `result_id` fail.
    pub fn fail_result(&self, result_id: ResultId) {
        self.failing_results.lock().unwrap().insert(result_id);
    }

    /// Make every status read of `result_id` fail. Writes still land.
    pub fn fail_result_reads(&self, result_id: ResultId) {
        self.unreadable_results.lock().unwrap().insert(result_id);
    }

    fn check(&self, result_id: ResultId) -> Result<(), StoreError> {
        if self.failing_results.lock().unwrap().contains(&result_id) {
            return Err(StoreError::Query(format!("injected failure for {result_id}")));
        }
        Ok(())
    }

    fn record(&self, write: Write) {
        self.writes.lock().unwrap().push(write);
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn get_job_status(&self, job_id: JobId) -> Result<Status, StoreError> {
        self.inner.get_job_status(job_id).await
    }

    async fn set_job_status(&self, job_id: JobId, status: Status) -> Result<(), StoreError> {
        self.inner.set_job_status(job_id, status.clone()).await?;
        self.record(Write::JobStatus(job_id, status));
        Ok(())
    }

    async fn get_result_status(&self, result_id: ResultId) -> Result<Status, StoreError> {
        if self.unreadable_results.lock().unwrap().contains(&result_id) {
            return Err(StoreError::Query(format!("injected read failure for {result_id}")));
        }
        self.inner.get_result_status(result_id).await
    }

    async fn set_result_status(
        &self,
        result_id: ResultId,
        status: Status,
    ) -> Result<(), StoreError> {
        self.check(result_id)?;
        self.inner
            .set_result_status(result_id, status.clone())
            .await?;
        self.record(Write::ResultStatus(result_id, status));
        Ok(())
    }

    async fn get_result(&self, result_id: ResultId) -> Result<StoredResult, StoreError> {
        self.inner.get_result(result_id).await
    }

    async fn update_result(
        &self,
        result_id: ResultId,
        metadata: &ResultMetadata,
    ) -> Result<(), StoreError> {
        self.inner.update_result(result_id, metadata).await?;
        self.record(Write::Result(result_id));
        Ok(())
    }
}

/// A recording store seeded with `job` and its results, plus worker deps
/// publishing to a broadcast sink.
pub async fn seeded(job: &Job) -> (Arc<RecordingStore>, WorkerDeps, BroadcastSink) {
    let store = Arc::new(RecordingStore::new().await);
    store.inner().insert_job_with_results(job).await.unwrap();
    let sink = BroadcastSink::new(64);
    let deps = WorkerDeps::new(store.clone(), Arc::new(sink.clone()), "AnalyticsWorker");
    (store, deps, sink)
}
