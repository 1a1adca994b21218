//! libSQL backend: async `Store` trait implementation.
//!
//! Supports local file and in-memory databases. Result records are kept as
//! a tagged JSON document so both single and list-shaped results fit the
//! same table.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::{Job, JobId, ResultDescriptor, ResultId, ResultMetadata, Status, StoredResult};
use crate::store::migrations;
use crate::store::traits::Store;

/// libSQL job store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db)?;
        migrations::run_migrations(store.conn()).await?;
        info!(path = %path.display(), "Job store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to create in-memory database: {e}")))?;

        let store = Self::from_database(db)?;
        migrations::run_migrations(store.conn()).await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Record creation ─────────────────────────────────────────────
    //
    // Jobs and results are normally created by the layer that schedules
    // work. These exist so the binary and tests can seed a store.

    /// Insert a job in `pending` status.
    pub async fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        let descriptors = serde_json::to_string(&job.result_descriptors)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO jobs (id, status, result_id, result_descriptors, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![job.id, Status::Pending.as_str(), job.result_id, descriptors, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_job: {e}")))?;

        debug!(job_id = job.id, result_id = job.result_id, "Job inserted");
        Ok(())
    }

    /// Insert a result record in `pending` status.
    pub async fn insert_result(
        &self,
        result_id: ResultId,
        record: &StoredResult,
    ) -> Result<(), StoreError> {
        let record_json =
            serde_json::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO results (id, status, record, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                params![result_id, Status::Pending.as_str(), record_json, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_result: {e}")))?;

        debug!(result_id, "Result inserted");
        Ok(())
    }

    /// Insert a job together with an empty single-result record for its
    /// combined result and each sub-result.
    pub async fn insert_job_with_results(&self, job: &Job) -> Result<(), StoreError> {
        self.insert_job(job).await?;
        self.insert_result(
            job.result_id,
            &StoredResult::Single(ResultMetadata::new(ResultDescriptor::new(job.result_id))),
        )
        .await?;
        for descriptor in job.result_descriptors.values() {
            self.insert_result(
                descriptor.id,
                &StoredResult::Single(ResultMetadata::new(descriptor.clone())),
            )
            .await?;
        }
        Ok(())
    }

    /// Load a job by id.
    pub async fn get_job(&self, job_id: JobId) -> Result<Job, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT result_id, result_descriptors FROM jobs WHERE id = ?1",
                params![job_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_job: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get_job: {e}")))?
            .ok_or(StoreError::NotFound {
                entity: "job",
                id: job_id,
            })?;

        let result_id: i64 = row
            .get(0)
            .map_err(|e| StoreError::Query(format!("job.result_id: {e}")))?;
        let descriptors_str: String = row
            .get(1)
            .map_err(|e| StoreError::Query(format!("job.result_descriptors: {e}")))?;
        let result_descriptors = serde_json::from_str(&descriptors_str)
            .map_err(|e| StoreError::Serialization(format!("job.result_descriptors: {e}")))?;

        Ok(Job {
            id: job_id,
            result_id,
            result_descriptors,
        })
    }

    async fn get_status(
        &self,
        table: &'static str,
        entity: &'static str,
        id: i64,
    ) -> Result<Status, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT status FROM {table} WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_{entity}_status: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let status: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("{entity}.status: {e}")))?;
                Ok(Status::from(status))
            }
            Ok(None) => Err(StoreError::NotFound { entity, id }),
            Err(e) => Err(StoreError::Query(format!("get_{entity}_status: {e}"))),
        }
    }

    async fn set_status(
        &self,
        table: &'static str,
        entity: &'static str,
        id: i64,
        status: &Status,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                &format!("UPDATE {table} SET status = ?1, updated_at = ?2 WHERE id = ?3"),
                params![status.as_str(), now, id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_{entity}_status: {e}")))?;

        if count == 0 {
            return Err(StoreError::NotFound { entity, id });
        }
        debug!(entity, id, status = %status, "Status updated in DB");
        Ok(())
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Store for LibSqlStore {
    async fn get_job_status(&self, job_id: JobId) -> Result<Status, StoreError> {
        self.get_status("jobs", "job", job_id).await
    }

    async fn set_job_status(&self, job_id: JobId, status: Status) -> Result<(), StoreError> {
        self.set_status("jobs", "job", job_id, &status).await
    }

    async fn get_result_status(&self, result_id: ResultId) -> Result<Status, StoreError> {
        self.get_status("results", "result", result_id).await
    }

    async fn set_result_status(
        &self,
        result_id: ResultId,
        status: Status,
    ) -> Result<(), StoreError> {
        self.set_status("results", "result", result_id, &status)
            .await
    }

    async fn get_result(&self, result_id: ResultId) -> Result<StoredResult, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT record FROM results WHERE id = ?1", params![result_id])
            .await
            .map_err(|e| StoreError::Query(format!("get_result: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get_result: {e}")))?
            .ok_or(StoreError::NotFound {
                entity: "result",
                id: result_id,
            })?;

        let record: String = row
            .get(0)
            .map_err(|e| StoreError::Query(format!("result.record: {e}")))?;
        serde_json::from_str(&record)
            .map_err(|e| StoreError::Serialization(format!("result.record: {e}")))
    }

    async fn update_result(
        &self,
        result_id: ResultId,
        metadata: &ResultMetadata,
    ) -> Result<(), StoreError> {
        let record = serde_json::to_string(&StoredResult::Single(metadata.clone()))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let count = self
            .conn()
            .execute(
                "UPDATE results SET record = ?1, updated_at = ?2 WHERE id = ?3",
                params![record, now, result_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_result: {e}")))?;

        if count == 0 {
            return Err(StoreError::NotFound {
                entity: "result",
                id: result_id,
            });
        }
        debug!(result_id, "Result record updated in DB");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> LibSqlStore {
        LibSqlStore::new_memory().await.unwrap()
    }

    fn make_job() -> Job {
        Job::new(1, 10)
            .with_sub_result("a", ResultDescriptor::new(11).with_base_name("a"))
            .with_sub_result("b", ResultDescriptor::new(12))
    }

    #[tokio::test]
    async fn insert_and_get_job() {
        let store = test_store().await;
        let job = make_job();
        store.insert_job(&job).await.unwrap();

        let fetched = store.get_job(1).await.unwrap();
        assert_eq!(fetched, job);
        assert_eq!(store.get_job_status(1).await.unwrap(), Status::Pending);
    }

    #[tokio::test]
    async fn get_job_not_found() {
        let store = test_store().await;
        let err = store.get_job(99).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn set_and_get_statuses() {
        let store = test_store().await;
        store.insert_job_with_results(&make_job()).await.unwrap();

        store.set_job_status(1, Status::Running).await.unwrap();
        store.set_result_status(11, Status::Completed).await.unwrap();

        assert_eq!(store.get_job_status(1).await.unwrap(), Status::Running);
        assert_eq!(store.get_result_status(11).await.unwrap(), Status::Completed);
        assert_eq!(store.get_result_status(12).await.unwrap(), Status::Pending);
    }

    #[tokio::test]
    async fn unknown_status_round_trips() {
        let store = test_store().await;
        store.insert_job(&make_job()).await.unwrap();
        store
            .set_job_status(1, Status::Other("queued".into()))
            .await
            .unwrap();
        assert_eq!(
            store.get_job_status(1).await.unwrap(),
            Status::Other("queued".into())
        );
    }

    #[tokio::test]
    async fn set_status_on_missing_ids_is_not_found() {
        let store = test_store().await;
        assert!(store
            .set_job_status(5, Status::Running)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store
            .set_result_status(50, Status::Running)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store.get_result_status(50).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn update_and_get_result() {
        let store = test_store().await;
        store.insert_job_with_results(&make_job()).await.unwrap();

        let mut descriptor = ResultDescriptor::new(11).with_base_name("a");
        descriptor.shape = Some(vec![4, 4]);
        store
            .update_result(11, &ResultMetadata::new(descriptor.clone()))
            .await
            .unwrap();

        match store.get_result(11).await.unwrap() {
            StoredResult::Single(meta) => assert_eq!(meta.descriptor, descriptor),
            other => panic!("expected single result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn collection_records_are_preserved() {
        let store = test_store().await;
        let record = StoredResult::Collection(vec![
            ResultMetadata::new(ResultDescriptor::new(21)),
            ResultMetadata::new(ResultDescriptor::new(22)),
        ]);
        store.insert_result(20, &record).await.unwrap();
        assert_eq!(store.get_result(20).await.unwrap(), record);
    }

    #[tokio::test]
    async fn update_missing_result_is_not_found() {
        let store = test_store().await;
        let err = store
            .update_result(7, &ResultMetadata::new(ResultDescriptor::new(7)))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn new_local_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("jobs.db");
        let store = LibSqlStore::new_local(&db_path).await.unwrap();
        store.insert_job(&make_job()).await.unwrap();
        assert!(db_path.exists());
    }
}
