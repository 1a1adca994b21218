//! Schema versions for the job store.
//!
//! Applied versions are recorded in `schema_versions`. Opening a store
//! applies the missing ones in order, so a file created by an older build
//! picks up later indexes without losing rows.

use libsql::{Connection, params};
use tracing::{debug, info};

use crate::error::StoreError;

/// `(version, name, sql)`, ascending. Append only.
const SCHEMA: &[(i64, &str, &str)] = &[
    (
        1,
        "jobs_and_results",
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY,
            status TEXT NOT NULL DEFAULT 'pending',
            result_id INTEGER NOT NULL,
            result_descriptors TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS results (
            id INTEGER PRIMARY KEY,
            status TEXT NOT NULL DEFAULT 'pending',
            record TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ),
    (
        2,
        "status_indexes",
        r#"
        CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
        CREATE INDEX IF NOT EXISTS idx_results_status ON results(status);
        "#,
    ),
];

/// Bring the schema on `conn` up to the latest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_versions (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| StoreError::Migration(format!("schema_versions: {e}")))?;

    let applied = schema_version(conn).await?;
    let mut latest = applied;

    for &(version, name, sql) in SCHEMA.iter().filter(|(v, _, _)| *v > applied) {
        info!(version, name, "Applying schema version");
        conn.execute_batch(sql)
            .await
            .map_err(|e| StoreError::Migration(format!("V{version} {name}: {e}")))?;
        conn.execute(
            "INSERT INTO schema_versions (version, name) VALUES (?1, ?2)",
            params![version, name],
        )
        .await
        .map_err(|e| StoreError::Migration(format!("recording V{version}: {e}")))?;
        latest = version;
    }

    debug!(version = latest, "Schema up to date");
    Ok(())
}

/// Highest applied version, 0 for an empty database.
async fn schema_version(conn: &Connection) -> Result<i64, StoreError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_versions", ())
        .await
        .map_err(|e| StoreError::Migration(format!("schema_version: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => row
            .get(0)
            .map_err(|e| StoreError::Migration(format!("schema_version: {e}"))),
        Ok(None) => Ok(0),
        Err(e) => Err(StoreError::Migration(format!("schema_version: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_conn() -> Connection {
        libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap()
    }

    async fn count(conn: &Connection, sql: &str) -> i64 {
        let mut rows = conn.query(sql, ()).await.unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }

    #[tokio::test]
    async fn fresh_database_reaches_latest_version() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();

        assert_eq!(schema_version(&conn).await.unwrap(), 2);
        assert_eq!(
            count(
                &conn,
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%_status'"
            )
            .await,
            2
        );
    }

    #[tokio::test]
    async fn rerun_records_each_version_once() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        assert_eq!(count(&conn, "SELECT COUNT(*) FROM schema_versions").await, 2);
    }

    #[tokio::test]
    async fn older_database_gets_only_missing_versions() {
        let conn = memory_conn().await;
        conn.execute_batch(SCHEMA[0].2).await.unwrap();
        conn.execute(
            "INSERT INTO jobs (id, status, result_id, created_at, updated_at) VALUES (1, 'running', 10, 'then', 'then')",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "CREATE TABLE schema_versions (version INTEGER PRIMARY KEY, name TEXT NOT NULL, applied_at TEXT NOT NULL DEFAULT (datetime('now')))",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO schema_versions (version, name) VALUES (1, 'jobs_and_results')",
            (),
        )
        .await
        .unwrap();

        run_migrations(&conn).await.unwrap();

        assert_eq!(schema_version(&conn).await.unwrap(), 2);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM jobs").await, 1);
    }
}
