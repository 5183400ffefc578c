//! Postgres-backed job store.
//!
//! One `jobs` table with a class discriminator and a JSONB payload column.
//! The dequeue lock is `FOR UPDATE SKIP LOCKED`: concurrent claimers never
//! receive the same row, and a claimer never blocks on a row another
//! transaction is claiming — it skips to the next eligible one.
//!
//! ## Error mapping
//!
//! All sqlx errors surface as `JobStoreError::Storage`; the queue manager
//! treats storage failures as transient and the polling loops back off.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use jobtrail_core::JobId;

use super::store::{JobStore, JobStoreError, QueueStatus};
use super::types::{ErrorKind, Job, JobClass, JobPayload, JobStatus};

/// Schema bootstrap, applied on startup. Partial indexes mirror the access
/// paths: pending-claim ordering, stuck-job scans, parent cascades.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id UUID PRIMARY KEY,
    parent_ref UUID NOT NULL,
    class TEXT NOT NULL,
    payload JSONB NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL,
    retry_after TIMESTAMPTZ,
    error_kind TEXT,
    error_message TEXT,
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT chk_jobs_status CHECK (status IN ('pending', 'processing', 'complete', 'failed')),
    CONSTRAINT chk_jobs_attempts CHECK (attempts >= 0 AND attempts <= max_attempts)
);

CREATE INDEX IF NOT EXISTS idx_jobs_pending
    ON jobs (class, priority DESC, created_at)
    WHERE status = 'pending';
CREATE INDEX IF NOT EXISTS idx_jobs_stuck
    ON jobs (started_at)
    WHERE status = 'processing';
CREATE INDEX IF NOT EXISTS idx_jobs_parent
    ON jobs (parent_ref);
"#;

const JOB_COLUMNS: &str = "id, parent_ref, payload, priority, status, attempts, max_attempts, \
     retry_after, error_kind, error_message, started_at, completed_at, created_at";

/// Postgres job store. `PgPool` is internally reference-counted; clone freely.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the schema (idempotent).
    pub async fn ensure_schema(&self) -> Result<(), JobStoreError> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

fn storage_err(e: sqlx::Error) -> JobStoreError {
    JobStoreError::Storage(e.to_string())
}

fn row_to_job(row: &PgRow) -> Result<Job, JobStoreError> {
    let payload_json: serde_json::Value = row.try_get("payload").map_err(storage_err)?;
    let payload: JobPayload = serde_json::from_value(payload_json)
        .map_err(|e| JobStoreError::Storage(format!("corrupt payload column: {e}")))?;

    let status: String = row.try_get("status").map_err(storage_err)?;
    let status: JobStatus = status
        .parse()
        .map_err(|e| JobStoreError::Storage(format!("corrupt status column: {e}")))?;

    let error_kind: Option<String> = row.try_get("error_kind").map_err(storage_err)?;
    let error_kind: Option<ErrorKind> = match error_kind {
        Some(s) => Some(
            s.parse()
                .map_err(|e| JobStoreError::Storage(format!("corrupt error_kind column: {e}")))?,
        ),
        None => None,
    };

    let attempts: i32 = row.try_get("attempts").map_err(storage_err)?;
    let max_attempts: i32 = row.try_get("max_attempts").map_err(storage_err)?;

    Ok(Job {
        id: JobId::from_uuid(row.try_get("id").map_err(storage_err)?),
        parent_ref: row.try_get("parent_ref").map_err(storage_err)?,
        payload,
        priority: row.try_get("priority").map_err(storage_err)?,
        status,
        attempts: attempts.max(0) as u32,
        max_attempts: max_attempts.max(0) as u32,
        retry_after: row.try_get("retry_after").map_err(storage_err)?,
        error_kind,
        error_message: row.try_get("error_message").map_err(storage_err)?,
        started_at: row.try_get("started_at").map_err(storage_err)?,
        completed_at: row.try_get("completed_at").map_err(storage_err)?,
        created_at: row.try_get("created_at").map_err(storage_err)?,
    })
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: Job) -> Result<JobId, JobStoreError> {
        let payload = serde_json::to_value(&job.payload)
            .map_err(|e| JobStoreError::Storage(e.to_string()))?;

        sqlx::query(
            "INSERT INTO jobs (id, parent_ref, class, payload, priority, status, attempts, \
             max_attempts, retry_after, error_kind, error_message, started_at, completed_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(*job.id.as_uuid())
        .bind(job.parent_ref)
        .bind(job.class().as_str())
        .bind(payload)
        .bind(job.priority)
        .bind(job.status.as_str())
        .bind(job.attempts as i32)
        .bind(job.max_attempts as i32)
        .bind(job.retry_after)
        .bind(job.error_kind.map(|k| k.as_str()))
        .bind(job.error_message.as_deref())
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                JobStoreError::AlreadyExists(job.id)
            }
            _ => storage_err(e),
        })?;

        Ok(job.id)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(*job_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = $2, attempts = $3, retry_after = $4, error_kind = $5, \
             error_message = $6, started_at = $7, completed_at = $8 WHERE id = $1",
        )
        .bind(*job.id.as_uuid())
        .bind(job.status.as_str())
        .bind(job.attempts as i32)
        .bind(job.retry_after)
        .bind(job.error_kind.map(|k| k.as_str()))
        .bind(job.error_message.as_deref())
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(job.id));
        }
        Ok(())
    }

    async fn claim_next(
        &self,
        class: JobClass,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>, JobStoreError> {
        // Subquery picks the winner under SKIP LOCKED; the UPDATE claims it.
        let row = sqlx::query(&format!(
            "UPDATE jobs SET status = 'processing', started_at = $2, completed_at = NULL, retry_after = NULL \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE class = $1 AND status = 'pending' \
                   AND (retry_after IS NULL OR retry_after <= $2) \
                 ORDER BY priority DESC, created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(class.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, JobStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE status = 'processing' AND started_at < $1 \
             ORDER BY started_at ASC"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(row_to_job).collect()
    }

    async fn list_for_parent(&self, parent_ref: Uuid) -> Result<Vec<Job>, JobStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE parent_ref = $1 ORDER BY created_at DESC"
        ))
        .bind(parent_ref)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(row_to_job).collect()
    }

    async fn purge_for_parent(&self, parent_ref: Uuid) -> Result<usize, JobStoreError> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE parent_ref = $1 AND status IN ('pending', 'processing')",
        )
        .bind(parent_ref)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() as usize)
    }

    async fn status(
        &self,
        class: JobClass,
        now: DateTime<Utc>,
    ) -> Result<QueueStatus, JobStoreError> {
        let row = sqlx::query(
            "SELECT \
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
                 COUNT(*) FILTER (WHERE status = 'processing') AS processing, \
                 COUNT(*) FILTER (WHERE status = 'complete') AS complete, \
                 COUNT(*) FILTER (WHERE status = 'failed') AS failed, \
                 MIN(created_at) FILTER (WHERE status = 'pending') AS oldest_pending \
             FROM jobs WHERE class = $1",
        )
        .bind(class.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        let pending: i64 = row.try_get("pending").map_err(storage_err)?;
        let processing: i64 = row.try_get("processing").map_err(storage_err)?;
        let complete: i64 = row.try_get("complete").map_err(storage_err)?;
        let failed: i64 = row.try_get("failed").map_err(storage_err)?;
        let oldest_pending: Option<DateTime<Utc>> =
            row.try_get("oldest_pending").map_err(storage_err)?;

        Ok(QueueStatus {
            class,
            pending: pending.max(0) as usize,
            processing: processing.max(0) as usize,
            complete: complete.max(0) as usize,
            failed: failed.max(0) as usize,
            oldest_pending_secs: oldest_pending.map(|t| (now - t).num_seconds().max(0)),
        })
    }
}
