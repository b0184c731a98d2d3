//! Background jobs table: a uniform, upsert-by-id record for long-running
//! work the core does not itself run (spec §4.7).

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::Storage;

/// Lifecycle state of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Done,
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "running" => JobStatus::Running,
            "done" => JobStatus::Done,
            "error" => JobStatus::Error,
            other => return Err(Error::InvalidArgument(format!("unknown job status: {other}"))),
        })
    }
}

/// A persisted record of long-running, caller-initiated work (e.g. a crawl
/// or research task), observable by UIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub label: String,
    pub status: JobStatus,
    pub progress: f64,
    pub started_at: DateTime<Utc>,
    pub error: Option<String>,
    pub result: Option<String>,
    pub result_type: Option<String>,
    pub structured_result: Option<String>,
    pub updated_at: DateTime<Utc>,
}

const JOB_COLUMNS: &str = "id, type, label, status, progress, started_at, error, result, \
    result_type, structured_result, updated_at";

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<BackgroundJob> {
    let status: String = row.get("status")?;
    Ok(BackgroundJob {
        id: row.get("id")?,
        job_type: row.get("type")?,
        label: row.get("label")?,
        status: status.parse().unwrap_or(JobStatus::Running),
        progress: row.get("progress")?,
        started_at: row.get("started_at")?,
        error: row.get("error")?,
        result: row.get("result")?,
        result_type: row.get("result_type")?,
        structured_result: row.get("structured_result")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Insert a new job, or update an existing one with the same id.
pub fn upsert_job(
    storage: &Storage,
    id: &str,
    job_type: &str,
    label: &str,
    status: JobStatus,
    progress: f64,
) -> Result<BackgroundJob> {
    let now = storage.clock().now();
    storage.run(
        &format!(
            "INSERT INTO background_jobs ({JOB_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL, NULL, NULL, ?6) \
             ON CONFLICT(id) DO UPDATE SET type = excluded.type, label = excluded.label, \
             status = excluded.status, progress = excluded.progress, updated_at = excluded.updated_at"
        ),
        params![id, job_type, label, status.to_string(), progress, now.to_rfc3339()],
    )?;
    get_job(storage, id)
}

/// Fetch a job by its exact id.
pub fn get_job(storage: &Storage, id: &str) -> Result<BackgroundJob> {
    storage
        .with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM background_jobs WHERE id = ?1"),
                [id],
                row_to_job,
            )
            .optional()
        })?
        .ok_or_else(|| Error::NotFound(format!("background job {id}")))
}

/// List jobs, optionally filtered by status, most recently started first.
pub fn list_jobs(storage: &Storage, status: Option<JobStatus>) -> Result<Vec<BackgroundJob>> {
    storage.with_conn(|conn| {
        let sql = match status {
            Some(_) => format!("SELECT {JOB_COLUMNS} FROM background_jobs WHERE status = ?1 ORDER BY started_at DESC"),
            None => format!("SELECT {JOB_COLUMNS} FROM background_jobs ORDER BY started_at DESC"),
        };
        let mut stmt = conn.prepare(&sql)?;
        match status {
            Some(s) => stmt.query_map([s.to_string()], row_to_job)?.collect(),
            None => stmt.query_map([], row_to_job)?.collect(),
        }
    })
}

/// Update a job's status (and, on completion or error, its result fields).
pub fn update_job_status(
    storage: &Storage,
    id: &str,
    status: JobStatus,
    progress: Option<f64>,
    error: Option<&str>,
    result: Option<&str>,
    result_type: Option<&str>,
    structured_result: Option<&str>,
) -> Result<BackgroundJob> {
    let now = storage.clock().now();
    let existing = get_job(storage, id)?;
    storage.run(
        "UPDATE background_jobs SET status = ?1, progress = ?2, error = ?3, result = ?4, \
         result_type = ?5, structured_result = ?6, updated_at = ?7 WHERE id = ?8",
        params![
            status.to_string(),
            progress.unwrap_or(existing.progress),
            error,
            result,
            result_type,
            structured_result,
            now.to_rfc3339(),
            id,
        ],
    )?;
    get_job(storage, id)
}

/// Delete jobs in a terminal state (`done`/`error`), optionally only those
/// whose `updated_at` is older than `older_than_ms` milliseconds. Returns
/// the number deleted.
pub fn clear_completed_background_jobs(storage: &Storage, older_than_ms: Option<i64>) -> Result<usize> {
    match older_than_ms {
        Some(ms) => {
            let cutoff = storage.clock().now() - chrono::Duration::milliseconds(ms);
            storage.run(
                "DELETE FROM background_jobs WHERE status IN ('done', 'error') AND updated_at < ?1",
                params![cutoff.to_rfc3339()],
            )
        }
        None => storage.run("DELETE FROM background_jobs WHERE status IN ('done', 'error')", params![]),
    }
}
