mod models;
mod schema;
mod sqlite_state_store;

pub use models::*;
pub use schema::STATE_VERSIONED_SCHEMAS;
pub use sqlite_state_store::SqliteStateStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Process-wide shared state: configuration values that outlive a single run
/// (genre cache, API key) plus the bookkeeping of pipeline runs.
pub trait StateStore: Send + Sync {
    // Key-value state
    fn get_state(&self, key: &str) -> Result<Option<String>>;
    fn set_state(&self, key: &str, value: &str) -> Result<()>;
    fn delete_state(&self, key: &str) -> Result<()>;

    // Job runs
    /// Records a new running job unless another run is already marked as
    /// running. Check and insert happen in one transaction.
    fn try_record_run_start(&self, job_id: &str, triggered_by: &str) -> Result<RunStart>;
    fn record_run_finish(
        &self,
        run_id: i64,
        status: JobRunStatus,
        error_message: Option<String>,
    ) -> Result<()>;
    fn get_running_runs(&self) -> Result<Vec<JobRun>>;
    /// Most recent runs first, optionally restricted to one job id.
    fn get_run_history(&self, job_id: Option<&str>, limit: usize) -> Result<Vec<JobRun>>;
    /// Marks runs still `running` that started before `started_before` as failed.
    fn mark_stale_runs_failed(&self, started_before: DateTime<Utc>) -> Result<usize>;

    // Job audit log
    fn log_job_audit(
        &self,
        job_id: &str,
        event_type: JobAuditEventType,
        duration_ms: Option<i64>,
        details: Option<&serde_json::Value>,
        error: Option<&str>,
    ) -> Result<i64>;
    fn get_job_audit_log_by_job(&self, job_id: &str, limit: usize) -> Result<Vec<JobAuditEntry>>;
}
