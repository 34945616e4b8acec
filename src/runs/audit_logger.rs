use crate::state_store::{JobAuditEventType, StateStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Writes the audit trail of one job run. Audit failures are logged and
/// never interrupt the job.
#[derive(Clone)]
pub struct JobAuditLogger {
    state: Arc<dyn StateStore>,
    job_id: String,
    start_time: Instant,
}

impl JobAuditLogger {
    pub fn new(state: Arc<dyn StateStore>, job_id: &str) -> Self {
        Self {
            state,
            job_id: job_id.to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn log_started(&self, details: Option<serde_json::Value>) {
        self.write(JobAuditEventType::Started, None, details, None);
    }

    pub fn log_completed(&self, details: Option<serde_json::Value>) {
        self.write(
            JobAuditEventType::Completed,
            Some(self.elapsed_ms()),
            details,
            None,
        );
    }

    pub fn log_failed(&self, error: &str, details: Option<serde_json::Value>) {
        self.write(
            JobAuditEventType::Failed,
            Some(self.elapsed_ms()),
            details,
            Some(error),
        );
    }

    pub fn log_progress(&self, details: serde_json::Value) {
        self.write(JobAuditEventType::Progress, None, Some(details), None);
    }

    fn elapsed_ms(&self) -> i64 {
        self.start_time.elapsed().as_millis() as i64
    }

    fn write(
        &self,
        event_type: JobAuditEventType,
        duration_ms: Option<i64>,
        details: Option<serde_json::Value>,
        error: Option<&str>,
    ) {
        if let Err(e) = self.state.log_job_audit(
            &self.job_id,
            event_type.clone(),
            duration_ms,
            details.as_ref(),
            error,
        ) {
            warn!(
                job_id = %self.job_id,
                "Failed to write {} audit entry: {:#}",
                event_type.as_str(),
                e
            );
        }
    }
}
