use super::audit_logger::JobAuditLogger;
use crate::error::{PipelineError, PipelineResult};
use crate::mood::{EnrichmentSummary, MoodEnricher};
use crate::pipeline::{BackfillReport, PeriodOutcome, PeriodPipeline};
use crate::state_store::{JobRunStatus, RunStart, StateStore};
use chrono::{TimeDelta, Utc};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const ENRICH_JOB_ID: &str = "enrich_moods";

pub fn ingest_job_id(year: i32) -> String {
    format!("ingest:{}", year)
}

pub fn backfill_job_id(from: i32, to: i32) -> String {
    format!("backfill:{}-{}", from, to)
}

/// Runs pipeline jobs one at a time, recording each as a job run with an
/// audit trail in the state store.
pub struct PipelineRunner {
    state: Arc<dyn StateStore>,
    stale_after_secs: u64,
    triggered_by: String,
}

impl PipelineRunner {
    pub fn new(state: Arc<dyn StateStore>, stale_after_secs: u64) -> Self {
        Self {
            state,
            stale_after_secs,
            triggered_by: "cli".to_string(),
        }
    }

    pub fn with_trigger(mut self, triggered_by: impl Into<String>) -> Self {
        self.triggered_by = triggered_by.into();
        self
    }

    pub async fn ingest_year(
        &self,
        pipeline: &PeriodPipeline,
        year: i32,
    ) -> PipelineResult<PeriodOutcome> {
        self.run(
            &ingest_job_id(year),
            json!({ "year": year }),
            |_audit| pipeline.run_period(year),
            |outcome| {
                let status = match outcome {
                    PeriodOutcome::Merged { .. } => JobRunStatus::Completed,
                    PeriodOutcome::Skipped(_) => JobRunStatus::Skipped,
                };
                (status, outcome.details(year))
            },
        )
        .await
    }

    /// Ingests `from..=to` in order inside a single run. The first fatal
    /// period error aborts the remaining periods.
    pub async fn backfill(
        &self,
        pipeline: &PeriodPipeline,
        from: i32,
        to: i32,
    ) -> PipelineResult<BackfillReport> {
        self.run(
            &backfill_job_id(from, to),
            json!({ "from": from, "to": to }),
            |audit| async move {
                let mut report = BackfillReport::default();
                for year in from..=to {
                    let outcome = pipeline.run_period(year).await.map_err(|e| {
                        error!("Backfill stopped at {}: {}", year, e);
                        e
                    })?;
                    audit.log_progress(outcome.details(year));
                    report.record(year, &outcome);
                }
                Ok::<_, PipelineError>(report)
            },
            |report| {
                let details = json!({
                    "merged": report.merged,
                    "skipped": report.skipped,
                    "inserted": report.inserted,
                    "updated": report.updated,
                });
                (JobRunStatus::Completed, details)
            },
        )
        .await
    }

    pub async fn enrich(
        &self,
        enricher: &MoodEnricher,
        limit: usize,
    ) -> PipelineResult<EnrichmentSummary> {
        self.run(
            ENRICH_JOB_ID,
            json!({ "limit": limit }),
            |_audit| enricher.run_batch(limit),
            |summary| {
                let status = if summary.selected == 0 {
                    JobRunStatus::Skipped
                } else {
                    JobRunStatus::Completed
                };
                let details = json!({
                    "selected": summary.selected,
                    "classified": summary.classified,
                    "fallbacks": summary.fallbacks,
                    "write_failures": summary.write_failures,
                });
                (status, details)
            },
        )
        .await
    }

    async fn run<T, F, Fut, S>(
        &self,
        job_id: &str,
        start_details: serde_json::Value,
        work: F,
        summarize: S,
    ) -> PipelineResult<T>
    where
        F: FnOnce(JobAuditLogger) -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
        S: FnOnce(&T) -> (JobRunStatus, serde_json::Value),
    {
        let run_id = self.begin(job_id)?;
        let audit = JobAuditLogger::new(self.state.clone(), job_id);
        audit.log_started(Some(start_details));
        info!("Started job {} (run {})", job_id, run_id);

        let result = work(audit.clone()).await;

        match &result {
            Ok(value) => {
                let (status, details) = summarize(value);
                self.finish(run_id, status.clone(), None);
                audit.log_completed(Some(details));
                info!("Job {} finished: {}", job_id, status.as_str());
            }
            Err(e) => {
                let message = e.to_string();
                self.finish(run_id, JobRunStatus::Failed, Some(message.clone()));
                audit.log_failed(&message, None);
                error!("Job {} failed: {}", job_id, message);
            }
        }
        result
    }

    /// Fails abandoned runs, then claims the single running slot.
    fn begin(&self, job_id: &str) -> PipelineResult<i64> {
        // A threshold reaching past the representable range means nothing is stale.
        let cutoff = i64::try_from(self.stale_after_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|age| Utc::now().checked_sub_signed(age));
        if let Some(cutoff) = cutoff {
            let stale = self.state.mark_stale_runs_failed(cutoff)?;
            if stale > 0 {
                warn!("Marked {} stale run(s) as failed", stale);
            }
        }

        match self.state.try_record_run_start(job_id, &self.triggered_by)? {
            RunStart::Started(run_id) => Ok(run_id),
            RunStart::Blocked(active) => Err(PipelineError::AlreadyRunning(format!(
                "{} (run {} started at {})",
                active.job_id,
                active.id,
                active.started_at.to_rfc3339()
            ))),
        }
    }

    fn finish(&self, run_id: i64, status: JobRunStatus, error_message: Option<String>) {
        if let Err(e) = self.state.record_run_finish(run_id, status, error_message) {
            warn!("Failed to record finish of run {}: {:#}", run_id, e);
        }
    }
}
