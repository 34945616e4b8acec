//! Guarded job runs with audit trail.

mod audit_logger;
mod runner;

pub use audit_logger::JobAuditLogger;
pub use runner::{backfill_job_id, ingest_job_id, PipelineRunner, ENRICH_JOB_ID};
