//! Movie catalog ingestion and mood enrichment pipeline.
//!
//! This library exposes the pipeline components for the `moviemood` binary
//! and for integration tests.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod llm;
pub mod mood;
pub mod pipeline;
pub mod runs;
pub mod sqlite_persistence;
pub mod staging;
pub mod state_store;
pub mod warehouse;

// Re-export commonly used types for convenience
pub use error::{NoDataReason, PipelineError, PipelineResult};
pub use pipeline::{BackfillReport, PeriodOutcome, PeriodPipeline};
pub use runs::PipelineRunner;
pub use state_store::{SqliteStateStore, StateStore};
pub use warehouse::{SqliteWarehouse, Warehouse};
