use super::object_store::{ObjectStore, StagingLocation};
use crate::error::PipelineError;
use crate::ingestion::MovieRecord;
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

pub fn staging_object_name(period_key: &str) -> String {
    format!("movies_{}.json", period_key)
}

/// Serializes one record per line, in order, `\n`-separated.
pub fn to_ndjson(records: &[MovieRecord]) -> serde_json::Result<String> {
    let lines = records
        .iter()
        .map(serde_json::to_string)
        .collect::<serde_json::Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

pub struct StagingPublisher {
    store: Arc<dyn ObjectStore>,
}

impl StagingPublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Writes the batch as `movies_{period_key}.json`, replacing a previous
    /// publication of the same period.
    pub fn publish(
        &self,
        records: &[MovieRecord],
        period_key: &str,
    ) -> Result<StagingLocation, PipelineError> {
        let body = to_ndjson(records).context("Failed to serialize staging batch")?;
        let object_name = staging_object_name(period_key);
        let location = self
            .store
            .put(&object_name, body.as_bytes())
            .with_context(|| format!("Failed to upload {}", object_name))?;

        info!("Uploaded {} records to {}", records.len(), location);
        Ok(location)
    }
}
