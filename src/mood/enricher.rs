use super::classifier::{Classified, MoodClassifier};
use crate::error::PipelineError;
use crate::warehouse::{MoodCandidate, Warehouse};
use anyhow::Context;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    pub selected: usize,
    pub classified: usize,
    /// Rows stored with the fallback pair.
    pub fallbacks: usize,
    /// Rows whose write-back failed; they stay pending for the next batch.
    pub write_failures: usize,
}

/// Classifies warehouse rows that have no mood yet and writes the results
/// back by `movie_id`.
pub struct MoodEnricher {
    warehouse: Arc<dyn Warehouse>,
    classifier: MoodClassifier,
    concurrency: usize,
}

impl MoodEnricher {
    pub fn new(warehouse: Arc<dyn Warehouse>, classifier: MoodClassifier) -> Self {
        Self {
            warehouse,
            classifier,
            concurrency: 1,
        }
    }

    /// Maximum number of classification requests in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn run_batch(&self, limit: usize) -> Result<EnrichmentSummary, PipelineError> {
        self.warehouse
            .ensure_mood_columns()
            .context("Failed to add mood columns")?;

        let candidates = self
            .warehouse
            .select_unprocessed(limit)
            .context("Failed to select movies pending mood analysis")?;
        let mut summary = EnrichmentSummary {
            selected: candidates.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            info!("No movies pending mood analysis");
            return Ok(summary);
        }
        info!(
            "Classifying {} movies (concurrency {})",
            candidates.len(),
            self.concurrency
        );

        let mut results = stream::iter(candidates)
            .map(|candidate| async move {
                let classified = self.classifier.classify(&candidate.overview).await;
                (candidate, classified)
            })
            .buffer_unordered(self.concurrency);

        while let Some((candidate, classified)) = results.next().await {
            self.write_back(&candidate, &classified, &mut summary);
        }

        info!(
            "Mood batch done: {} selected, {} classified, {} fallbacks, {} write failures",
            summary.selected, summary.classified, summary.fallbacks, summary.write_failures
        );
        Ok(summary)
    }

    fn write_back(
        &self,
        candidate: &MoodCandidate,
        classified: &Classified,
        summary: &mut EnrichmentSummary,
    ) {
        let mood = &classified.classification;
        match self
            .warehouse
            .set_mood(candidate.movie_id, &mood.mood, mood.score)
        {
            Ok(()) => {
                summary.classified += 1;
                if classified.fallback {
                    summary.fallbacks += 1;
                }
                info!(
                    movie_id = candidate.movie_id,
                    "Updated '{}' with mood {} (score {})", candidate.title, mood.mood, mood.score
                );
            }
            Err(e) => {
                summary.write_failures += 1;
                warn!(
                    movie_id = candidate.movie_id,
                    "Failed to store mood for '{}': {:#}", candidate.title, e
                );
            }
        }
    }
}
