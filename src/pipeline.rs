//! Per-period ingestion: genre bootstrap, fetch, stage, merge.

use crate::catalog::CatalogApi;
use crate::error::{NoDataReason, PipelineError, PipelineResult};
use crate::ingestion::{CatalogFetcher, FetchOutcome, GenreCache};
use crate::staging::{ObjectStore, StagingPublisher};
use crate::state_store::{StateStore, GENRES_STATE_KEY};
use crate::warehouse::{Warehouse, WarehouseLoader};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodOutcome {
    Merged {
        fetched: usize,
        inserted: usize,
        updated: usize,
    },
    /// Nothing was staged or merged for the period.
    Skipped(NoDataReason),
}

impl PeriodOutcome {
    pub fn details(&self, year: i32) -> serde_json::Value {
        match self {
            PeriodOutcome::Merged {
                fetched,
                inserted,
                updated,
            } => serde_json::json!({
                "year": year,
                "outcome": "merged",
                "fetched": fetched,
                "inserted": inserted,
                "updated": updated,
            }),
            PeriodOutcome::Skipped(reason) => serde_json::json!({
                "year": year,
                "outcome": "skipped",
                "reason": reason.as_str(),
            }),
        }
    }
}

/// Outcomes of a sequential run over a range of periods, in period order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub merged: Vec<i32>,
    pub skipped: Vec<i32>,
    pub inserted: usize,
    pub updated: usize,
}

impl BackfillReport {
    pub fn record(&mut self, year: i32, outcome: &PeriodOutcome) {
        match outcome {
            PeriodOutcome::Merged {
                inserted, updated, ..
            } => {
                self.merged.push(year);
                self.inserted += inserted;
                self.updated += updated;
            }
            PeriodOutcome::Skipped(_) => self.skipped.push(year),
        }
    }
}

pub struct PeriodPipeline {
    genre_cache: GenreCache,
    fetcher: CatalogFetcher,
    publisher: StagingPublisher,
    loader: WarehouseLoader,
}

impl PeriodPipeline {
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        state: Arc<dyn StateStore>,
        store: Arc<dyn ObjectStore>,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        Self {
            genre_cache: GenreCache::new(state, catalog.clone()),
            fetcher: CatalogFetcher::new(catalog),
            publisher: StagingPublisher::new(store.clone()),
            loader: WarehouseLoader::new(store, warehouse),
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.fetcher = self.fetcher.with_max_pages(max_pages);
        self
    }

    pub fn genre_cache(&self) -> &GenreCache {
        &self.genre_cache
    }

    /// Ingests one release year end to end.
    ///
    /// A missing genre map is fatal. An unreachable or empty catalog for the
    /// year is reported as [`PeriodOutcome::Skipped`] and leaves staging and
    /// the warehouse untouched.
    pub async fn run_period(&self, year: i32) -> PipelineResult<PeriodOutcome> {
        let genres = self
            .genre_cache
            .ensure_loaded()
            .await?
            .ok_or_else(|| PipelineError::ConfigMissing(GENRES_STATE_KEY.to_string()))?;

        let records = match self.fetcher.fetch_period(year, &genres).await {
            FetchOutcome::Records(records) => records,
            FetchOutcome::NoData(reason) => {
                warn!("No catalog data for {} ({}), skipping", year, reason);
                return Ok(PeriodOutcome::Skipped(reason));
            }
        };

        let period_key = year.to_string();
        let location = self.publisher.publish(&records, &period_key)?;
        let summary = self.loader.load_and_merge(&location, &period_key)?;

        info!(
            "Period {} done: {} fetched, {} inserted, {} updated",
            year,
            records.len(),
            summary.inserted,
            summary.updated
        );
        Ok(PeriodOutcome::Merged {
            fetched: records.len(),
            inserted: summary.inserted,
            updated: summary.updated,
        })
    }
}
