use super::models::{FetchOutcome, GenreMap, MovieRecord};
use super::transformer::transform;
use crate::catalog::{CatalogApi, DiscoverPage};
use crate::error::NoDataReason;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hard ceiling on pages walked per period, whatever the catalog reports.
pub const MAX_PAGES: u32 = 500;

/// Paginates the catalog for one period, keeping whatever was fetched before
/// the first failing page.
pub struct CatalogFetcher {
    catalog: Arc<dyn CatalogApi>,
    max_pages: u32,
}

impl CatalogFetcher {
    pub fn new(catalog: Arc<dyn CatalogApi>) -> Self {
        Self {
            catalog,
            max_pages: MAX_PAGES,
        }
    }

    /// Lowers the page ceiling. Values above [`MAX_PAGES`] are clamped.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.clamp(1, MAX_PAGES);
        self
    }

    pub async fn fetch_period(&self, year: i32, genres: &GenreMap) -> FetchOutcome {
        let first = match self.catalog.discover_page(year, 1).await {
            Ok(page) => page,
            Err(e) => {
                warn!(year, page = 1, "Failed to fetch first catalog page: {}", e);
                return FetchOutcome::NoData(NoDataReason::UpstreamUnavailable);
            }
        };

        let total_pages = first.total_pages.min(self.max_pages);
        if first.total_pages > total_pages {
            info!(
                "Catalog reports {} pages for {}, capping at {}",
                first.total_pages, year, total_pages
            );
        }

        let mut records = Vec::new();
        append_page(&mut records, first, year, genres);

        for page in 2..=total_pages {
            match self.catalog.discover_page(year, page).await {
                Ok(body) => {
                    debug!(year, page, "Fetched {} items", body.results.len());
                    append_page(&mut records, body, year, genres);
                }
                Err(e) => {
                    warn!(year, page, "Catalog page failed, stopping pagination: {}", e);
                    break;
                }
            }
        }

        if records.is_empty() {
            warn!("No movies found for {}", year);
            return FetchOutcome::NoData(NoDataReason::Empty);
        }

        info!("{} movies fetched for {}", records.len(), year);
        FetchOutcome::Records(records)
    }
}

fn append_page(records: &mut Vec<MovieRecord>, page: DiscoverPage, year: i32, genres: &GenreMap) {
    records.extend(page.results.iter().map(|raw| transform(raw, year, genres)));
}
