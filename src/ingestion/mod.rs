//! Catalog ingestion: genre bootstrap, paginated fetch and record mapping.

mod fetcher;
mod genre_cache;
mod models;
mod transformer;

pub use fetcher::{CatalogFetcher, MAX_PAGES};
pub use genre_cache::GenreCache;
pub use models::{FetchOutcome, GenreMap, MovieRecord, UNKNOWN_GENRE};
pub use transformer::transform;
