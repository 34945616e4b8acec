mod client;
mod models;

pub use client::{
    CatalogApi, CatalogError, TmdbClient, DEFAULT_CATALOG_BASE_URL, DEFAULT_CATALOG_TIMEOUT,
    DEFAULT_REQUEST_INTERVAL,
};
pub use models::{DiscoverPage, GenreEntry, GenreListResponse, RawMovie};
