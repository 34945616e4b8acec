mod loader;
mod schema;
mod sqlite_warehouse;

pub use loader::{parse_ndjson, WarehouseLoader};
pub use schema::{MERGE_UPDATED_COLUMNS, MOVIE_COLUMNS, WAREHOUSE_VERSIONED_SCHEMAS};
pub use sqlite_warehouse::SqliteWarehouse;

use crate::ingestion::MovieRecord;
use anyhow::Result;

/// Row counts of one merge of the staging table into `movies`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// A warehouse row still waiting for a mood classification.
#[derive(Debug, Clone, PartialEq)]
pub struct MoodCandidate {
    pub movie_id: i64,
    pub title: String,
    pub genres: Vec<String>,
    pub overview: String,
}

/// A permanent row with its enrichment fields, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMovie {
    pub record: MovieRecord,
    pub mood: Option<String>,
    pub mood_score: Option<i64>,
}

pub trait Warehouse: Send + Sync {
    /// Replaces the staging table content with `records`.
    fn load_staging(&self, records: &[MovieRecord]) -> Result<usize>;

    /// Upserts the staging table into `movies` keyed by `movie_id`, in one
    /// transaction. Enrichment columns are never touched.
    fn merge_staging(&self) -> Result<MergeSummary>;

    /// Adds the `mood`/`mood_score` columns if missing. Returns whether any
    /// column was added.
    fn ensure_mood_columns(&self) -> Result<bool>;

    /// Rows with a non-empty overview and no complete enrichment, ordered by
    /// `movie_id`.
    fn select_unprocessed(&self, limit: usize) -> Result<Vec<MoodCandidate>>;

    fn set_mood(&self, movie_id: i64, mood: &str, mood_score: i64) -> Result<()>;

    fn get_movie(&self, movie_id: i64) -> Result<Option<StoredMovie>>;

    fn count_movies(&self) -> Result<usize>;
}
