//! Warehouse tables. `movies` is the permanent table, `movies_staging` holds
//! the batch of the run currently loading.
//!
//! The enrichment columns (`mood`, `mood_score`) are not part of the declared
//! schema: they are added on demand by the enricher, which is why `movies`
//! tolerates trailing columns.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

/// Base columns shared by `movies` and `movies_staging`, in table order.
pub const MOVIE_COLUMNS: &[&str] = &[
    "movie_id",
    "title",
    "release_year",
    "release_date",
    "original_language",
    "overview",
    "budget",
    "revenue",
    "popularity",
    "vote_average",
    "vote_count",
    "adult",
    "genres",
];

/// Overwritten when a staged row matches an existing one.
pub const MERGE_UPDATED_COLUMNS: &[&str] = &[
    "title",
    "release_year",
    "release_date",
    "budget",
    "revenue",
    "popularity",
    "vote_average",
    "vote_count",
    "genres",
];

pub const MOOD_COLUMN: &str = "mood";
pub const MOOD_SCORE_COLUMN: &str = "mood_score";

const MOVIES_TABLE_V1: Table = Table {
    name: "movies",
    columns: &[
        sqlite_column!("movie_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("release_year", &SqlType::Integer),
        sqlite_column!("release_date", &SqlType::Text),
        sqlite_column!("original_language", &SqlType::Text),
        sqlite_column!("overview", &SqlType::Text),
        sqlite_column!("budget", &SqlType::Real),
        sqlite_column!("revenue", &SqlType::Real),
        sqlite_column!("popularity", &SqlType::Real),
        sqlite_column!("vote_average", &SqlType::Real),
        sqlite_column!("vote_count", &SqlType::Integer),
        sqlite_column!("adult", &SqlType::Integer),
        sqlite_column!("genres", &SqlType::Text, non_null = true, default_value = Some("'[]'")),
    ],
    indices: &[("idx_movies_release_year", "release_year")],
    allows_added_columns: true,
};

const MOVIES_STAGING_TABLE_V1: Table = Table {
    name: "movies_staging",
    columns: &[
        sqlite_column!("movie_id", &SqlType::Integer, non_null = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("release_year", &SqlType::Integer),
        sqlite_column!("release_date", &SqlType::Text),
        sqlite_column!("original_language", &SqlType::Text),
        sqlite_column!("overview", &SqlType::Text),
        sqlite_column!("budget", &SqlType::Real),
        sqlite_column!("revenue", &SqlType::Real),
        sqlite_column!("popularity", &SqlType::Real),
        sqlite_column!("vote_average", &SqlType::Real),
        sqlite_column!("vote_count", &SqlType::Integer),
        sqlite_column!("adult", &SqlType::Integer),
        sqlite_column!("genres", &SqlType::Text, non_null = true, default_value = Some("'[]'")),
    ],
    indices: &[],
    allows_added_columns: false,
};

pub const WAREHOUSE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[MOVIES_TABLE_V1, MOVIES_STAGING_TABLE_V1],
    migration: None,
}];
