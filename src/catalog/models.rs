//! Wire payloads of the movie catalog API.
//!
//! Upstream items are loosely typed: every field except `id` may be missing
//! or null, so each one carries a default here.

use serde::{Deserialize, Deserializer};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One item of a `/discover/movie` page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawMovie {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// `YYYY-MM-DD`, frequently empty for unreleased titles.
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_language: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub overview: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub budget: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub revenue: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub popularity: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vote_average: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vote_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub adult: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genre_ids: Vec<i64>,
}

fn default_total_pages() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscoverPage {
    #[serde(default = "default_total_pages")]
    pub total_pages: u32,
    #[serde(default)]
    pub results: Vec<RawMovie>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenreEntry {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenreListResponse {
    #[serde(default)]
    pub genres: Vec<GenreEntry>,
}
