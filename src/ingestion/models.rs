use crate::catalog::GenreEntry;
use crate::error::NoDataReason;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label used for genre ids missing from the lookup table.
pub const UNKNOWN_GENRE: &str = "Unknown";

/// Canonical warehouse row, one per catalog movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub movie_id: i64,
    pub title: String,
    pub release_year: i32,
    /// Serialized as `YYYY-MM-DD` or `null`.
    pub release_date: Option<NaiveDate>,
    pub original_language: String,
    pub overview: String,
    pub budget: f64,
    pub revenue: f64,
    pub popularity: f64,
    pub vote_average: f64,
    pub vote_count: i64,
    pub adult: bool,
    pub genres: Vec<String>,
}

/// Genre id to display name lookup.
///
/// Persists as a JSON object keyed by the id rendered as a string, which is
/// how serde_json writes integer map keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenreMap(BTreeMap<i64, String>);

impl GenreMap {
    pub fn from_entries(entries: impl IntoIterator<Item = GenreEntry>) -> Self {
        Self(entries.into_iter().map(|g| (g.id, g.name)).collect())
    }

    pub fn label(&self, genre_id: i64) -> &str {
        self.0
            .get(&genre_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_GENRE)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.0.iter().map(|(id, name)| (*id, name.as_str()))
    }
}

impl<const N: usize> From<[(i64, &str); N]> for GenreMap {
    fn from(entries: [(i64, &str); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(id, name)| (id, name.to_string()))
                .collect(),
        )
    }
}

/// Result of paginating the catalog for one period.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Records(Vec<MovieRecord>),
    NoData(NoDataReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_map_json_uses_string_keys() {
        let map = GenreMap::from([(28, "Action"), (35, "Comedy")]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"28":"Action","35":"Comedy"}"#);

        let parsed: GenreMap = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, map);
    }

    #[test]
    fn test_unknown_genre_label() {
        let map = GenreMap::from([(28, "Action")]);
        assert_eq!(map.label(28), "Action");
        assert_eq!(map.label(99999), UNKNOWN_GENRE);
    }

    #[test]
    fn test_movie_record_date_format() {
        let record = MovieRecord {
            movie_id: 1,
            title: "A".into(),
            release_year: 2001,
            release_date: NaiveDate::from_ymd_opt(2001, 5, 4),
            original_language: "en".into(),
            overview: String::new(),
            budget: 0.0,
            revenue: 0.0,
            popularity: 0.0,
            vote_average: 0.0,
            vote_count: 0,
            adult: false,
            genres: vec![],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["release_date"], "2001-05-04");

        let undated = MovieRecord {
            release_date: None,
            ..record
        };
        let value = serde_json::to_value(&undated).unwrap();
        assert!(value["release_date"].is_null());
    }
}
