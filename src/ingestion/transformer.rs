use super::models::{GenreMap, MovieRecord};
use crate::catalog::RawMovie;
use chrono::NaiveDate;

/// Maps one raw catalog item into the canonical row for `year`.
///
/// `release_year` is always the ingested period, not the year parsed from
/// `release_date`.
pub fn transform(raw: &RawMovie, year: i32, genres: &GenreMap) -> MovieRecord {
    MovieRecord {
        movie_id: raw.id,
        title: raw.title.clone(),
        release_year: year,
        release_date: raw.release_date.as_deref().and_then(parse_release_date),
        original_language: raw.original_language.clone(),
        overview: raw.overview.clone(),
        budget: raw.budget,
        revenue: raw.revenue,
        popularity: raw.popularity,
        vote_average: raw.vote_average,
        vote_count: raw.vote_count,
        adult: raw.adult,
        genres: raw
            .genre_ids
            .iter()
            .map(|id| genres.label(*id).to_string())
            .collect(),
    }
}

fn parse_release_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
