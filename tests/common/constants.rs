//! Shared constants for end-to-end tests

/// Genre ids served by the fake catalog.
pub const GENRE_ACTION_ID: i64 = 28;
pub const GENRE_DRAMA_ID: i64 = 18;
pub const GENRE_COMEDY_ID: i64 = 35;

/// A genre id absent from the fake taxonomy.
pub const GENRE_UNMAPPED_ID: i64 = 9999;

/// Release year used by single-period tests.
pub const TEST_YEAR: i32 = 2001;
