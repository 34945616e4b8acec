use super::schema::{
    MERGE_UPDATED_COLUMNS, MOOD_COLUMN, MOOD_SCORE_COLUMN, MOVIE_COLUMNS,
    WAREHOUSE_VERSIONED_SCHEMAS,
};
use super::{MergeSummary, MoodCandidate, StoredMovie, Warehouse};
use crate::ingestion::MovieRecord;
use crate::sqlite_persistence::open_versioned;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteWarehouse {
    conn: Arc<Mutex<Connection>>,
    merge_sql: String,
}

impl SqliteWarehouse {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, WAREHOUSE_VERSIONED_SCHEMAS, "warehouse")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            merge_sql: Self::build_merge_sql(),
        })
    }

    /// `WHERE true` keeps SQLite from reading `ON CONFLICT` as a join clause.
    /// Duplicate ids within one batch resolve to the last staged row.
    fn build_merge_sql() -> String {
        let columns = MOVIE_COLUMNS.join(", ");
        let updates = MERGE_UPDATED_COLUMNS
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO movies ({columns})
             SELECT {columns} FROM movies_staging WHERE true ORDER BY rowid
             ON CONFLICT(movie_id) DO UPDATE SET {updates}"
        )
    }

    fn mood_columns_present(conn: &Connection) -> Result<(bool, bool)> {
        let mut stmt = conn.prepare("PRAGMA table_info(movies)")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((
            names.iter().any(|n| n == MOOD_COLUMN),
            names.iter().any(|n| n == MOOD_SCORE_COLUMN),
        ))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MovieRecord> {
        let release_date: Option<String> = row.get("release_date")?;
        let genres: String = row.get("genres")?;
        Ok(MovieRecord {
            movie_id: row.get("movie_id")?,
            title: row.get::<_, Option<String>>("title")?.unwrap_or_default(),
            release_year: row.get::<_, Option<i32>>("release_year")?.unwrap_or_default(),
            release_date: release_date
                .and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok()),
            original_language: row
                .get::<_, Option<String>>("original_language")?
                .unwrap_or_default(),
            overview: row.get::<_, Option<String>>("overview")?.unwrap_or_default(),
            budget: row.get::<_, Option<f64>>("budget")?.unwrap_or_default(),
            revenue: row.get::<_, Option<f64>>("revenue")?.unwrap_or_default(),
            popularity: row.get::<_, Option<f64>>("popularity")?.unwrap_or_default(),
            vote_average: row.get::<_, Option<f64>>("vote_average")?.unwrap_or_default(),
            vote_count: row.get::<_, Option<i64>>("vote_count")?.unwrap_or_default(),
            adult: row.get::<_, Option<bool>>("adult")?.unwrap_or_default(),
            genres: serde_json::from_str(&genres).unwrap_or_default(),
        })
    }
}

impl Warehouse for SqliteWarehouse {
    fn load_staging(&self, records: &[MovieRecord]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM movies_staging", [])?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO movies_staging ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                MOVIE_COLUMNS.join(", ")
            ))?;
            for record in records {
                let genres = serde_json::to_string(&record.genres)?;
                stmt.execute(params![
                    record.movie_id,
                    record.title,
                    record.release_year,
                    record
                        .release_date
                        .map(|d| d.format(DATE_FORMAT).to_string()),
                    record.original_language,
                    record.overview,
                    record.budget,
                    record.revenue,
                    record.popularity,
                    record.vote_average,
                    record.vote_count,
                    record.adult,
                    genres,
                ])
                .with_context(|| format!("Failed to stage movie {}", record.movie_id))?;
            }
        }
        tx.commit().context("Failed to commit staging load")?;

        debug!("Loaded {} rows into movies_staging", records.len());
        Ok(records.len())
    }

    fn merge_staging(&self) -> Result<MergeSummary> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let staged: i64 = tx.query_row(
            "SELECT COUNT(DISTINCT movie_id) FROM movies_staging",
            [],
            |r| r.get(0),
        )?;
        let matched: i64 = tx.query_row(
            "SELECT COUNT(DISTINCT s.movie_id) FROM movies_staging s
             WHERE EXISTS (SELECT 1 FROM movies m WHERE m.movie_id = s.movie_id)",
            [],
            |r| r.get(0),
        )?;

        tx.execute(&self.merge_sql, [])
            .context("Merge into movies failed")?;
        tx.commit().context("Failed to commit merge")?;

        Ok(MergeSummary {
            inserted: (staged - matched) as usize,
            updated: matched as usize,
        })
    }

    fn ensure_mood_columns(&self) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let (has_mood, has_score) = Self::mood_columns_present(&conn)?;
        if has_mood && has_score {
            debug!("Mood columns already present");
            return Ok(false);
        }

        if !has_mood {
            conn.execute(&format!("ALTER TABLE movies ADD COLUMN {} TEXT", MOOD_COLUMN), [])?;
        }
        if !has_score {
            conn.execute(
                &format!("ALTER TABLE movies ADD COLUMN {} INTEGER", MOOD_SCORE_COLUMN),
                [],
            )?;
        }
        info!("Added missing mood columns to movies");
        Ok(true)
    }

    fn select_unprocessed(&self, limit: usize) -> Result<Vec<MoodCandidate>> {
        let conn = self.conn.lock().unwrap();
        let (has_mood, has_score) = Self::mood_columns_present(&conn)?;
        let pending_filter = if has_mood && has_score {
            "AND mood IS NULL AND mood_score IS NULL"
        } else {
            ""
        };

        let mut stmt = conn.prepare_cached(&format!(
            "SELECT movie_id, title, genres, overview FROM movies
             WHERE overview IS NOT NULL AND overview != '' {}
             ORDER BY movie_id LIMIT ?1",
            pending_filter
        ))?;
        let candidates = stmt
            .query_map(params![limit as i64], |row| {
                let genres: String = row.get(2)?;
                Ok(MoodCandidate {
                    movie_id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    genres: serde_json::from_str(&genres).unwrap_or_default(),
                    overview: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(candidates)
    }

    fn set_mood(&self, movie_id: i64, mood: &str, mood_score: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE movies SET mood = ?1, mood_score = ?2 WHERE movie_id = ?3",
            params![mood, mood_score, movie_id],
        )?;
        if updated == 0 {
            anyhow::bail!("Movie {} not found", movie_id);
        }
        Ok(())
    }

    fn get_movie(&self, movie_id: i64) -> Result<Option<StoredMovie>> {
        let conn = self.conn.lock().unwrap();
        let (has_mood, has_score) = Self::mood_columns_present(&conn)?;
        let enrichment = if has_mood && has_score {
            "mood, mood_score"
        } else {
            "NULL AS mood, NULL AS mood_score"
        };

        let movie = conn
            .query_row(
                &format!(
                    "SELECT {}, {} FROM movies WHERE movie_id = ?1",
                    MOVIE_COLUMNS.join(", "),
                    enrichment
                ),
                params![movie_id],
                |row| {
                    Ok(StoredMovie {
                        record: Self::row_to_record(row)?,
                        mood: row.get("mood")?,
                        mood_score: row.get("mood_score")?,
                    })
                },
            )
            .optional()?;
        Ok(movie)
    }

    fn count_movies(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM movies", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}
