use super::{MergeSummary, Warehouse};
use crate::error::PipelineError;
use crate::ingestion::MovieRecord;
use crate::staging::{ObjectStore, StagingLocation};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Parses a newline-delimited batch. Blank lines are skipped, any other
/// malformed line fails the whole batch.
pub fn parse_ndjson(body: &str) -> Result<Vec<MovieRecord>> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<MovieRecord>(line)
                .with_context(|| format!("Malformed staging record on line {}", idx + 1))
        })
        .collect()
}

/// Two-phase load: truncate-and-replace the staging table, then merge it into
/// the permanent table.
pub struct WarehouseLoader {
    store: Arc<dyn ObjectStore>,
    warehouse: Arc<dyn Warehouse>,
}

impl WarehouseLoader {
    pub fn new(store: Arc<dyn ObjectStore>, warehouse: Arc<dyn Warehouse>) -> Self {
        Self { store, warehouse }
    }

    pub fn load_and_merge(
        &self,
        location: &StagingLocation,
        period_key: &str,
    ) -> Result<MergeSummary, PipelineError> {
        let bytes = self
            .store
            .get(location)
            .with_context(|| format!("Failed to read staging object {}", location))?;
        let body = String::from_utf8(bytes)
            .with_context(|| format!("Staging object {} is not UTF-8", location))?;
        let records = parse_ndjson(&body)?;

        let staged = self
            .warehouse
            .load_staging(&records)
            .with_context(|| format!("Stage-load failed for {}", period_key))?;
        info!("Loaded {} staged rows for {}", staged, period_key);

        let summary = self
            .warehouse
            .merge_staging()
            .with_context(|| format!("Merge failed for {}", period_key))?;
        info!(
            "Merged {}: {} inserted, {} updated",
            period_key, summary.inserted, summary.updated
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::{FsObjectStore, StagingPublisher};
    use crate::warehouse::SqliteWarehouse;
    use tempfile::TempDir;

    fn record(id: i64, title: &str) -> MovieRecord {
        MovieRecord {
            movie_id: id,
            title: title.to_string(),
            release_year: 2010,
            release_date: None,
            original_language: "it".into(),
            overview: "o".into(),
            budget: 0.0,
            revenue: 0.0,
            popularity: 0.0,
            vote_average: 0.0,
            vote_count: 0,
            adult: false,
            genres: vec![],
        }
    }

    struct Setup {
        store: Arc<FsObjectStore>,
        warehouse: Arc<SqliteWarehouse>,
        loader: WarehouseLoader,
        tmp: TempDir,
    }

    fn setup() -> Setup {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FsObjectStore::new(tmp.path().join("staging")).unwrap());
        let warehouse = Arc::new(SqliteWarehouse::new(tmp.path().join("warehouse.db")).unwrap());
        let loader = WarehouseLoader::new(store.clone(), warehouse.clone());
        Setup {
            store,
            warehouse,
            loader,
            tmp,
        }
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let body = format!(
            "{}\n\n{}\n",
            serde_json::to_string(&record(1, "A")).unwrap(),
            serde_json::to_string(&record(2, "B")).unwrap()
        );
        let records = parse_ndjson(&body).unwrap();
        assert_eq!(records, vec![record(1, "A"), record(2, "B")]);
    }

    #[test]
    fn test_parse_ndjson_reports_bad_line() {
        let body = format!("{}\n{{oops", serde_json::to_string(&record(1, "A")).unwrap());
        let err = parse_ndjson(&body).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_load_and_merge_twice_converges() {
        let s = setup();
        let publisher = StagingPublisher::new(s.store.clone());

        let location = publisher
            .publish(&[record(1, "A"), record(2, "B")], "2010")
            .unwrap();
        let first = s.loader.load_and_merge(&location, "2010").unwrap();
        let second = s.loader.load_and_merge(&location, "2010").unwrap();

        assert_eq!(first, MergeSummary { inserted: 2, updated: 0 });
        assert_eq!(second, MergeSummary { inserted: 0, updated: 2 });
        assert_eq!(s.warehouse.count_movies().unwrap(), 2);
    }

    #[test]
    fn test_malformed_object_leaves_table_untouched() {
        let s = setup();
        let location = s.store.put("movies_2011.json", b"not json").unwrap();

        let err = s.loader.load_and_merge(&location, "2011").unwrap_err();
        assert!(matches!(err, PipelineError::Transport(_)));
        assert_eq!(s.warehouse.count_movies().unwrap(), 0);
    }

    #[test]
    fn test_missing_object_is_transport_error() {
        let s = setup();
        let location = StagingLocation {
            bucket: s.tmp.path().join("staging").display().to_string(),
            object_name: "movies_1900.json".into(),
        };
        assert!(matches!(
            s.loader.load_and_merge(&location, "1900"),
            Err(PipelineError::Transport(_))
        ));
    }
}
