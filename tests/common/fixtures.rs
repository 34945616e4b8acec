//! Throw-away pipeline environments backed by temporary directories.

use super::constants::TEST_YEAR;
use super::fakes::FakeCatalogApi;
use moviemood_pipeline::ingestion::MovieRecord;
use moviemood_pipeline::pipeline::PeriodPipeline;
use moviemood_pipeline::runs::PipelineRunner;
use moviemood_pipeline::staging::{FsObjectStore, ObjectStore};
use moviemood_pipeline::state_store::{SqliteStateStore, StateStore};
use moviemood_pipeline::warehouse::{SqliteWarehouse, Warehouse};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Real SQLite state and warehouse plus a directory bucket, all removed on drop.
pub struct TestEnv {
    pub state: Arc<SqliteStateStore>,
    pub warehouse: Arc<SqliteWarehouse>,
    pub staging: Arc<FsObjectStore>,
    pub staging_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = Arc::new(
            SqliteStateStore::new(temp_dir.path().join("state.db"))
                .expect("Failed to open state store"),
        );
        let warehouse = Arc::new(
            SqliteWarehouse::new(temp_dir.path().join("warehouse.db"))
                .expect("Failed to open warehouse"),
        );
        let staging_dir = temp_dir.path().join("staging");
        let staging =
            Arc::new(FsObjectStore::new(staging_dir.clone()).expect("Failed to open bucket"));

        Self {
            state,
            warehouse,
            staging,
            staging_dir,
            _temp_dir: temp_dir,
        }
    }

    pub fn pipeline(&self, catalog: Arc<FakeCatalogApi>) -> PeriodPipeline {
        PeriodPipeline::new(
            catalog,
            self.state.clone() as Arc<dyn StateStore>,
            self.staging.clone() as Arc<dyn ObjectStore>,
            self.warehouse.clone() as Arc<dyn Warehouse>,
        )
    }

    pub fn runner(&self) -> PipelineRunner {
        PipelineRunner::new(self.state.clone(), 6 * 3600)
    }
}

pub fn movie_record(movie_id: i64, title: &str, overview: &str) -> MovieRecord {
    MovieRecord {
        movie_id,
        title: title.to_string(),
        release_year: TEST_YEAR,
        release_date: None,
        original_language: "en".to_string(),
        overview: overview.to_string(),
        budget: 0.0,
        revenue: 0.0,
        popularity: 1.0,
        vote_average: 5.0,
        vote_count: 10,
        adult: false,
        genres: vec!["Drama".to_string()],
    }
}

/// Puts rows straight into the permanent table through the staging merge.
pub fn seed_movies(warehouse: &dyn Warehouse, records: &[MovieRecord]) {
    warehouse.load_staging(records).expect("stage-load failed");
    warehouse.merge_staging().expect("merge failed");
}
