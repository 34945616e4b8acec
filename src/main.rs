use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use moviemood_pipeline::catalog::{CatalogApi, TmdbClient};
use moviemood_pipeline::config::{self, AppConfig};
use moviemood_pipeline::ingestion::GenreCache;
use moviemood_pipeline::llm;
use moviemood_pipeline::mood::{MoodClassifier, MoodEnricher};
use moviemood_pipeline::pipeline::{PeriodOutcome, PeriodPipeline};
use moviemood_pipeline::runs::{backfill_job_id, PipelineRunner};
use moviemood_pipeline::staging::{FsObjectStore, ObjectStore};
use moviemood_pipeline::state_store::{SqliteStateStore, StateStore};
use moviemood_pipeline::warehouse::{SqliteWarehouse, Warehouse};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "moviemood", about = "Movie catalog ingestion and mood enrichment")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the state and warehouse databases.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Directory used as the staging bucket. Defaults to <db_dir>/staging.
    #[clap(long, value_parser = parse_path)]
    pub staging_dir: Option<PathBuf>,

    /// Catalog API key. Falls back to the `API_key` state entry.
    #[clap(long, env = "CATALOG_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingests the movies released in one year.
    Ingest {
        #[clap(long)]
        year: i32,
    },

    /// Ingests every year in the inclusive range, oldest first, as one run.
    Backfill {
        #[clap(long)]
        from: i32,
        #[clap(long)]
        to: i32,
    },

    /// Classifies one batch of movies that have no mood yet.
    Enrich {
        /// Batch size, defaults to enrichment.batch_size.
        #[clap(long)]
        limit: Option<usize>,
    },

    /// Loads the genre map if absent, or inspects/clears the cached one.
    Genres {
        /// Print the cached map without contacting the catalog.
        #[clap(long, conflicts_with = "clear")]
        show: bool,

        /// Delete the cached map so the next run fetches it again.
        #[clap(long)]
        clear: bool,
    },

    /// Prints recorded pipeline runs, most recent first.
    Runs {
        #[clap(long)]
        job: Option<String>,

        #[clap(long, default_value_t = 20)]
        limit: usize,
    },
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            staging_dir: args.staging_dir.clone(),
            api_key: args.api_key.clone(),
        }
    }
}

struct Stores {
    state: Arc<dyn StateStore>,
    warehouse: Arc<dyn Warehouse>,
    staging: Arc<dyn ObjectStore>,
}

impl Stores {
    fn open(app_config: &AppConfig) -> Result<Self> {
        info!("Opening state database at {:?}", app_config.state_db_path());
        let state: Arc<dyn StateStore> =
            Arc::new(SqliteStateStore::new(app_config.state_db_path())?);

        info!(
            "Opening warehouse database at {:?}",
            app_config.warehouse_db_path()
        );
        let warehouse: Arc<dyn Warehouse> =
            Arc::new(SqliteWarehouse::new(app_config.warehouse_db_path())?);

        info!("Using staging bucket {:?}", app_config.staging_dir);
        let staging: Arc<dyn ObjectStore> =
            Arc::new(FsObjectStore::new(app_config.staging_dir.clone())?);

        Ok(Self {
            state,
            warehouse,
            staging,
        })
    }

    fn period_pipeline(&self, app_config: &AppConfig) -> Result<PeriodPipeline> {
        let catalog_settings = &app_config.catalog;
        let api_key = catalog_settings.resolve_api_key(self.state.as_ref())?;
        let catalog: Arc<dyn CatalogApi> = Arc::new(TmdbClient::new(
            &catalog_settings.base_url,
            &api_key,
            catalog_settings.timeout(),
            catalog_settings.request_interval(),
        )?);

        Ok(PeriodPipeline::new(
            catalog,
            self.state.clone(),
            self.staging.clone(),
            self.warehouse.clone(),
        )
        .with_max_pages(catalog_settings.max_pages))
    }
}

fn print_outcome(year: i32, outcome: &PeriodOutcome) {
    match outcome {
        PeriodOutcome::Merged {
            fetched,
            inserted,
            updated,
        } => println!(
            "{}: merged {} movies ({} new, {} updated)",
            year, fetched, inserted, updated
        ),
        PeriodOutcome::Skipped(reason) => println!("{}: skipped ({})", year, reason),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    let stores = Stores::open(&app_config)?;
    let runner = PipelineRunner::new(stores.state.clone(), app_config.runs.stale_run_after_secs);

    match cli_args.command {
        Command::Ingest { year } => {
            let pipeline = stores.period_pipeline(&app_config)?;
            let outcome = runner.ingest_year(&pipeline, year).await?;
            print_outcome(year, &outcome);
        }
        Command::Backfill { from, to } => {
            if from > to {
                bail!("Invalid backfill range: {} is after {}", from, to);
            }
            let pipeline = stores.period_pipeline(&app_config)?;
            let report = runner
                .with_trigger(backfill_job_id(from, to))
                .backfill(&pipeline, from, to)
                .await?;
            println!(
                "Backfill {}..={}: {} merged, {} skipped, {} inserted, {} updated",
                from,
                to,
                report.merged.len(),
                report.skipped.len(),
                report.inserted,
                report.updated
            );
            if !report.skipped.is_empty() {
                println!("Skipped years: {:?}", report.skipped);
            }
        }
        Command::Enrich { limit } => {
            let settings = &app_config.enrichment;
            let provider = llm::create_provider(&settings.llm);
            info!(
                "Using {} provider with model {}",
                provider.name(),
                provider.model()
            );
            if let Err(e) = provider.health_check().await {
                warn!("LLM provider health check failed: {}", e);
            }

            let classifier = MoodClassifier::new(provider, llm::completion_options(&settings.llm));
            let enricher = MoodEnricher::new(stores.warehouse.clone(), classifier)
                .with_concurrency(settings.concurrency);
            let summary = runner
                .enrich(&enricher, limit.unwrap_or(settings.batch_size))
                .await?;
            println!(
                "Enrichment: {} selected, {} classified, {} fallbacks, {} write failures",
                summary.selected, summary.classified, summary.fallbacks, summary.write_failures
            );
        }
        Command::Genres { show, clear } => {
            if clear {
                GenreCache::clear(stores.state.as_ref())?;
                println!("Genre map cleared");
                return Ok(());
            }

            let genres = if show {
                GenreCache::read(stores.state.as_ref())?
            } else {
                let pipeline = stores.period_pipeline(&app_config)?;
                pipeline.genre_cache().ensure_loaded().await?
            };
            match genres {
                Some(genres) => {
                    for (id, name) in genres.iter() {
                        println!("{:>6}  {}", id, name);
                    }
                }
                None if show => println!("No genre map cached"),
                None => bail!("Genre list could not be fetched from the catalog"),
            }
        }
        Command::Runs { job, limit } => {
            let runs = stores.state.get_run_history(job.as_deref(), limit)?;
            if runs.is_empty() {
                println!("No runs recorded");
            }
            for run in runs {
                let finished = run
                    .finished_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "#{} {} [{}] started {} finished {} by {}{}",
                    run.id,
                    run.job_id,
                    run.status.as_str(),
                    run.started_at.to_rfc3339(),
                    finished,
                    run.triggered_by,
                    run.error_message
                        .map(|e| format!(" error: {}", e))
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
