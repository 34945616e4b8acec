mod file_config;

pub use file_config::{CatalogConfig, EnrichmentConfig, FileConfig, LlmConfig, RunsConfig};

use crate::catalog::{DEFAULT_CATALOG_BASE_URL, DEFAULT_CATALOG_TIMEOUT, DEFAULT_REQUEST_INTERVAL};
use crate::error::{PipelineError, PipelineResult};
use crate::ingestion::MAX_PAGES;
use crate::state_store::{StateStore, API_KEY_STATE_KEY};
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const MAX_STALE_RUN_AFTER_SECS: u64 = 10 * 365 * 24 * 3600;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub catalog: CatalogSettings,
    pub enrichment: EnrichmentSettings,
    pub runs: RunsSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let staging_dir = file
            .staging_dir
            .map(PathBuf::from)
            .or_else(|| cli.staging_dir.clone())
            .unwrap_or_else(|| db_dir.join("staging"));

        let catalog_file = file.catalog.unwrap_or_default();
        let max_pages = catalog_file.max_pages.unwrap_or(MAX_PAGES);
        if max_pages == 0 {
            bail!("catalog.max_pages must be at least 1");
        }
        if max_pages > MAX_PAGES {
            warn!(
                "catalog.max_pages {} exceeds the hard limit, using {}",
                max_pages, MAX_PAGES
            );
        }
        let catalog = CatalogSettings {
            api_key: catalog_file.api_key.or_else(|| cli.api_key.clone()),
            base_url: catalog_file
                .base_url
                .unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string()),
            max_pages: max_pages.min(MAX_PAGES),
            request_interval_ms: catalog_file
                .request_interval_ms
                .unwrap_or(DEFAULT_REQUEST_INTERVAL.as_millis() as u64),
            timeout_secs: catalog_file
                .timeout_secs
                .unwrap_or(DEFAULT_CATALOG_TIMEOUT.as_secs()),
        };

        let enrichment_file = file.enrichment.unwrap_or_default();
        let batch_size = enrichment_file.batch_size.unwrap_or(10);
        if batch_size == 0 {
            bail!("enrichment.batch_size must be at least 1");
        }
        let enrichment = EnrichmentSettings {
            batch_size,
            concurrency: enrichment_file.concurrency.unwrap_or(1).max(1),
            llm: LlmSettings::resolve(enrichment_file.llm.unwrap_or_default())?,
        };

        let stale_run_after_secs = file
            .runs
            .unwrap_or_default()
            .stale_run_after_secs
            .unwrap_or(6 * 3600);
        if stale_run_after_secs > MAX_STALE_RUN_AFTER_SECS {
            bail!(
                "runs.stale_run_after_secs must be at most {} (ten years)",
                MAX_STALE_RUN_AFTER_SECS
            );
        }
        let runs = RunsSettings {
            stale_run_after_secs,
        };

        Ok(Self {
            db_dir,
            staging_dir,
            catalog,
            enrichment,
            runs,
        })
    }

    pub fn state_db_path(&self) -> PathBuf {
        self.db_dir.join("state.db")
    }

    pub fn warehouse_db_path(&self) -> PathBuf {
        self.db_dir.join("warehouse.db")
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Explicitly configured key; the state store is consulted when absent.
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_pages: u32,
    pub request_interval_ms: u64,
    pub timeout_secs: u64,
}

impl CatalogSettings {
    /// Configured key, falling back to the `API_key` entry of the state store.
    pub fn resolve_api_key(&self, state: &dyn StateStore) -> PipelineResult<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.clone());
        }
        match state.get_state(API_KEY_STATE_KEY)? {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(PipelineError::ConfigMissing(API_KEY_STATE_KEY.to_string())),
        }
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub batch_size: usize,
    /// Maximum classification requests in flight.
    pub concurrency: usize,
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    Ollama,
    OpenAI,
}

impl LlmProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Some(LlmProviderKind::Ollama),
            "openai" => Some(LlmProviderKind::OpenAI),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: LlmProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl LlmSettings {
    pub fn resolve(file: LlmConfig) -> Result<Self> {
        let provider = match file.provider.as_deref() {
            None => LlmProviderKind::Ollama,
            Some(s) => match LlmProviderKind::parse(s) {
                Some(kind) => kind,
                None => bail!("Unknown LLM provider '{}', expected ollama or openai", s),
            },
        };
        if file.api_key.is_some() && file.api_key_command.is_some() {
            bail!("enrichment.llm: set either api_key or api_key_command, not both");
        }

        let (default_url, default_model) = match provider {
            LlmProviderKind::Ollama => ("http://localhost:11434", "llama3.1:8b"),
            LlmProviderKind::OpenAI => ("https://api.openai.com/v1", "gpt-4o-mini"),
        };

        Ok(Self {
            provider,
            base_url: file.base_url.unwrap_or_else(|| default_url.to_string()),
            model: file.model.unwrap_or_else(|| default_model.to_string()),
            api_key: file.api_key,
            api_key_command: file.api_key_command,
            temperature: file.temperature.unwrap_or(0.2),
            timeout_secs: file.timeout_secs.unwrap_or(60),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunsSettings {
    /// Runs still marked running after this long are considered abandoned.
    pub stale_run_after_secs: u64,
}
