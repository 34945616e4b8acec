use crate::catalog::CatalogError;
use crate::llm::LlmError;
use std::fmt;
use thiserror::Error;

/// Why a period produced no records. Carried by a skipped period outcome,
/// never by an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDataReason {
    /// The very first catalog page could not be fetched.
    UpstreamUnavailable,
    /// Pagination finished without a single record.
    Empty,
}

impl NoDataReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoDataReason::UpstreamUnavailable => "upstream_unavailable",
            NoDataReason::Empty => "empty",
        }
    }
}

impl fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required piece of configuration or shared state is absent.
    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// Staging or warehouse failure.
    #[error("Transport error: {0:#}")]
    Transport(#[from] anyhow::Error),

    #[error("Unparseable classification response: {0}")]
    Parse(String),

    #[error("Another run is active: {0}")]
    AlreadyRunning(String),
}

impl From<CatalogError> for PipelineError {
    fn from(err: CatalogError) -> Self {
        PipelineError::RemoteFetch(format!("catalog: {}", err))
    }
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        PipelineError::RemoteFetch(format!("model: {}", err))
    }
}


pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
