//! HTTP client for the TMDB-compatible movie catalog.
//!
//! Requests are throttled to a minimum interval between calls.

use super::models::{DiscoverPage, GenreListResponse};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_CATALOG_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Catalog API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by catalog API")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout
        } else if err.is_decode() {
            CatalogError::InvalidResponse(err.to_string())
        } else {
            CatalogError::Connection(err.to_string())
        }
    }
}

/// Remote movie catalog. Implemented over HTTP by [`TmdbClient`] and by
/// scripted fakes in tests.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// `GET /genre/movie/list`
    async fn genre_list(&self) -> Result<GenreListResponse, CatalogError>;

    /// `GET /discover/movie?primary_release_year={year}&page={page}`
    async fn discover_page(&self, year: i32, page: u32) -> Result<DiscoverPage, CatalogError>;
}

pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl TmdbClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        request_interval: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            request_interval,
            last_request: Mutex::new(None),
        })
    }

    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.request_interval {
                tokio::time::sleep(self.request_interval - elapsed).await;
            }
        }
        #[cfg(feature = "slowdown")]
        tokio::time::sleep(Duration::from_millis(500)).await;
        *last = Some(Instant::now());
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        self.rate_limit().await;

        let url = format!("{}{}", self.base_url, path);
        debug!("Catalog request: GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CatalogError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn genre_list(&self) -> Result<GenreListResponse, CatalogError> {
        self.get_json("/genre/movie/list", &[]).await
    }

    async fn discover_page(&self, year: i32, page: u32) -> Result<DiscoverPage, CatalogError> {
        self.get_json(
            "/discover/movie",
            &[
                ("primary_release_year", year.to_string()),
                ("page", page.to_string()),
            ],
        )
        .await
    }
}
