//! In-memory stand-ins for the network collaborators.

use super::constants::*;
use anyhow::{bail, Result};
use async_trait::async_trait;
use moviemood_pipeline::catalog::{
    CatalogApi, CatalogError, DiscoverPage, GenreEntry, GenreListResponse, RawMovie,
};
use moviemood_pipeline::ingestion::MovieRecord;
use moviemood_pipeline::llm::{
    CompletionOptions, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
    TokenUsage,
};
use moviemood_pipeline::warehouse::{MergeSummary, MoodCandidate, StoredMovie, Warehouse};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Catalog
// =============================================================================

/// What the fake catalog serves for one release year.
///
/// Every page from 1 to `total_pages` holds `per_page` movies unless listed
/// in `failing_pages`.
#[derive(Debug, Clone)]
pub struct FakeYear {
    pub total_pages: u32,
    pub per_page: u32,
    pub failing_pages: HashSet<u32>,
    /// Changes titles and popularity so a re-ingestion carries new values.
    pub revision: u32,
}

impl FakeYear {
    pub fn pages(total_pages: u32, per_page: u32) -> Self {
        Self {
            total_pages,
            per_page,
            failing_pages: HashSet::new(),
            revision: 0,
        }
    }

    pub fn failing_at(mut self, page: u32) -> Self {
        self.failing_pages.insert(page);
        self
    }

    /// Stable id of the `index`-th movie on `page`.
    pub fn movie_id(year: i32, page: u32, index: u32) -> i64 {
        year as i64 * 1_000_000 + page as i64 * 1_000 + index as i64
    }

    fn raw_movie(&self, year: i32, page: u32, index: u32) -> RawMovie {
        let id = Self::movie_id(year, page, index);
        RawMovie {
            id,
            title: format!("Movie {} r{}", id, self.revision),
            release_date: Some(format!("{}-03-{:02}", year, index % 28 + 1)),
            original_language: "en".to_string(),
            overview: format!("Overview of movie {}", id),
            budget: 1_000_000.0,
            revenue: 2_500_000.0,
            popularity: 10.0 + self.revision as f64,
            vote_average: 7.1,
            vote_count: 100,
            adult: false,
            genre_ids: if index % 2 == 0 {
                vec![GENRE_ACTION_ID, GENRE_DRAMA_ID]
            } else {
                vec![GENRE_UNMAPPED_ID]
            },
        }
    }
}

pub struct FakeCatalogApi {
    genres: Mutex<Option<Vec<GenreEntry>>>,
    years: Mutex<HashMap<i32, FakeYear>>,
    page_requests: Mutex<Vec<(i32, u32)>>,
    genre_calls: AtomicUsize,
}

impl FakeCatalogApi {
    /// A catalog with the standard genre taxonomy and no movies.
    pub fn new() -> Self {
        Self {
            genres: Mutex::new(Some(vec![
                GenreEntry {
                    id: GENRE_ACTION_ID,
                    name: "Action".to_string(),
                },
                GenreEntry {
                    id: GENRE_DRAMA_ID,
                    name: "Drama".to_string(),
                },
                GenreEntry {
                    id: GENRE_COMEDY_ID,
                    name: "Comedy".to_string(),
                },
            ])),
            years: Mutex::new(HashMap::new()),
            page_requests: Mutex::new(Vec::new()),
            genre_calls: AtomicUsize::new(0),
        }
    }

    /// The genre endpoint answers with an error.
    pub fn without_genres(self) -> Self {
        *self.genres.lock().unwrap() = None;
        self
    }

    pub fn with_year(self, year: i32, fake_year: FakeYear) -> Self {
        self.years.lock().unwrap().insert(year, fake_year);
        self
    }

    pub fn bump_revision(&self, year: i32) {
        if let Some(fake_year) = self.years.lock().unwrap().get_mut(&year) {
            fake_year.revision += 1;
        }
    }

    pub fn page_requests(&self) -> Vec<(i32, u32)> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn requested_pages(&self, year: i32) -> Vec<u32> {
        self.page_requests()
            .into_iter()
            .filter(|(y, _)| *y == year)
            .map(|(_, page)| page)
            .collect()
    }

    pub fn genre_calls(&self) -> usize {
        self.genre_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogApi for FakeCatalogApi {
    async fn genre_list(&self) -> Result<GenreListResponse, CatalogError> {
        self.genre_calls.fetch_add(1, Ordering::SeqCst);
        match self.genres.lock().unwrap().clone() {
            Some(genres) => Ok(GenreListResponse { genres }),
            None => Err(CatalogError::Api {
                status: 401,
                message: "Invalid API key".to_string(),
            }),
        }
    }

    async fn discover_page(&self, year: i32, page: u32) -> Result<DiscoverPage, CatalogError> {
        self.page_requests.lock().unwrap().push((year, page));

        let years = self.years.lock().unwrap();
        let Some(fake_year) = years.get(&year) else {
            return Ok(DiscoverPage {
                total_pages: 1,
                results: Vec::new(),
            });
        };
        if fake_year.failing_pages.contains(&page) {
            return Err(CatalogError::Api {
                status: 503,
                message: format!("page {} unavailable", page),
            });
        }
        if page > fake_year.total_pages {
            return Err(CatalogError::Api {
                status: 422,
                message: "page out of range".to_string(),
            });
        }

        Ok(DiscoverPage {
            total_pages: fake_year.total_pages,
            results: (0..fake_year.per_page)
                .map(|index| fake_year.raw_movie(year, page, index))
                .collect(),
        })
    }
}

// =============================================================================
// LLM
// =============================================================================

enum Reply {
    Text(String),
    /// Cut off by the token limit.
    Truncated(String),
    Error,
}

/// Answers prompts from a script keyed by a fragment of the prompt text,
/// falling back to a default reply.
pub struct FakeLlmProvider {
    default_reply: String,
    scripted: Mutex<Vec<(String, Reply)>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeLlmProvider {
    pub fn replying(default_reply: &str) -> Self {
        Self {
            default_reply: default_reply.to_string(),
            scripted: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn reply_for(self, prompt_fragment: &str, reply: &str) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .push((prompt_fragment.to_string(), Reply::Text(reply.to_string())));
        self
    }

    pub fn truncate_for(self, prompt_fragment: &str, partial_reply: &str) -> Self {
        self.scripted.lock().unwrap().push((
            prompt_fragment.to_string(),
            Reply::Truncated(partial_reply.to_string()),
        ));
        self
    }

    pub fn fail_for(self, prompt_fragment: &str) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .push((prompt_fragment.to_string(), Reply::Error));
        self
    }

    /// Holds each request open for `delay`, so overlapping calls can be observed.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn reply_to(&self, prompt: &str) -> Option<(String, FinishReason)> {
        let scripted = self.scripted.lock().unwrap();
        for (fragment, reply) in scripted.iter() {
            if prompt.contains(fragment.as_str()) {
                return match reply {
                    Reply::Text(text) => Some((text.clone(), FinishReason::Stop)),
                    Reply::Truncated(text) => Some((text.clone(), FinishReason::MaxTokens)),
                    Reply::Error => None,
                };
            }
        }
        Some((self.default_reply.clone(), FinishReason::Stop))
    }
}

#[async_trait]
impl LlmProvider for FakeLlmProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let reply = self.reply_to(&prompt);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some((text, finish_reason)) => Ok(CompletionResponse {
                message: Message::assistant(text),
                finish_reason,
                usage: Some(TokenUsage {
                    prompt_tokens: 80,
                    completion_tokens: 7,
                    total_tokens: 87,
                }),
            }),
            None => Err(LlmError::Api {
                status: 500,
                message: "model crashed".to_string(),
            }),
        }
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

// =============================================================================
// Warehouse
// =============================================================================

/// Delegates to a real warehouse but refuses mood writes for chosen rows.
pub struct FailingWriteWarehouse {
    inner: Arc<dyn Warehouse>,
    failing_ids: HashSet<i64>,
}

impl FailingWriteWarehouse {
    pub fn new(inner: Arc<dyn Warehouse>, failing_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            inner,
            failing_ids: failing_ids.into_iter().collect(),
        }
    }
}

impl Warehouse for FailingWriteWarehouse {
    fn load_staging(&self, records: &[MovieRecord]) -> Result<usize> {
        self.inner.load_staging(records)
    }

    fn merge_staging(&self) -> Result<MergeSummary> {
        self.inner.merge_staging()
    }

    fn ensure_mood_columns(&self) -> Result<bool> {
        self.inner.ensure_mood_columns()
    }

    fn select_unprocessed(&self, limit: usize) -> Result<Vec<MoodCandidate>> {
        self.inner.select_unprocessed(limit)
    }

    fn set_mood(&self, movie_id: i64, mood: &str, mood_score: i64) -> Result<()> {
        if self.failing_ids.contains(&movie_id) {
            bail!("disk full while updating movie {}", movie_id);
        }
        self.inner.set_mood(movie_id, mood, mood_score)
    }

    fn get_movie(&self, movie_id: i64) -> Result<Option<StoredMovie>> {
        self.inner.get_movie(movie_id)
    }

    fn count_movies(&self) -> Result<usize> {
        self.inner.count_movies()
    }
}
