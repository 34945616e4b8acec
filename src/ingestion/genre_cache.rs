use super::models::GenreMap;
use crate::catalog::CatalogApi;
use crate::error::PipelineError;
use crate::state_store::{StateStore, GENRES_STATE_KEY};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Lazily bootstrapped genre lookup, persisted in the shared state store.
///
/// Once stored, the map is never refreshed automatically; [`GenreCache::clear`]
/// is the only way to force a new fetch.
pub struct GenreCache {
    state: Arc<dyn StateStore>,
    catalog: Arc<dyn CatalogApi>,
}

impl GenreCache {
    pub fn new(state: Arc<dyn StateStore>, catalog: Arc<dyn CatalogApi>) -> Self {
        Self { state, catalog }
    }

    /// Returns the cached map, fetching and persisting it first if absent.
    ///
    /// `Ok(None)` means the taxonomy request failed; the failure has been
    /// logged and the cache left absent. `Err` is reserved for state store
    /// failures.
    pub async fn ensure_loaded(&self) -> Result<Option<GenreMap>> {
        if let Some(cached) = self.cached()? {
            info!("Genre map already cached ({} genres)", cached.len());
            return Ok(Some(cached));
        }

        let response = match self.catalog.genre_list().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Genre list unavailable: {}", PipelineError::from(e));
                return Ok(None);
            }
        };

        let map = GenreMap::from_entries(response.genres);
        let json = serde_json::to_string(&map).context("Failed to serialize genre map")?;
        self.state
            .set_state(GENRES_STATE_KEY, &json)
            .context("Failed to persist genre map")?;
        info!("Stored genre map with {} genres", map.len());

        Ok(Some(map))
    }

    /// The persisted map, if any.
    pub fn cached(&self) -> Result<Option<GenreMap>> {
        Self::read(self.state.as_ref())
    }

    /// Reads the persisted map without a catalog at hand. A value that no
    /// longer parses is treated as absent.
    pub fn read(state: &dyn StateStore) -> Result<Option<GenreMap>> {
        let Some(raw) = state
            .get_state(GENRES_STATE_KEY)
            .context("Failed to read genre map from state")?
        else {
            return Ok(None);
        };

        match serde_json::from_str::<GenreMap>(&raw) {
            Ok(map) => Ok(Some(map)),
            Err(e) => {
                warn!("Ignoring unreadable cached genre map: {}", e);
                Ok(None)
            }
        }
    }

    /// Drops the persisted map so the next run fetches it again.
    pub fn clear(state: &dyn StateStore) -> Result<()> {
        state
            .delete_state(GENRES_STATE_KEY)
            .context("Failed to clear genre map")?;
        info!("Cleared cached genre map");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, DiscoverPage, GenreEntry, GenreListResponse};
    use crate::state_store::SqliteStateStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct GenreOnlyCatalog {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CatalogApi for GenreOnlyCatalog {
        async fn genre_list(&self) -> Result<GenreListResponse, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CatalogError::Api {
                    status: 401,
                    message: "Invalid API key".into(),
                });
            }
            Ok(GenreListResponse {
                genres: vec![
                    GenreEntry {
                        id: 28,
                        name: "Action".into(),
                    },
                    GenreEntry {
                        id: 18,
                        name: "Drama".into(),
                    },
                ],
            })
        }

        async fn discover_page(&self, _year: i32, _page: u32) -> Result<DiscoverPage, CatalogError> {
            unreachable!("genre cache never paginates")
        }
    }

    fn setup(fail: bool) -> (GenreCache, Arc<SqliteStateStore>, Arc<GenreOnlyCatalog>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let state = Arc::new(SqliteStateStore::new(tmp.path().join("state.db")).unwrap());
        let catalog = Arc::new(GenreOnlyCatalog {
            fail,
            calls: AtomicUsize::new(0),
        });
        let cache = GenreCache::new(state.clone(), catalog.clone());
        (cache, state, catalog, tmp)
    }

    #[tokio::test]
    async fn test_fetches_once_then_serves_cache() {
        let (cache, state, catalog, _tmp) = setup(false);

        let first = cache.ensure_loaded().await.unwrap().unwrap();
        let second = cache.ensure_loaded().await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.label(28), "Action");
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            state.get_state(GENRES_STATE_KEY).unwrap().as_deref(),
            Some(r#"{"18":"Drama","28":"Action"}"#)
        );
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_cache_absent() {
        let (cache, state, _catalog, _tmp) = setup(true);

        assert!(cache.ensure_loaded().await.unwrap().is_none());
        assert_eq!(state.get_state(GENRES_STATE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_existing_value_is_never_refreshed() {
        let (cache, state, catalog, _tmp) = setup(false);
        state
            .set_state(GENRES_STATE_KEY, r#"{"12":"Adventure"}"#)
            .unwrap();

        let map = cache.ensure_loaded().await.unwrap().unwrap();
        assert_eq!(map.label(12), "Adventure");
        assert_eq!(map.label(28), "Unknown");
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_value_is_refetched() {
        let (cache, state, catalog, _tmp) = setup(false);
        state.set_state(GENRES_STATE_KEY, "not json").unwrap();

        let map = cache.ensure_loaded().await.unwrap().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let (cache, state, catalog, _tmp) = setup(false);

        cache.ensure_loaded().await.unwrap();
        GenreCache::clear(state.as_ref()).unwrap();
        assert!(cache.cached().unwrap().is_none());
        assert!(GenreCache::read(state.as_ref()).unwrap().is_none());

        cache.ensure_loaded().await.unwrap();
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 2);
    }
}
