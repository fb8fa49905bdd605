use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::catalog::MovieRecord;
use crate::slug::title_key;
use crate::tmdb::{poster_url, PosterSearch, SearchHit};

/// Highest result page scanned for an exact title match.
pub const MAX_SCAN_PAGES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poster {
    pub poster: String,
    pub overview: String,
}

impl Poster {
    fn from_hit(hit: Option<&SearchHit>) -> Self {
        Self {
            poster: poster_url(hit.and_then(|h| h.poster_path.as_deref())),
            overview: hit
                .and_then(|h| h.overview.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedMovie {
    pub movie: MovieRecord,
    pub poster: Poster,
}

#[derive(Debug)]
enum Scan {
    Searching(u32),
    FoundExact(SearchHit),
    FallbackFirst,
    Resolved(Option<SearchHit>),
}

/// Resolves posters and synopses through a [`PosterSearch`], memoized per
/// normalized title for the lifetime of the resolver.
pub struct PosterResolver {
    search: Arc<dyn PosterSearch>,
    cache: Mutex<HashMap<String, Arc<OnceCell<Poster>>>>,
}

impl PosterResolver {
    pub fn new(search: Arc<dyn PosterSearch>) -> Self {
        Self {
            search,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, movie: MovieRecord) -> Result<EnrichedMovie> {
        let key = title_key(&movie.title);
        let cell = {
            let mut cache = self.cache.lock().await;
            Arc::clone(cache.entry(key.clone()).or_default())
        };

        if let Some(poster) = cell.get() {
            debug!("Poster cache hit for '{}'", key);
            return Ok(EnrichedMovie {
                movie,
                poster: poster.clone(),
            });
        }

        // Concurrent callers for the same key wait here on the first lookup.
        let poster = cell
            .get_or_try_init(|| self.lookup(movie.search_title(), &key))
            .await?
            .clone();
        Ok(EnrichedMovie { movie, poster })
    }

    /// Number of normalized titles with a resolved poster.
    pub(crate) async fn cached_titles(&self) -> usize {
        let cache = self.cache.lock().await;
        cache.values().filter(|cell| cell.initialized()).count()
    }

    #[cfg(test)]
    async fn cached(&self, key: &str) -> Option<Poster> {
        let cache = self.cache.lock().await;
        cache.get(key).and_then(|cell| cell.get().cloned())
    }

    async fn lookup(&self, query: &str, key: &str) -> Result<Poster> {
        let mut state = Scan::Searching(1);
        loop {
            state = match state {
                Scan::Searching(page) => {
                    let data = self.search.search_movie(query, page).await?;
                    let exact = data
                        .results
                        .into_iter()
                        .find(|hit| title_key(&hit.title) == key && hit.has_poster());
                    match exact {
                        Some(hit) => Scan::FoundExact(hit),
                        None if page < MAX_SCAN_PAGES.min(data.total_pages) => {
                            Scan::Searching(page + 1)
                        }
                        None => Scan::FallbackFirst,
                    }
                }
                Scan::FoundExact(hit) => {
                    debug!("Exact poster match for '{}': '{}'", key, hit.title);
                    Scan::Resolved(Some(hit))
                }
                Scan::FallbackFirst => {
                    let data = self.search.search_movie(query, 1).await?;
                    let first = data.results.into_iter().next();
                    match &first {
                        Some(hit) => warn!(
                            "No exact poster match for '{}', using first result '{}'",
                            key, hit.title
                        ),
                        None => warn!("No poster search results for '{}'", key),
                    }
                    Scan::Resolved(first)
                }
                Scan::Resolved(hit) => return Ok(Poster::from_hit(hit.as_ref())),
            };
        }
    }
}
