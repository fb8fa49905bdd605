use anyhow::{Context, Result};
use futures::future::try_join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::catalog::CatalogSource;
use crate::ledger::MutationLedger;
use crate::pipeline::{self, CategoryFilter, DisplayPage, Pagination};
use crate::poster::PosterResolver;
use crate::tmdb::PosterSearch;

/// Owns the catalog, the poster cache and the mutation ledger for one process.
pub struct Shelf {
    catalog: Arc<dyn CatalogSource>,
    resolver: PosterResolver,
    ledger: RwLock<MutationLedger>,
    generation: AtomicU64,
}

impl Shelf {
    pub fn new(catalog: Arc<dyn CatalogSource>, search: Arc<dyn PosterSearch>) -> Self {
        Self {
            catalog,
            resolver: PosterResolver::new(search),
            ledger: RwLock::new(MutationLedger::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Runs the full pipeline. Every run gets a new generation number.
    pub async fn build_page(
        &self,
        pagination: Pagination,
        filter: Option<&CategoryFilter>,
    ) -> Result<DisplayPage> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let movies = self
            .catalog
            .all_movies()
            .await
            .context("Failed to load catalog")?;
        let enriched = try_join_all(movies.into_iter().map(|m| self.resolver.resolve(m))).await?;

        let ledger = self.ledger.read().await;
        let page = pipeline::shape_page(enriched, &ledger, pagination, filter, generation);
        info!(
            generation,
            page = pagination.page(),
            page_size = pagination.page_size(),
            total = page.total,
            filtered = page.filtered,
            "Built display page"
        );
        let cached_titles = self.resolver.cached_titles().await;
        debug!(
            generation,
            cached_titles,
            "Poster cache size"
        );
        Ok(page)
    }

    /// Like [`Shelf::build_page`], but yields `None` when a newer run was
    /// started before this one settled.
    pub async fn build_latest_page(
        &self,
        pagination: Pagination,
        filter: Option<&CategoryFilter>,
    ) -> Result<Option<DisplayPage>> {
        let page = self.build_page(pagination, filter).await?;
        if self.is_latest(page.generation) {
            Ok(Some(page))
        } else {
            debug!(generation = page.generation, "Discarding superseded page");
            Ok(None)
        }
    }

    pub fn is_latest(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub async fn categories(&self) -> Result<Vec<String>> {
        let movies = self
            .catalog
            .all_movies()
            .await
            .context("Failed to load catalog")?;
        let ledger = self.ledger.read().await;
        Ok(pipeline::distinct_categories(&movies, &ledger))
    }

    pub async fn delete(&self, id: i64) {
        self.ledger.write().await.delete(id);
        info!("Deleted movie {}", id);
    }

    pub async fn like(&self, id: i64) {
        self.ledger.write().await.like(id);
        debug!("Liked movie {}", id);
    }

    pub async fn unlike(&self, id: i64) {
        self.ledger.write().await.unlike(id);
        debug!("Unliked movie {}", id);
    }

    pub async fn dislike(&self, id: i64) {
        self.ledger.write().await.dislike(id);
        debug!("Disliked movie {}", id);
    }

    pub async fn undislike(&self, id: i64) {
        self.ledger.write().await.undislike(id);
        debug!("Undisliked movie {}", id);
    }

    pub async fn ledger(&self) -> MutationLedger {
        self.ledger.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{JsonCatalog, MovieRecord};
    use crate::tmdb::{SearchHit, SearchPage};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Answers every query with one exact hit for the query text.
    #[derive(Default)]
    struct EchoSearch {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PosterSearch for EchoSearch {
        async fn search_movie(&self, query: &str, _page: u32) -> Result<SearchPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchPage {
                page: 1,
                total_pages: 1,
                results: vec![SearchHit {
                    title: query.to_string(),
                    poster_path: Some(format!("/{}.jpg", crate::slug::title_key(query))),
                    overview: Some(format!("About {query}")),
                }],
            })
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl PosterSearch for FailingSearch {
        async fn search_movie(&self, _query: &str, _page: u32) -> Result<SearchPage> {
            Err(anyhow!("TMDB unavailable"))
        }
    }

    /// Blocks until released, so a second run can start while the first is in flight.
    struct GatedSearch {
        gate: Notify,
    }

    #[async_trait]
    impl PosterSearch for GatedSearch {
        async fn search_movie(&self, query: &str, page: u32) -> Result<SearchPage> {
            self.gate.notified().await;
            EchoSearch::default().search_movie(query, page).await
        }
    }

    struct BrokenCatalog;

    #[async_trait]
    impl CatalogSource for BrokenCatalog {
        async fn all_movies(&self) -> Result<Vec<MovieRecord>> {
            Err(anyhow!("catalog file missing"))
        }
    }

    fn catalog(entries: &[(i64, &str, &str, u32)]) -> Arc<dyn CatalogSource> {
        let movies = entries
            .iter()
            .map(|&(id, title, category, likes)| MovieRecord {
                id,
                title: title.to_string(),
                original_title: None,
                category: category.to_string(),
                likes,
                dislikes: 0,
            })
            .collect();
        Arc::new(JsonCatalog::new(movies).unwrap())
    }

    fn five_action_three_comedy() -> Arc<dyn CatalogSource> {
        catalog(&[
            (1, "Heat", "action", 0),
            (2, "Ronin", "action", 0),
            (3, "Speed", "action", 0),
            (4, "Face Off", "action", 0),
            (5, "Drive", "action", 0),
            (6, "Airplane", "comedy", 0),
            (7, "Big", "comedy", 10),
            (8, "Clue", "comedy", 0),
        ])
    }

    #[tokio::test]
    async fn pages_and_filters_the_catalog() {
        let shelf = Shelf::new(five_action_three_comedy(), Arc::new(EchoSearch::default()));

        let page = shelf.build_page(Pagination::new(1, 4).unwrap(), None).await.unwrap();
        assert_eq!(page.total, 8);
        assert!(!page.filtered);
        assert_eq!(page.results.len(), 4);
        assert_eq!(page.results[0].poster, "https://image.tmdb.org/t/p/w500/heat.jpg");
        assert_eq!(page.results[0].overview, "About Heat");

        let comedy = CategoryFilter::new(["comedy"]);
        let page = shelf
            .build_page(Pagination::new(1, 4).unwrap(), Some(&comedy))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.filtered);
        assert_eq!(page.results.len(), 3);
    }

    #[tokio::test]
    async fn repeated_runs_hit_the_poster_cache() {
        let search = Arc::new(EchoSearch::default());
        let shelf = Shelf::new(five_action_three_comedy(), search.clone());

        shelf.build_page(Pagination::default(), None).await.unwrap();
        shelf.build_page(Pagination::new(2, 4).unwrap(), None).await.unwrap();
        assert_eq!(search.calls.load(Ordering::SeqCst), 8);
        assert_eq!(shelf.resolver.cached_titles().await, 8);
    }

    #[tokio::test]
    async fn ledger_operations_flow_into_the_next_page() {
        let shelf = Shelf::new(five_action_three_comedy(), Arc::new(EchoSearch::default()));
        let all = Pagination::new(1, 10).unwrap();

        shelf.like(7).await;
        let page = shelf.build_page(all, None).await.unwrap();
        let big = page.results.iter().find(|m| m.id == 7).unwrap();
        assert_eq!(big.likes, 11);
        assert!(big.liked);

        shelf.dislike(7).await;
        let page = shelf.build_page(all, None).await.unwrap();
        let big = page.results.iter().find(|m| m.id == 7).unwrap();
        assert_eq!((big.likes, big.dislikes), (10, 1));
        assert!(big.disliked && !big.liked);

        shelf.like(7).await;
        shelf.delete(7).await;
        shelf.delete(7).await;
        let page = shelf.build_page(all, None).await.unwrap();
        assert_eq!(page.total, 7);
        assert!(page.results.iter().all(|m| m.id != 7));
        assert!(shelf.ledger().await.is_liked(7));

        assert_eq!(shelf.categories().await.unwrap(), vec!["action", "comedy"]);
    }

    #[tokio::test]
    async fn one_failing_lookup_fails_the_run() {
        let shelf = Shelf::new(five_action_three_comedy(), Arc::new(FailingSearch));
        let err = shelf.build_page(Pagination::default(), None).await.unwrap_err();
        assert!(format!("{err:#}").contains("TMDB unavailable"));
    }

    #[tokio::test]
    async fn catalog_failure_is_reported() {
        let shelf = Shelf::new(Arc::new(BrokenCatalog), Arc::new(EchoSearch::default()));
        let err = shelf.build_page(Pagination::default(), None).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load catalog"));
        assert!(shelf.categories().await.is_err());
    }

    #[tokio::test]
    async fn superseded_runs_are_discarded() {
        let search = Arc::new(GatedSearch {
            gate: Notify::new(),
        });
        let shelf = Arc::new(Shelf::new(
            catalog(&[(1, "Heat", "action", 0)]),
            search.clone(),
        ));

        let stale = {
            let shelf = Arc::clone(&shelf);
            tokio::spawn(async move {
                shelf
                    .build_latest_page(Pagination::default(), None)
                    .await
            })
        };
        while !shelf.is_latest(1) {
            tokio::task::yield_now().await;
        }

        let fresh = {
            let shelf = Arc::clone(&shelf);
            tokio::spawn(async move {
                shelf
                    .build_latest_page(Pagination::default(), None)
                    .await
            })
        };
        while !shelf.is_latest(2) {
            tokio::task::yield_now().await;
        }

        search.gate.notify_one();
        let stale = stale.await.unwrap().unwrap();
        let fresh = fresh.await.unwrap().unwrap();

        assert!(stale.is_none());
        assert_eq!(fresh.unwrap().generation, 2);
    }
}
