//! Filter, annotate and paginate enriched catalog entries into a display page.

use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::HashSet;

use crate::catalog::MovieRecord;
use crate::ledger::MutationLedger;
use crate::poster::EnrichedMovie;
use crate::slug::title_key;

pub const DEFAULT_PAGE_SIZE: u32 = 4;

/// 1-based page request. Both values are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        if page == 0 {
            bail!("page must be at least 1");
        }
        if page_size == 0 {
            bail!("page size must be at least 1");
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn bounds(&self, len: usize) -> (usize, usize) {
        let size = self.page_size as usize;
        let start = (self.page as usize - 1).saturating_mul(size).min(len);
        let end = (self.page as usize).saturating_mul(size).min(len);
        (start, end)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Multi-select category filter: an entry passes when its category equals any selected value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    pub categories: Vec<String>,
}

impl CategoryFilter {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.categories.is_empty()
    }

    fn matches(&self, category: &str) -> bool {
        !self.is_active() || self.categories.iter().any(|c| c == category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedMovie {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    pub category: String,
    pub poster: String,
    pub overview: String,
    pub likes: u32,
    pub dislikes: u32,
    pub liked: bool,
    pub disliked: bool,
}

impl AnnotatedMovie {
    fn new(enriched: EnrichedMovie, ledger: &MutationLedger) -> Self {
        let EnrichedMovie { movie, poster } = enriched;
        let liked = ledger.is_liked(movie.id);
        let disliked = ledger.is_disliked(movie.id);
        Self {
            id: movie.id,
            title: movie.title,
            original_title: movie.original_title,
            category: movie.category,
            poster: poster.poster,
            overview: poster.overview,
            likes: movie.likes.saturating_add(u32::from(liked)),
            dislikes: movie.dislikes.saturating_add(u32::from(disliked)),
            liked,
            disliked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayPage {
    pub generation: u64,
    pub total: usize,
    pub filtered: bool,
    pub results: Vec<AnnotatedMovie>,
}

/// Drops deleted and non-matching entries, annotates the survivors with the
/// ledger's votes, and keeps the requested page in catalog order.
pub fn shape_page(
    movies: Vec<EnrichedMovie>,
    ledger: &MutationLedger,
    pagination: Pagination,
    filter: Option<&CategoryFilter>,
    generation: u64,
) -> DisplayPage {
    let filtered = filter.is_some_and(CategoryFilter::is_active);
    let survivors: Vec<EnrichedMovie> = movies
        .into_iter()
        .filter(|m| !ledger.is_deleted(m.movie.id))
        .filter(|m| filter.map_or(true, |f| f.matches(&m.movie.category)))
        .collect();

    let total = survivors.len();
    let (start, end) = pagination.bounds(total);
    let results = survivors
        .into_iter()
        .skip(start)
        .take(end - start)
        .map(|m| AnnotatedMovie::new(m, ledger))
        .collect();

    DisplayPage {
        generation,
        total,
        filtered,
        results,
    }
}

/// Distinct categories of non-deleted entries, in order of first appearance.
/// Spellings that normalize to the same key collapse to the first one seen.
pub fn distinct_categories(movies: &[MovieRecord], ledger: &MutationLedger) -> Vec<String> {
    let mut seen = HashSet::new();
    movies
        .iter()
        .filter(|m| !ledger.is_deleted(m.id))
        .filter(|m| seen.insert(title_key(&m.category)))
        .map(|m| m.category.clone())
        .collect()
}
