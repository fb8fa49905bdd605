use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::info;

const BUNDLED_MOVIES: &str = include_str!("../data/movies.json");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MovieRecord {
    #[serde(deserialize_with = "int_or_numeric_string")]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    pub category: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub dislikes: u32,
}

impl MovieRecord {
    /// Title sent to the poster search: the original title when the catalog has one.
    pub fn search_title(&self) -> &str {
        self.original_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.title)
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn all_movies(&self) -> Result<Vec<MovieRecord>>;
}

/// Catalog read from a JSON array of movie records, parsed once at startup.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    movies: Vec<MovieRecord>,
}

impl JsonCatalog {
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_MOVIES).context("Bundled catalog is invalid")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid catalog file {}", path.display()))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let catalog = match path {
            Some(p) => Self::from_path(p)?,
            None => Self::bundled()?,
        };
        info!(
            "Loaded catalog with {} movies from {}",
            catalog.movies.len(),
            path.map(|p| p.display().to_string())
                .unwrap_or_else(|| "bundled dataset".to_string())
        );
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let movies: Vec<MovieRecord> = serde_json::from_str(raw).context("JSON parse failed")?;
        Self::new(movies)
    }

    pub fn new(movies: Vec<MovieRecord>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for movie in &movies {
            if !seen.insert(movie.id) {
                return Err(anyhow!("Duplicate movie id {} in catalog", movie.id));
            }
        }
        Ok(Self { movies })
    }
}

#[async_trait]
impl CatalogSource for JsonCatalog {
    async fn all_movies(&self) -> Result<Vec<MovieRecord>> {
        Ok(self.movies.clone())
    }
}

fn int_or_numeric_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(id) => Ok(id),
        RawId::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("movie id '{}' is not an integer", s))),
    }
}
