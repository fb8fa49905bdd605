use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::TmdbConfig;

pub const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";

#[async_trait]
pub trait PosterSearch: Send + Sync {
    async fn search_movie(&self, query: &str, page: u32) -> Result<SearchPage>;
}

/// One page of `/search/movie` results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
}

impl SearchHit {
    pub fn has_poster(&self) -> bool {
        self.poster_path.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Poster URL for a TMDB poster path. A missing path yields the bare image base.
pub fn poster_url(poster_path: Option<&str>) -> String {
    format!("{POSTER_BASE}{}", poster_path.unwrap_or_default())
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
    include_adult: bool,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> Result<Self> {
        let user_agent = format!("cineboard/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            include_adult: config.include_adult,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            // The URL carries the api key, keep it out of error messages.
            return Err(anyhow!("TMDB search HTTP error (status {}): {}", status, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl PosterSearch for TmdbClient {
    async fn search_movie(&self, query: &str, page: u32) -> Result<SearchPage> {
        let url = format!(
            "{}/search/movie?api_key={}&include_adult={}&language={}&page={}&query={}",
            self.base_url,
            self.api_key,
            self.include_adult,
            self.language,
            page,
            urlencoding::encode(query)
        );
        self.get_json(&url)
            .await
            .with_context(|| format!("TMDB search for '{}' (page {}) failed", query, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_page_with_missing_fields() {
        let raw = r#"{
            "page": 1,
            "total_pages": 2,
            "total_results": 21,
            "results": [
                {"id": 1, "title": "Amélie", "poster_path": "/a.jpg", "overview": "Paris."},
                {"id": 2, "title": "Amelie Returns", "poster_path": null}
            ]
        }"#;
        let page: SearchPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.results.len(), 2);
        assert!(page.results[0].has_poster());
        assert!(!page.results[1].has_poster());
        assert_eq!(page.results[1].overview, None);
    }

    #[test]
    fn empty_body_fields_default() {
        let page: SearchPage = serde_json::from_str("{}").unwrap();
        assert_eq!(page.total_pages, 0);
        assert!(page.results.is_empty());
    }

    #[test]
    fn composes_poster_urls() {
        assert_eq!(
            poster_url(Some("/abc.jpg")),
            "https://image.tmdb.org/t/p/w500/abc.jpg"
        );
        assert_eq!(poster_url(None), "https://image.tmdb.org/t/p/w500");
    }

    #[test]
    fn empty_poster_path_is_not_a_poster() {
        let hit = SearchHit {
            title: "X".to_string(),
            poster_path: Some(String::new()),
            overview: None,
        };
        assert!(!hit.has_poster());
    }
}
