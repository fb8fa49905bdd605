//! Resolve one title against live TMDB and print each search page and the chosen poster.
//! Usage:
//!   cargo run --bin poster_probe -- "<title>" ["<original title>"]
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use async_trait::async_trait;
use cineboard::catalog::MovieRecord;
use cineboard::config::Config;
use cineboard::poster::PosterResolver;
use cineboard::slug::title_key;
use cineboard::tmdb::{PosterSearch, SearchPage, TmdbClient};
use dotenvy::dotenv;
use serde_json::json;
use std::env;
use std::sync::Arc;

struct PrintingSearch {
    inner: TmdbClient,
}

#[async_trait]
impl PosterSearch for PrintingSearch {
    async fn search_movie(&self, query: &str, page: u32) -> Result<SearchPage> {
        let data = self.inner.search_movie(query, page).await?;
        println!(
            "page {}/{} for '{}': {} results",
            page,
            data.total_pages,
            query,
            data.results.len()
        );
        for hit in &data.results {
            println!(
                "  {:<40} key={:<40} poster={}",
                hit.title,
                title_key(&hit.title),
                hit.poster_path.as_deref().unwrap_or("-")
            );
        }
        Ok(data)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let mut args = env::args().skip(1);
    let title = args
        .next()
        .context("usage: poster_probe <title> [original title]")?;
    let original_title = args.next();

    let config = Config::from_env()?;
    let search = PrintingSearch {
        inner: TmdbClient::new(&config.tmdb)?,
    };
    let resolver = PosterResolver::new(Arc::new(search));

    let movie = MovieRecord {
        id: 0,
        title,
        original_title,
        category: String::new(),
        likes: 0,
        dislikes: 0,
    };
    println!("cache key: {}", title_key(&movie.title));
    let enriched = resolver.resolve(movie).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "poster": enriched.poster.poster,
            "overview": enriched.poster.overview,
        }))?
    );
    Ok(())
}
