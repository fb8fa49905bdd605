use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_TMDB_BASE: &str = "https://api.themoviedb.org/3";
const DEFAULT_LANGUAGE: &str = "fr";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3146";

pub const REQUIRED_ENV: [&str; 1] = ["TMDB_API_KEY"];

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: String,
    pub base_url: String,
    pub language: String,
    pub include_adult: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb: TmdbConfig,
    pub catalog_path: Option<PathBuf>,
    pub listen_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("TMDB_API_KEY").ok_or_else(|| anyhow!("TMDB_API_KEY must be set"))?;
        let include_adult = match get("TMDB_INCLUDE_ADULT") {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| anyhow!("TMDB_INCLUDE_ADULT must be true or false, got '{}'", v))?,
            None => true,
        };
        let listen_raw = get("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_raw
            .parse()
            .with_context(|| format!("Invalid LISTEN_ADDR '{}'", listen_raw))?;

        Ok(Self {
            tmdb: TmdbConfig {
                api_key,
                base_url: get("TMDB_BASE_URL").unwrap_or_else(|| DEFAULT_TMDB_BASE.to_string()),
                language: get("TMDB_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                include_adult,
            },
            catalog_path: get("CATALOG_PATH").map(PathBuf::from),
            listen_addr,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_api_key_is_set() {
        let config = Config::from_lookup(lookup(&[("TMDB_API_KEY", "k")])).unwrap();
        assert_eq!(config.tmdb.api_key, "k");
        assert_eq!(config.tmdb.base_url, "https://api.themoviedb.org/3");
        assert_eq!(config.tmdb.language, "fr");
        assert!(config.tmdb.include_adult);
        assert!(config.catalog_path.is_none());
        assert_eq!(config.listen_addr.port(), 3146);
    }

    #[test]
    fn missing_or_blank_api_key_is_an_error() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("TMDB_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("TMDB_API_KEY", "k"),
            ("TMDB_BASE_URL", "http://localhost:9000/3"),
            ("TMDB_LANGUAGE", "en-US"),
            ("TMDB_INCLUDE_ADULT", "no"),
            ("CATALOG_PATH", "/srv/movies.json"),
            ("LISTEN_ADDR", "127.0.0.1:8080"),
        ]))
        .unwrap();
        assert_eq!(config.tmdb.base_url, "http://localhost:9000/3");
        assert_eq!(config.tmdb.language, "en-US");
        assert!(!config.tmdb.include_adult);
        assert_eq!(config.catalog_path, Some(PathBuf::from("/srv/movies.json")));
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[
            ("TMDB_API_KEY", "k"),
            ("TMDB_INCLUDE_ADULT", "maybe")
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup(&[
            ("TMDB_API_KEY", "k"),
            ("LISTEN_ADDR", "not-an-addr")
        ]))
        .is_err());
    }
}
