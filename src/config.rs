use std::env;
use std::path::PathBuf;

use crate::state::Season;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
pub const DEFAULT_JIKAN_BASE: &str = "https://api.jikan.moe/v4";
pub const DEFAULT_YEAR: &str = "2025";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const MAX_FETCH_PARALLELISM: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_base: String,
    pub year: String,
    pub season: Season,
    pub jikan_base: String,
    /// Upper bound on concurrent cover lookups. `None` runs one lookup per
    /// pending record.
    pub fetch_parallelism: Option<usize>,
    pub export_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            year: DEFAULT_YEAR.to_string(),
            season: Season::Fall,
            jikan_base: DEFAULT_JIKAN_BASE.to_string(),
            fetch_parallelism: None,
            export_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// Loads `.env.local` and `.env` (process variables win), then reads the
    /// environment.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_env()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).and_then(|raw| non_empty(&raw).map(str::to_string));

        let season = read("PREDICTIONS_SEASON")
            .and_then(|raw| Season::parse(&raw))
            .unwrap_or(defaults.season);
        let fetch_parallelism = read("FETCH_PARALLELISM")
            .and_then(|raw| raw.parse::<usize>().ok())
            .map(|val| val.clamp(1, MAX_FETCH_PARALLELISM));

        Self {
            api_base: read("API_BASE").unwrap_or(defaults.api_base),
            year: read("PREDICTIONS_YEAR").unwrap_or(defaults.year),
            season,
            jikan_base: read("JIKAN_BASE").unwrap_or(defaults.jikan_base),
            fetch_parallelism,
            export_dir: read("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
        }
    }
}

pub fn http_timeout_secs_from_env() -> u64 {
    http_timeout_secs_from(env::var("HTTP_TIMEOUT_SECS").ok().as_deref())
}

fn http_timeout_secs_from(raw: Option<&str>) -> u64 {
    raw.and_then(non_empty)
        .and_then(|val| val.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = AppConfig::from_lookup(|_| None);
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.api_base, "http://127.0.0.1:8000");
        assert_eq!(cfg.season, Season::Fall);
    }

    #[test]
    fn environment_overrides_and_clamps() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("API_BASE", " http://predict.local:9000 "),
            ("PREDICTIONS_YEAR", "2024"),
            ("PREDICTIONS_SEASON", "Spring"),
            ("FETCH_PARALLELISM", "500"),
            ("EXPORT_DIR", "/tmp/out"),
        ]));
        assert_eq!(cfg.api_base, "http://predict.local:9000");
        assert_eq!(cfg.year, "2024");
        assert_eq!(cfg.season, Season::Spring);
        assert_eq!(cfg.fetch_parallelism, Some(MAX_FETCH_PARALLELISM));
        assert_eq!(cfg.export_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn timeout_ignores_zero_and_garbage() {
        assert_eq!(http_timeout_secs_from(Some("25")), 25);
        assert_eq!(http_timeout_secs_from(Some("0")), DEFAULT_HTTP_TIMEOUT_SECS);
        assert_eq!(http_timeout_secs_from(Some("soon")), DEFAULT_HTTP_TIMEOUT_SECS);
        assert_eq!(http_timeout_secs_from(None), DEFAULT_HTTP_TIMEOUT_SECS);
    }

    #[test]
    fn unknown_season_falls_back() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("PREDICTIONS_SEASON", "monsoon")]));
        assert_eq!(cfg.season, Season::Fall);
    }
}
