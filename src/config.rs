//! Runtime settings.
//!
//! Resolution order: built-in defaults, then `<config_dir>/bls-explorer/config.json`
//! if present, then the `BLS_API_KEY` / `BLS_API_URL` environment variables.
//! Binaries apply their own flags on top.

use crate::query::{DEFAULT_SERIES_PATTERN, ValidationRules};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://api.bls.gov/publicAPI/v2";
pub const ENV_API_KEY: &str = "BLS_API_KEY";
pub const ENV_API_URL: &str = "BLS_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    /// Registration key; unregistered access has lower limits and no catalog data.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Upper bound on search hits.
    pub search_limit: usize,
    pub min_year: i32,
    /// Latest accepted year, relative to the current year.
    pub max_year_ahead: i32,
    pub max_series: usize,
    pub series_pattern: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            timeout_secs: 30,
            search_limit: 25,
            min_year: 1900,
            max_year_ahead: 1,
            max_series: 50,
            series_pattern: DEFAULT_SERIES_PATTERN.into(),
        }
    }
}

impl Settings {
    /// Default location of the optional config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bls-explorer").join("config.json"))
    }

    /// Defaults + config file (if any) + environment.
    pub fn load() -> Result<Self> {
        let mut settings = match Self::default_path() {
            Some(p) if p.exists() => Self::from_file(&p)?,
            _ => Self::default(),
        };
        settings.apply_env(|k| std::env::var(k).ok());
        Ok(settings)
    }

    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("loading settings from {}", path.display());
        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&txt).with_context(|| format!("parse config {}", path.display()))
    }

    /// Override from environment variables; `lookup` is injectable for tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key.trim().to_string());
        }
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().trim_end_matches('/').to_string();
        }
    }

    /// Validation rules derived from these settings.
    pub fn validation_rules(&self) -> Result<ValidationRules> {
        ValidationRules::new(
            self.min_year,
            self.max_year_ahead,
            self.max_series,
            &self.series_pattern,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_defaults() {
        let mut s = Settings::default();
        s.apply_env(|k| match k {
            ENV_API_KEY => Some(" abc123 ".into()),
            ENV_API_URL => Some("http://localhost:9000/v2/".into()),
            _ => None,
        });
        assert_eq!(s.api_key.as_deref(), Some("abc123"));
        assert_eq!(s.base_url, "http://localhost:9000/v2");
    }

    #[test]
    fn blank_env_is_ignored() {
        let mut s = Settings::default();
        s.apply_env(|_| Some("   ".into()));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.json");
        std::fs::write(&p, r#"{"min_year": 1950, "search_limit": 10}"#).unwrap();
        let s = Settings::from_file(&p).unwrap();
        assert_eq!(s.min_year, 1950);
        assert_eq!(s.search_limit, 10);
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert!(s.validation_rules().is_ok());
    }
}
