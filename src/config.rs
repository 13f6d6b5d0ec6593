//! Application configuration loaded from a TOML file

use crate::proxy::classifier::ProbeStrategy;
use crate::proxy::checker::CheckerConfig;
use crate::proxy::crawler::CrawlerConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub checker: CheckerSettings,
    #[serde(default)]
    pub files: FileSettings,
    #[serde(default)]
    pub scraper: ScraperSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerSettings {
    /// Maximum number of classifications in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Deadline for a single protocol attempt (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Progress redraw interval (milliseconds), 0 disables rendering
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    #[serde(default)]
    pub strategy: ProbeStrategy,
    /// URL fetched through SOCKS candidates
    #[serde(default = "default_socks_target")]
    pub socks_target: String,
    /// Accept self-signed certificates on TLS probes
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

fn default_concurrency() -> usize {
    5000
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_progress_interval_ms() -> u64 {
    500
}
fn default_socks_target() -> String {
    "http://example.com/".to_string()
}
fn default_accept_invalid_certs() -> bool {
    true
}

/// Locations of the lists the engine reads and writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSettings {
    /// Candidate list consumed by `check` and produced by `scrape`
    #[serde(default = "default_input")]
    pub input: PathBuf,
    /// Working proxies, truncated on every run
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Newline-separated list of source URLs
    #[serde(default = "default_sources")]
    pub sources: PathBuf,
}

fn default_input() -> PathBuf {
    PathBuf::from("proxies.txt")
}
fn default_output() -> PathBuf {
    PathBuf::from("working.txt")
}
fn default_sources() -> PathBuf {
    PathBuf::from("sources.txt")
}

/// Source list loader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperSettings {
    #[serde(default = "default_scraper_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_scraper_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    crate::proxy::crawler::DEFAULT_USER_AGENT.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            checker: CheckerSettings::default(),
            files: FileSettings::default(),
            scraper: ScraperSettings::default(),
        }
    }
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            strategy: ProbeStrategy::default(),
            socks_target: default_socks_target(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            sources: default_sources(),
        }
    }
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_scraper_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            info!(
                "No configuration at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// Write the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Engine configuration derived from the `[checker]` section
    pub fn checker_config(&self) -> CheckerConfig {
        let settings = &self.checker;
        let progress = (settings.progress_interval_ms > 0)
            .then(|| Duration::from_millis(settings.progress_interval_ms));

        CheckerConfig::new()
            .with_concurrency(settings.concurrency)
            .with_timeout(Duration::from_millis(settings.timeout_ms))
            .with_strategy(settings.strategy)
            .with_socks_target(settings.socks_target.clone())
            .with_accept_invalid_certs(settings.accept_invalid_certs)
            .with_progress_interval(progress)
    }

    /// Crawler configuration derived from the `[scraper]` section
    pub fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig::new()
            .with_timeout(Duration::from_secs(self.scraper.timeout_secs))
            .with_user_agent(self.scraper.user_agent.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.checker.concurrency, 5000);
        assert_eq!(config.checker.timeout_ms, 5000);
        assert_eq!(config.checker.progress_interval_ms, 500);
        assert_eq!(config.checker.strategy, ProbeStrategy::Sequential);
        assert_eq!(config.files.output, PathBuf::from("working.txt"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
[checker]
concurrency = 50
strategy = "race"
"#,
        )
        .unwrap();
        assert_eq!(config.checker.concurrency, 50);
        assert_eq!(config.checker.strategy, ProbeStrategy::Race);
        assert_eq!(config.checker.timeout_ms, 5000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.files.input, PathBuf::from("proxies.txt"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(AppConfig::from_toml("checker = [").is_err());
    }

    #[test]
    fn test_checker_config_conversion() {
        let mut config = AppConfig::default();
        config.checker.concurrency = 12;
        config.checker.timeout_ms = 250;
        config.checker.progress_interval_ms = 0;

        let checker = config.checker_config();
        assert_eq!(checker.concurrency, 12);
        assert_eq!(checker.timeout, Duration::from_millis(250));
        assert!(checker.progress_interval.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.checker.socks_target = "http://1.1.1.1/".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
