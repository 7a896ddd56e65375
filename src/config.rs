//! Configuration loader and validator for jobscribe.
use crate::db::schema::CURRENT_SCHEMA_VERSION;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    #[serde(default)]
    pub store: Store,
    #[serde(default)]
    pub coordinator: Coordinator,
    #[serde(default)]
    pub scraper: Scraper,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub schema_version: u32,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}

/// Coordinator timings and job-posting address patterns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coordinator {
    pub settle_delay_ms: u64,
    pub observation_window_ms: u64,
    pub relay_delay_ms: u64,
    pub job_patterns: Vec<String>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1_000,
            observation_window_ms: 10_000,
            relay_delay_ms: 300,
            job_patterns: crate::coordinator::badge::DEFAULT_JOB_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Ordered CSS selectors tried by the page scraper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scraper {
    pub selectors: Vec<String>,
}

impl Default for Scraper {
    fn default() -> Self {
        Self {
            selectors: crate::scrape::DEFAULT_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl App {
    /// Data directory with a leading `~/` expanded.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(rest) = self.data_dir.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return Path::new(&home).join(rest);
            }
        }
        PathBuf::from(&self.data_dir)
    }
}

impl Coordinator {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn observation_window(&self) -> Duration {
        Duration::from_millis(self.observation_window_ms)
    }

    pub fn relay_delay(&self) -> Duration {
        Duration::from_millis(self.relay_delay_ms)
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}/jobscribe.db",
                self.app.resolved_data_dir().display()
            )
        })
    }

    pub fn session_path(&self) -> PathBuf {
        self.app.resolved_data_dir().join("session.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.app.resolved_data_dir().join("settings.json")
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - A missing file yields the built-in example configuration.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => example().to_string(),
        Err(err) => return Err(err.into()),
    };
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.store.schema_version == 0 {
        return Err(ConfigError::Invalid("store.schema_version must be > 0"));
    }
    if cfg.coordinator.observation_window_ms == 0 {
        return Err(ConfigError::Invalid(
            "coordinator.observation_window_ms must be > 0",
        ));
    }
    if cfg.coordinator.job_patterns.is_empty() {
        return Err(ConfigError::Invalid(
            "coordinator.job_patterns must list at least one pattern",
        ));
    }
    if cfg
        .coordinator
        .job_patterns
        .iter()
        .any(|p| Regex::new(p).is_err())
    {
        return Err(ConfigError::Invalid(
            "coordinator.job_patterns must be valid regular expressions",
        ));
    }
    if cfg.scraper.selectors.is_empty() {
        return Err(ConfigError::Invalid("scraper.selectors must be non-empty"));
    }
    if cfg
        .scraper
        .selectors
        .iter()
        .any(|s| scraper::Selector::parse(s).is_err())
    {
        return Err(ConfigError::Invalid(
            "scraper.selectors must be valid CSS selectors",
        ));
    }
    Ok(())
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r##"app:
  data_dir: "~/.local/share/jobscribe"

store:
  schema_version: 2

coordinator:
  settle_delay_ms: 1000
  observation_window_ms: 10000
  relay_delay_ms: 300
  job_patterns:
    - '^https?://(www\.)?linkedin\.com/jobs/'
    - '^https?://([a-z]+\.)?indeed\.com/(viewjob|jobs|rc/clk)'
    - '^https?://(boards|job-boards)\.greenhouse\.io/'
    - '^https?://jobs\.lever\.co/'
    - '^https?://[^/]+\.myworkdayjobs\.com/'

scraper:
  selectors:
    - ".jobs-description__content"
    - ".jobs-box__html-content"
    - "#job-details"
    - "#jobDescriptionText"
    - "[data-automation-id='jobPostingDescription']"
    - "#content .job__description"
    - ".posting-page .section-wrapper"
    - ".job-description"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.store.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(cfg.scraper.selectors, crate::scrape::DEFAULT_SELECTORS);
    }

    #[test]
    fn sections_default_when_omitted() {
        let cfg: Config = serde_yaml::from_str("app:\n  data_dir: ./data\n").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.coordinator, Coordinator::default());
        assert_eq!(cfg.scraper, Scraper::default());
    }

    #[test]
    fn invalid_data_dir() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("app.data_dir")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_patterns_and_selectors() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.coordinator.job_patterns.push("(unclosed".into());
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("job_patterns")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.scraper.selectors = vec!["div[".into()];
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.store.schema_version = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
        assert_eq!(cfg.session_path(), data_path.join("session.json"));
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.coordinator.relay_delay_ms, 300);
        assert_eq!(cfg.scraper.selectors.len(), 8);
    }

    #[test]
    fn load_missing_file_falls_back_to_example() {
        let td = tempdir().unwrap();
        let cfg = load(Some(&td.path().join("absent.yaml"))).unwrap();
        assert_eq!(cfg.coordinator.settle_delay_ms, 1000);
    }
}
