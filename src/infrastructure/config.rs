//! Configuration infrastructure
//!
//! Configuration is layered, lowest precedence first:
//! 1. Built-in defaults (see [`defaults`])
//! 2. Optional config file (TOML, JSON or YAML, chosen by extension)
//! 3. `EVENTS_CRAWLER_*` environment variables, `__` between nested keys
//!    (e.g. `EVENTS_CRAWLER_CRAWLER__LOOKAHEAD_DAYS=7`)
//! 4. The storage variables `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    pub fetcher: FetcherConfig,
    pub database: DatabaseConfig,
    pub checkpoint: CheckpointConfig,
    pub logging: LoggingConfig,
    pub export: ExportConfig,
}

/// Calendar site location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Scheme and host of the calendar, without trailing slash
    pub base_url: String,
}

/// What happens to a link whose record was rejected for lacking a start time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectedLinkPolicy {
    /// Never look at the link again
    #[default]
    MarkSeen,
    /// Leave the link unseen so the next run extracts it again
    Retry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of consecutive days, starting today, to crawl
    pub lookahead_days: u32,

    /// Upper bound for waiting on a page's ready element
    pub render_timeout_ms: u64,

    /// Delay between readiness checks when a page is re-rendered
    pub render_poll_interval_ms: u64,

    /// Detail pages extracted at the same time, each with its own session
    pub max_concurrent_extractions: usize,

    /// Save the seen-link checkpoint every N completed links; 0 saves once per date
    pub checkpoint_interval: usize,

    pub rejected_link_policy: RejectedLinkPolicy,

    /// Only process the first N links of each day's listing
    pub max_links_per_day: Option<usize>,
}

/// How pages are turned into HTML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderModeKind {
    /// Plain GET; the server response is the page
    #[default]
    Direct,
    /// Rendered by a Browserless `/content` endpoint
    Browserless,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub render_mode: RenderModeKind,
    /// Base URL of the Browserless service, e.g. `http://localhost:3000`
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// SQLite connection URL
    pub url: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// JSON file holding the seen-link set
    pub path: PathBuf,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs in the log file
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    pub log_dir: PathBuf,

    pub file_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// JSON array file that persisted records are appended to
    pub path: Option<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            lookahead_days: defaults::LOOKAHEAD_DAYS,
            render_timeout_ms: defaults::RENDER_TIMEOUT_MS,
            render_poll_interval_ms: defaults::RENDER_POLL_INTERVAL_MS,
            max_concurrent_extractions: defaults::MAX_CONCURRENT_EXTRACTIONS,
            checkpoint_interval: defaults::CHECKPOINT_INTERVAL,
            rejected_link_policy: RejectedLinkPolicy::default(),
            max_links_per_day: None,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            max_retries: defaults::MAX_RETRIES,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            render_mode: RenderModeKind::default(),
            browserless_url: None,
            browserless_token: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            url: defaults::SQLITE_URL.to_string(),
            host: None,
            port: None,
            user: None,
            password: None,
            name: None,
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::CHECKPOINT_PATH),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: PathBuf::from(defaults::LOG_DIR),
            file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Build the layered configuration and validate it
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        for (variable, key) in [
            ("DB_HOST", "database.host"),
            ("DB_USER", "database.user"),
            ("DB_PASSWORD", "database.password"),
            ("DB_NAME", "database.name"),
        ] {
            builder = builder.set_override_option(key, std::env::var(variable).ok())?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("site.base_url must not be empty"));
        }
        if self.crawler.lookahead_days == 0 {
            return Err(ConfigError::invalid("crawler.lookahead_days must be greater than 0"));
        }
        if self.crawler.max_concurrent_extractions == 0 {
            return Err(ConfigError::invalid(
                "crawler.max_concurrent_extractions must be greater than 0",
            ));
        }
        if self.fetcher.max_requests_per_second == 0 {
            return Err(ConfigError::invalid(
                "fetcher.max_requests_per_second must be greater than 0",
            ));
        }
        if self.fetcher.max_retries > defaults::MAX_RETRIES_LIMIT {
            return Err(ConfigError::invalid(format!(
                "fetcher.max_retries must be at most {}",
                defaults::MAX_RETRIES_LIMIT
            )));
        }
        if self.fetcher.render_mode == RenderModeKind::Browserless && self.fetcher.browserless_url.is_none() {
            return Err(ConfigError::invalid(
                "fetcher.browserless_url is required for the browserless render mode",
            ));
        }
        if self.database.backend == DatabaseBackend::Postgres {
            if self.database.host.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::invalid("database.host is required for postgres"));
            }
            if self.database.name.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::invalid("database.name is required for postgres"));
            }
        }
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    use crate::domain::constants::{crawling, site};

    pub const ENV_PREFIX: &str = "EVENTS_CRAWLER";

    pub const BASE_URL: &str = site::BASE_URL;

    pub const LOOKAHEAD_DAYS: u32 = crawling::DEFAULT_LOOKAHEAD_DAYS;
    pub const RENDER_TIMEOUT_MS: u64 = crawling::DEFAULT_RENDER_TIMEOUT_MS;
    pub const RENDER_POLL_INTERVAL_MS: u64 = crawling::DEFAULT_RENDER_POLL_INTERVAL_MS;
    pub const MAX_CONCURRENT_EXTRACTIONS: usize = 1;
    pub const CHECKPOINT_INTERVAL: usize = 0;

    pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; events-crawler/0.1)";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;
    pub const MAX_RETRIES: u32 = 3;
    pub const MAX_RETRIES_LIMIT: u32 = 10;
    pub const RETRY_BASE_DELAY_MS: u64 = 500;

    pub const SQLITE_URL: &str = "sqlite:data/events.db";
    pub const DB_MAX_CONNECTIONS: u32 = 5;

    pub const CHECKPOINT_PATH: &str = "seen_links.json";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_DIR: &str = "logs";
    pub const LOG_FILE_NAME: &str = "crawler.log";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.crawler.lookahead_days, 50);
        assert_eq!(config.crawler.max_concurrent_extractions, 1);
        assert_eq!(config.crawler.rejected_link_policy, RejectedLinkPolicy::MarkSeen);
        assert_eq!(config.logging.file_name, "crawler.log");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[crawler]
lookahead_days = 7
rejected_link_policy = "retry"

[checkpoint]
path = "state/seen.json"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.crawler.lookahead_days, 7);
        assert_eq!(config.crawler.rejected_link_policy, RejectedLinkPolicy::Retry);
        assert_eq!(config.checkpoint.path, PathBuf::from("state/seen.json"));
        // untouched sections keep their defaults
        assert_eq!(config.site.base_url, defaults::BASE_URL);
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let mut config = AppConfig::default();
        config.crawler.lookahead_days = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));

        let mut config = AppConfig::default();
        config.crawler.max_concurrent_extractions = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.fetcher.max_retries = 32;
        assert!(config.validate().is_err());
        config.fetcher.max_retries = defaults::MAX_RETRIES_LIMIT;
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.database.backend = DatabaseBackend::Postgres;
        assert!(config.validate().is_err());
        config.database.host = Some("localhost".into());
        config.database.name = Some("events".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn browserless_mode_needs_an_endpoint() {
        let mut config = AppConfig::default();
        config.fetcher.render_mode = RenderModeKind::Browserless;
        assert!(config.validate().is_err());
        config.fetcher.browserless_url = Some("http://localhost:3000".into());
        assert!(config.validate().is_ok());
    }
}
