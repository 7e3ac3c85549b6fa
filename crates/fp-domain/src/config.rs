//! Configuration surface. A single [`Config`] assembled from (in ascending
//! precedence) compiled-in defaults, an optional TOML file, and environment
//! variable overrides — see the `fp-gateway` CLI for the loading mechanics.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            scheduler: SchedulerConfig::default(),
            store: StoreConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fetch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "d_fetch_default_interval")]
    pub default_interval_seconds: i64,
    #[serde(default = "d_fetch_concurrency")]
    pub concurrency: usize,
    #[serde(default = "d_per_host_concurrency")]
    pub per_host_concurrency: usize,
    #[serde(default = "d_fetch_timeout_seconds")]
    pub timeout_seconds: u64,
    /// One of "trafilatura", "readability", "none".
    #[serde(default = "d_extraction_engine")]
    pub extraction_engine: String,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_interval_seconds: d_fetch_default_interval(),
            concurrency: d_fetch_concurrency(),
            per_host_concurrency: d_per_host_concurrency(),
            timeout_seconds: d_fetch_timeout_seconds(),
            extraction_engine: d_extraction_engine(),
            user_agent: d_user_agent(),
        }
    }
}

fn d_fetch_default_interval() -> i64 {
    900
}
fn d_fetch_concurrency() -> usize {
    10
}
fn d_per_host_concurrency() -> usize {
    2
}
fn d_fetch_timeout_seconds() -> u64 {
    30
}
fn d_extraction_engine() -> String {
    "trafilatura".into()
}
fn d_user_agent() -> String {
    "feedpipe/0.1 (+self-hosted feed reader)".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "d_scheduler_tick_seconds")]
    pub tick_seconds: u64,
    #[serde(default = "d_scheduler_batch_size")]
    pub batch_size: i64,
    #[serde(default = "d_graceful_shutdown_seconds")]
    pub graceful_shutdown_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: d_scheduler_tick_seconds(),
            batch_size: d_scheduler_batch_size(),
            graceful_shutdown_seconds: d_graceful_shutdown_seconds(),
        }
    }
}

fn d_scheduler_tick_seconds() -> u64 {
    10
}
fn d_scheduler_batch_size() -> i64 {
    25
}
fn d_graceful_shutdown_seconds() -> u64 {
    20
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "d_database_path")]
    pub database_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: d_database_path(),
        }
    }
}

fn d_database_path() -> String {
    "./feedpipe.db".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_bind_addr")]
    pub bind_addr: String,
    /// Env var holding the bearer token required on the control surface.
    /// If unset at startup, the control surface runs unauthenticated
    /// (dev mode) — mirrors the teacher's admin-token convention.
    #[serde(default = "d_api_token_env")]
    pub api_token_env: String,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: d_bind_addr(),
            api_token_env: d_api_token_env(),
            cors: CorsConfig::default(),
            rate_limit: None,
        }
    }
}

fn d_bind_addr() -> String {
    "127.0.0.1:8787".into()
}
fn d_api_token_env() -> String {
    "FEEDPIPE_API_TOKEN".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u64,
    pub burst_size: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "d_log_level")]
    pub level: String,
    /// "json" or "pretty".
    #[serde(default = "d_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: d_log_level(),
            format: d_log_format(),
        }
    }
}

fn d_log_level() -> String {
    "info".into()
}
fn d_log_format() -> String {
    "json".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. Empty
    /// means everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.fetch.default_interval_seconds < 60 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "fetch.default_interval_seconds".into(),
                message: "must be at least 60".into(),
            });
        }
        if self.fetch.concurrency == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "fetch.concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.fetch.per_host_concurrency == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "fetch.per_host_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.fetch.timeout_seconds == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "fetch.timeout_seconds".into(),
                message: "must be greater than 0".into(),
            });
        }
        if !matches!(
            self.fetch.extraction_engine.as_str(),
            "trafilatura" | "readability" | "none"
        ) {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "fetch.extraction_engine".into(),
                message: format!(
                    "must be one of \"trafilatura\", \"readability\", \"none\" (got \"{}\")",
                    self.fetch.extraction_engine
                ),
            });
        }

        if self.scheduler.tick_seconds == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "scheduler.tick_seconds".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.scheduler.batch_size <= 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "scheduler.batch_size".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.store.database_path.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "store.database_path".into(),
                message: "must not be empty".into(),
            });
        }

        if self.server.bind_addr.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.bind_addr".into(),
                message: "must not be empty".into(),
            });
        }

        if std::env::var(&self.server.api_token_env).is_err() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.api_token_env".into(),
                message: format!(
                    "{} is not set — control surface will run unauthenticated",
                    self.server.api_token_env
                ),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "must be greater than 0".into(),
                });
            }
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "logging.format".into(),
                message: format!(
                    "must be \"json\" or \"pretty\" (got \"{}\")",
                    self.logging.format
                ),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_issue<'a>(issues: &'a [ConfigIssue], field: &str) -> Option<&'a ConfigIssue> {
        issues.iter().find(|i| i.field == field)
    }

    #[test]
    fn default_config_has_no_errors() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn zero_per_host_concurrency_is_error() {
        let mut cfg = Config::default();
        cfg.fetch.per_host_concurrency = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "fetch.per_host_concurrency").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn short_default_interval_is_error() {
        let mut cfg = Config::default();
        cfg.fetch.default_interval_seconds = 30;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "fetch.default_interval_seconds").is_some());
    }

    #[test]
    fn zero_batch_size_is_error() {
        let mut cfg = Config::default();
        cfg.scheduler.batch_size = 0;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "scheduler.batch_size").is_some());
    }

    #[test]
    fn unknown_extraction_engine_is_error() {
        let mut cfg = Config::default();
        cfg.fetch.extraction_engine = "bespoke".into();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "fetch.extraction_engine").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn none_extraction_engine_is_valid() {
        let mut cfg = Config::default();
        cfg.fetch.extraction_engine = "none".into();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "fetch.extraction_engine").is_none());
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = Config::default();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.cors.allowed_origins").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn rate_limit_zero_rps_is_error() {
        let mut cfg = Config::default();
        cfg.server.rate_limit = Some(RateLimitConfig {
            requests_per_second: 0,
            burst_size: 10,
        });
        let issues = cfg.validate();
        assert!(find_issue(&issues, "server.rate_limit.requests_per_second").is_some());
    }

    #[test]
    fn invalid_log_format_is_error() {
        let mut cfg = Config::default();
        cfg.logging.format = "xml".into();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "logging.format").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn issue_display_format() {
        let issue = ConfigIssue {
            severity: ConfigSeverity::Error,
            field: "fetch.concurrency".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(
            format!("{issue}"),
            "[ERROR] fetch.concurrency: must be greater than 0"
        );
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = Config::default();
        let serialized = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&serialized).expect("parse");
        assert_eq!(parsed.fetch.concurrency, cfg.fetch.concurrency);
        assert_eq!(parsed.scheduler.batch_size, cfg.scheduler.batch_size);
    }
}
