//! Configuration file support for repocache.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Plain environment variables kept for existing deployments
//!    (`GITHUB_USERNAME`, `GITHUB_TOKEN`, `UPDATE_INTERVAL_MS`,
//!    `RATE_LIMIT_BUFFER`, `PORT`)
//! 3. Environment variables prefixed with `REPOCACHE__`, using `__` between
//!    sections (e.g., `REPOCACHE__SYNC__PAGE_SIZE`)
//! 4. Local config file (./repocache.toml)
//! 5. XDG config file (~/.config/repocache/config.toml)
//! 6. Built-in defaults
//!
//! A `.env` file in the current directory is loaded into the process
//! environment at startup without overriding variables already set, so its
//! entries take part in layers 2 and 3.
//!
//! The snapshot path defaults to `~/.local/state/repocache/repos.json` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [github]
//! username = "octocat"
//! token = "ghp_..."  # or use GITHUB_TOKEN
//!
//! [storage]
//! path = "/var/lib/repocache/repos.json"  # optional, defaults to the state dir
//!
//! [sync]
//! interval_secs = 7200
//! rate_limit_buffer = 0.2
//! page_size = 100
//! requests_per_second = 10
//! timeout_secs = 30
//! allow_shrink = false
//!
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//! public_dir = "public"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use repocache::platform::{ApiRateLimiter, rate_limits};
use repocache::sync::{DEFAULT_PAGE_SIZE, SyncOptions};

const APP_NAME: &str = "repocache";
const SNAPSHOT_FILE: &str = "repos.json";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub configuration.
    pub github: GitHubConfig,
    /// Snapshot storage configuration.
    pub storage: StorageConfig,
    /// Sync cycle options.
    pub sync: SyncConfig,
    /// HTTP server options.
    pub server: ServerConfig,
}

/// GitHub configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// User whose repositories are synced.
    pub username: Option<String>,
    /// GitHub API token. Anonymous requests get a much smaller quota.
    pub token: Option<String>,
    /// API root, for GitHub Enterprise.
    pub api_url: Option<String>,
}

/// Snapshot storage configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file path.
    pub path: Option<PathBuf>,
}

/// Sync cycle options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between scheduled cycles.
    pub interval_secs: u64,
    /// Minimum fraction of the API quota that must remain for a cycle to run.
    pub rate_limit_buffer: f64,
    /// Records requested per page.
    pub page_size: u32,
    /// Request pacing; 0 disables it.
    pub requests_per_second: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Allow a full listing to shrink the snapshot.
    pub allow_shrink: bool,
    /// Upper bound on pages per cycle.
    pub max_pages: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2 * 60 * 60,
            rate_limit_buffer: rate_limits::DEFAULT_RATE_LIMIT_BUFFER,
            page_size: DEFAULT_PAGE_SIZE,
            requests_per_second: rate_limits::GITHUB_DEFAULT_RPS,
            timeout_secs: 30,
            allow_shrink: false,
            max_pages: None,
        }
    }
}

/// HTTP server options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served at `/`.
    pub public_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_dir: PathBuf::from("public"),
        }
    }
}

/// Plain environment variables mapped onto config keys.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("GITHUB_USERNAME", "github.username"),
    ("GITHUB_TOKEN", "github.token"),
    ("RATE_LIMIT_BUFFER", "sync.rate_limit_buffer"),
    ("PORT", "server.port"),
];

type Builder = config::builder::ConfigBuilder<config::builder::DefaultState>;

/// Layer the plain environment variables on top of `builder`.
///
/// `UPDATE_INTERVAL_MS` is converted to whole seconds (at least one).
fn apply_legacy_env(
    mut builder: Builder,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Builder, ConfigError> {
    for (var, key) in LEGACY_ENV {
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            builder = builder.set_override(*key, value.trim().to_string())?;
        }
    }

    if let Some(raw) = lookup("UPDATE_INTERVAL_MS") {
        match raw.trim().parse::<u64>() {
            Ok(ms) => {
                let secs = (ms / 1000).max(1);
                builder = builder.set_override("sync.interval_secs", secs)?;
            }
            Err(e) => tracing::warn!(value = %raw, error = %e, "Ignoring invalid UPDATE_INTERVAL_MS"),
        }
    }

    Ok(builder)
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/repocache/config.toml)
    /// 3. Local config file (./repocache.toml)
    /// 4. Environment variables with the REPOCACHE__ prefix
    /// 5. Legacy environment variables (for backwards compatibility)
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("repocache.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./repocache.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., REPOCACHE__SYNC__PAGE_SIZE -> sync.page_size
        builder = builder.add_source(
            Environment::with_prefix("REPOCACHE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let built = apply_legacy_env(builder, |var| std::env::var(var).ok())
            .and_then(|builder| builder.build())
            .and_then(|settings| settings.try_deserialize::<Config>());

        match built {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}", e);
                Config::default()
            }
        }
    }

    /// The configured GitHub user, if any.
    pub fn github_username(&self) -> Option<&str> {
        self.github
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Get the GitHub token.
    pub fn github_token(&self) -> Option<&str> {
        self.github.token.as_deref()
    }

    /// Snapshot file path, falling back to the default state directory.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.storage
            .path
            .clone()
            .or_else(|| Self::default_state_dir().map(|dir| dir.join(SNAPSHOT_FILE)))
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            page_size: self.sync.page_size,
            rate_limit_buffer: self.sync.rate_limit_buffer.clamp(0.0, 1.0),
            allow_shrink: self.sync.allow_shrink,
            max_pages: self.sync.max_pages.filter(|&pages| pages > 0),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.timeout_secs.max(1))
    }

    /// Request pacer, or `None` when pacing is disabled.
    pub fn rate_limiter(&self) -> Option<ApiRateLimiter> {
        (self.sync.requests_per_second > 0)
            .then(|| ApiRateLimiter::new(self.sync.requests_per_second))
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/repocache` or `~/.local/state/repocache`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            // state_dir() returns None on macOS/Windows, fall back to data_dir
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_toml(toml_content: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(toml_content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    fn with_env(toml_content: &str, env: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let builder = ConfigBuilder::builder()
            .add_source(config::File::from_str(toml_content, FileFormat::Toml));
        apply_legacy_env(builder, |var| env.get(var).cloned())
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.username.is_none());
        assert!(config.github.token.is_none());
        assert!(config.storage.path.is_none());
        assert_eq!(config.sync.interval_secs, 7200);
        assert_eq!(config.sync.rate_limit_buffer, 0.2);
        assert_eq!(config.sync.page_size, 100);
        assert_eq!(config.sync.requests_per_second, 10);
        assert!(!config.sync.allow_shrink);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.public_dir, PathBuf::from("public"));
    }

    #[test]
    fn test_config_builder_with_defaults() {
        let settings = ConfigBuilder::builder().build().unwrap();
        let config: Config = settings.try_deserialize().unwrap_or_default();
        assert_eq!(config.sync.timeout_secs, 30);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_full_config_parsing() {
        let config = from_toml(
            r#"
            [github]
            username = "octocat"
            token = "ghp_test123"
            api_url = "https://ghe.example.com/api/v3"

            [storage]
            path = "/tmp/repocache/repos.json"

            [sync]
            interval_secs = 600
            rate_limit_buffer = 0.5
            page_size = 50
            requests_per_second = 0
            allow_shrink = true
            max_pages = 20

            [server]
            port = 8080
            public_dir = "/srv/www"
        "#,
        );

        assert_eq!(config.github_username(), Some("octocat"));
        assert_eq!(config.github_token(), Some("ghp_test123"));
        assert_eq!(
            config.github.api_url.as_deref(),
            Some("https://ghe.example.com/api/v3")
        );
        assert_eq!(
            config.snapshot_path(),
            Some(PathBuf::from("/tmp/repocache/repos.json"))
        );
        assert_eq!(config.sync_interval(), Duration::from_secs(600));
        assert!(config.rate_limiter().is_none());
        assert_eq!(config.server.port, 8080);

        let options = config.sync_options();
        assert_eq!(options.page_size, 50);
        assert_eq!(options.rate_limit_buffer, 0.5);
        assert!(options.allow_shrink);
        assert_eq!(options.max_pages, Some(20));
    }

    #[test]
    fn test_config_partial_override() {
        let config = from_toml(
            r#"
            [sync]
            page_size = 30
        "#,
        );
        assert_eq!(config.sync.page_size, 30);
        // Other values should be defaults
        assert_eq!(config.sync.interval_secs, 7200);
        assert!(config.rate_limiter().is_some());
    }

    #[test]
    fn test_legacy_env_overrides_file() {
        let config = with_env(
            r#"
            [github]
            username = "from-file"

            [server]
            port = 8080
        "#,
            &[
                ("GITHUB_USERNAME", "from-env"),
                ("GITHUB_TOKEN", "ghp_env"),
                ("UPDATE_INTERVAL_MS", "900000"),
                ("RATE_LIMIT_BUFFER", "0.35"),
                ("PORT", "4000"),
            ],
        );

        assert_eq!(config.github_username(), Some("from-env"));
        assert_eq!(config.github_token(), Some("ghp_env"));
        assert_eq!(config.sync.interval_secs, 900);
        assert_eq!(config.sync.rate_limit_buffer, 0.35);
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_legacy_env_ignores_blank_and_invalid_values() {
        let config = with_env(
            "",
            &[("GITHUB_USERNAME", "  "), ("UPDATE_INTERVAL_MS", "soon")],
        );
        assert!(config.github_username().is_none());
        assert_eq!(config.sync.interval_secs, 7200);
    }

    #[test]
    fn test_sub_second_interval_rounds_up() {
        let config = with_env("", &[("UPDATE_INTERVAL_MS", "250")]);
        assert_eq!(config.sync_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_rate_limit_buffer_is_clamped() {
        let config = from_toml(
            r#"
            [sync]
            rate_limit_buffer = 3.0
        "#,
        );
        assert_eq!(config.sync_options().rate_limit_buffer, 1.0);
    }

    #[test]
    fn test_zero_max_pages_is_unbounded() {
        let config = from_toml(
            r#"
            [sync]
            max_pages = 0
        "#,
        );
        assert_eq!(config.sync_options().max_pages, None);
    }

    #[test]
    fn test_snapshot_path_defaults_to_state_dir() {
        let path = Config::default().snapshot_path().unwrap();
        assert!(path.ends_with("repos.json"));
        assert!(path.to_string_lossy().contains("repocache"));
    }

    #[test]
    fn test_config_invalid_toml() {
        let result = ConfigBuilder::builder()
            .add_source(config::File::from_str("[sync", FileFormat::Toml))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_unknown_fields_ignored() {
        let config = from_toml(
            r#"
            [sync]
            page_size = 100
            unknown_field = "should be ignored"
        "#,
        );
        assert_eq!(config.sync.page_size, 100);
    }
}
