//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OGSHOT_*)
//! 2. TOML config file (if OGSHOT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Thirty days, the lifetime of a cached image.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60 * 24 * 30;

/// How the renderer decides a navigated page is ready to screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Wait until the page reports network idle.
    #[default]
    NetworkIdle,
    /// Sleep a fixed time after the load event.
    FixedDelay,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OGSHOT_*)
/// 2. TOML config file (if OGSHOT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server listens on.
    ///
    /// Set via OGSHOT_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Origin of the site that serves the `/og` template page.
    ///
    /// Set via OGSHOT_SITE_ORIGIN. When unset, each request's own origin is
    /// used, provided its `Host` is listed in `allowed_hosts`.
    #[serde(default)]
    pub site_origin: Option<String>,

    /// `host` or `host:port` values a request may name as its own origin.
    ///
    /// Only consulted when `site_origin` is unset; empty rejects every
    /// request-derived origin. Set via OGSHOT_ALLOWED_HOSTS (e.g.
    /// `[wesbos.com,localhost:3000]`).
    #[serde(default)]
    pub allowed_hosts: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via OGSHOT_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Whether cached images are served. Writes happen regardless.
    ///
    /// Set via OGSHOT_CACHE_READS_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub cache_reads_enabled: bool,

    /// Lifetime of a cached image in seconds.
    ///
    /// Set via OGSHOT_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Upper bound on navigation plus the ready wait, in milliseconds.
    ///
    /// Set via OGSHOT_NAVIGATION_TIMEOUT_MS environment variable.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Set via OGSHOT_WAIT_STRATEGY (`network_idle` or `fixed_delay`).
    #[serde(default)]
    pub wait_strategy: WaitStrategy,

    /// Delay after load when `wait_strategy` is `fixed_delay`.
    ///
    /// Set via OGSHOT_FIXED_DELAY_MS environment variable.
    #[serde(default = "default_fixed_delay_ms")]
    pub fixed_delay_ms: u64,

    /// Chrome/Chromium binary to launch. Autodetected when unset.
    ///
    /// Set via OGSHOT_CHROME_EXECUTABLE environment variable.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// Remote DevTools endpoint to connect to instead of launching a browser.
    ///
    /// Accepts `ws(s)://` debugger URLs or an `http(s)://host:port` base.
    /// Set via OGSHOT_BROWSER_WS_URL environment variable.
    #[serde(default)]
    pub browser_ws_url: Option<String>,

    /// Pass `--no-sandbox` to a locally launched browser.
    ///
    /// Set via OGSHOT_NO_SANDBOX environment variable.
    #[serde(default)]
    pub no_sandbox: bool,

    /// Share one capture between concurrent misses on the same key.
    ///
    /// Set via OGSHOT_DEDUPE_IN_FLIGHT environment variable.
    #[serde(default = "default_true")]
    pub dedupe_in_flight: bool,

    /// Seconds between expired-entry sweeps; 0 disables the sweeper.
    ///
    /// Set via OGSHOT_PURGE_INTERVAL_SECS environment variable.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./ogshot-cache.sqlite")
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_navigation_timeout_ms() -> u64 {
    20_000
}

fn default_fixed_delay_ms() -> u64 {
    1_000
}

fn default_purge_interval_secs() -> u64 {
    3_600
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            site_origin: None,
            allowed_hosts: Vec::new(),
            db_path: default_db_path(),
            cache_reads_enabled: true,
            cache_ttl_secs: default_cache_ttl_secs(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            wait_strategy: WaitStrategy::default(),
            fixed_delay_ms: default_fixed_delay_ms(),
            chrome_executable: None,
            browser_ws_url: None,
            no_sandbox: false,
            dedupe_in_flight: true,
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl AppConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn fixed_delay(&self) -> Duration {
        Duration::from_millis(self.fixed_delay_ms)
    }

    /// Sweep interval, or None when the sweeper is disabled.
    pub fn purge_interval(&self) -> Option<Duration> {
        (self.purge_interval_secs > 0).then(|| Duration::from_secs(self.purge_interval_secs))
    }

    /// Parsed listen address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `bind_addr` is not `host:port`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            field: "bind_addr".into(),
            reason: e.to_string(),
        })
    }

    /// Parsed site origin, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the value is not an http(s) URL.
    pub fn site_origin_url(&self) -> Result<Option<url::Url>, ConfigError> {
        let Some(raw) = self.site_origin.as_deref() else {
            return Ok(None);
        };
        let parsed = url::Url::parse(raw.trim())
            .map_err(|e| ConfigError::Invalid { field: "site_origin".into(), reason: e.to_string() })?;
        match parsed.scheme() {
            "http" | "https" => Ok(Some(parsed)),
            scheme => Err(ConfigError::Invalid {
                field: "site_origin".into(),
                reason: format!("unsupported scheme: {scheme}"),
            }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OGSHOT_`
    /// 2. TOML file from `OGSHOT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OGSHOT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OGSHOT_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
