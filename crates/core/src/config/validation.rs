//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, WaitStrategy};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `bind_addr` is not a socket address
    /// - `site_origin` is set but is not an http(s) URL
    /// - an `allowed_hosts` entry is not a bare `host` or `host:port`
    /// - `cache_ttl_secs` is 0
    /// - `navigation_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `fixed_delay_ms` exceeds `navigation_timeout_ms` under the fixed-delay strategy
    /// - `browser_ws_url` is set with a scheme other than ws, wss, http or https
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        self.site_origin_url()?;

        for entry in &self.allowed_hosts {
            validate_allowed_host(entry)?;
        }

        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.navigation_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "navigation_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.navigation_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "navigation_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.wait_strategy == WaitStrategy::FixedDelay && self.fixed_delay_ms > self.navigation_timeout_ms {
            return Err(ConfigError::Invalid {
                field: "fixed_delay_ms".into(),
                reason: "must not exceed navigation_timeout_ms".into(),
            });
        }

        if let Some(endpoint) = self.browser_ws_url.as_deref() {
            let parsed = url::Url::parse(endpoint)
                .map_err(|e| ConfigError::Invalid { field: "browser_ws_url".into(), reason: e.to_string() })?;
            if !matches!(parsed.scheme(), "ws" | "wss" | "http" | "https") {
                return Err(ConfigError::Invalid {
                    field: "browser_ws_url".into(),
                    reason: format!("unsupported scheme: {}", parsed.scheme()),
                });
            }

            if self.chrome_executable.is_some() {
                tracing::warn!(
                    browser_ws_url = endpoint,
                    "Both chrome_executable and browser_ws_url are set; \
                     the remote browser takes precedence"
                );
            }
        }

        Ok(())
    }
}

fn validate_allowed_host(entry: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid { field: "allowed_hosts".into(), reason };

    let trimmed = entry.trim();
    if trimmed.is_empty() {
        return Err(invalid("entries must not be empty".into()));
    }
    if trimmed.contains(['/', '?', '#', '@']) || trimmed.contains(char::is_whitespace) {
        return Err(invalid(format!("{entry:?} must be a host or host:port, not a URL")));
    }

    let parsed = url::Url::parse(&format!("http://{trimmed}")).map_err(|e| invalid(format!("{entry:?}: {e}")))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid(format!("{entry:?} has no host")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_bind_addr() {
        let config = AppConfig { bind_addr: "localhost".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "bind_addr"));
    }

    #[test]
    fn test_validate_bad_site_origin() {
        let config = AppConfig { site_origin: Some("not a url".into()), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "site_origin"));
    }

    #[test]
    fn test_validate_allowed_hosts() {
        let config = AppConfig {
            allowed_hosts: vec!["wesbos.test".into(), "localhost:3000".into(), "[::1]:8080".into()],
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        for bad in ["", "https://wesbos.test", "wesbos.test/og", "user@wesbos.test", "wes bos", "host:notaport"] {
            let config = AppConfig { allowed_hosts: vec![bad.into()], ..Default::default() };
            let result = config.validate();
            assert!(
                matches!(result, Err(ConfigError::Invalid { ref field, .. }) if field == "allowed_hosts"),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = AppConfig { cache_ttl_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_ttl_secs"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { navigation_timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "navigation_timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { navigation_timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "navigation_timeout_ms"));
    }

    #[test]
    fn test_validate_fixed_delay_longer_than_timeout() {
        let config = AppConfig {
            wait_strategy: WaitStrategy::FixedDelay,
            fixed_delay_ms: 5_000,
            navigation_timeout_ms: 1_000,
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "fixed_delay_ms"));
    }

    #[test]
    fn test_validate_fixed_delay_ignored_under_network_idle() {
        let config = AppConfig { fixed_delay_ms: 5_000, navigation_timeout_ms: 1_000, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_browser_ws_url_scheme() {
        let config = AppConfig { browser_ws_url: Some("ftp://chrome:9222".into()), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "browser_ws_url"));

        let config = AppConfig {
            browser_ws_url: Some("ws://chrome:9222/devtools/browser/abc".into()),
            chrome_executable: Some(PathBuf::from("/usr/bin/chromium")),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { cache_ttl_secs: 1, navigation_timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());

        let config = AppConfig { navigation_timeout_ms: 300_000, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
