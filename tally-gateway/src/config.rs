//! Gateway Configuration
//!
//! Loaded from environment variables. Only the backend URL is required.

use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_COOKIE_NAME: &str = "tally_session";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Backend origin, without trailing slash.
    pub backend_url: String,

    /// Address the gateway listens on.
    pub bind_addr: SocketAddr,

    /// Name of the HttpOnly session cookie.
    pub cookie_name: String,

    /// Whether the session cookie carries `Secure`.
    pub cookie_secure: bool,

    /// Timeout for each backend call.
    pub backend_timeout: Duration,
}

impl GatewayConfig {
    /// Config for a given backend with every other setting at its default.
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_secure: false,
            backend_timeout: Duration::from_secs(10),
        }
    }

    /// Create GatewayConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TALLY_BACKEND_URL`: Backend origin (required)
    /// - `TALLY_GATEWAY_BIND`: Listen host (default: 0.0.0.0)
    /// - `PORT` or `TALLY_GATEWAY_PORT`: Listen port (default: 3000)
    /// - `TALLY_COOKIE_NAME`: Session cookie name (default: tally_session)
    /// - `TALLY_COOKIE_SECURE`: "true" to mark the cookie Secure (default: false)
    /// - `TALLY_BACKEND_TIMEOUT_MS`: Backend call timeout (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GatewayConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("TALLY_BACKEND_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("TALLY_BACKEND_URL"))?;
        let mut config = Self::new(backend_url.trim());

        let host = lookup("TALLY_GATEWAY_BIND").unwrap_or_else(|| "0.0.0.0".to_string());
        let port_str = lookup("PORT")
            .or_else(|| lookup("TALLY_GATEWAY_PORT"))
            .unwrap_or_else(|| "3000".to_string());
        let port = port_str
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue {
                field: "TALLY_GATEWAY_PORT",
                reason: format!("invalid port value: {}", port_str),
            })?;
        let addr = format!("{}:{}", host, port);
        config.bind_addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "TALLY_GATEWAY_BIND",
                reason: format!("invalid bind address {}: {}", addr, e),
            })?;

        if let Some(name) = lookup("TALLY_COOKIE_NAME") {
            config.cookie_name = name.trim().to_string();
        }

        config.cookie_secure = lookup("TALLY_COOKIE_SECURE")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(false);

        if let Some(ms) = lookup("TALLY_BACKEND_TIMEOUT_MS") {
            let ms = ms.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                field: "TALLY_BACKEND_TIMEOUT_MS",
                reason: format!("not a number: {}", ms),
            })?;
            config.backend_timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "TALLY_BACKEND_URL",
                reason: "must be an http or https URL".to_string(),
            });
        }
        if self.cookie_name.is_empty()
            || !self
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidValue {
                field: "TALLY_COOKIE_NAME",
                reason: "must be non-empty and contain only [A-Za-z0-9_-]".to_string(),
            });
        }
        if self.backend_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "TALLY_BACKEND_TIMEOUT_MS",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_backend_url_is_required() {
        assert!(matches!(
            GatewayConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("TALLY_BACKEND_URL"))
        ));
    }

    #[test]
    fn test_defaults() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("TALLY_BACKEND_URL", "http://backend:8080/")]))
                .unwrap();
        assert_eq!(config.backend_url, "http://backend:8080");
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.cookie_name, DEFAULT_COOKIE_NAME);
        assert!(!config.cookie_secure);
        assert_eq!(config.backend_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("TALLY_BACKEND_URL", "https://api.tally.test"),
            ("TALLY_GATEWAY_BIND", "127.0.0.1"),
            ("PORT", "8081"),
            ("TALLY_GATEWAY_PORT", "9999"),
            ("TALLY_COOKIE_NAME", "sid"),
            ("TALLY_COOKIE_SECURE", "true"),
            ("TALLY_BACKEND_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8081".parse().unwrap());
        assert_eq!(config.cookie_name, "sid");
        assert!(config.cookie_secure);
        assert_eq!(config.backend_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            GatewayConfig::from_lookup(lookup(&[
                ("TALLY_BACKEND_URL", "http://b"),
                ("PORT", "http")
            ])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            GatewayConfig::from_lookup(lookup(&[("TALLY_BACKEND_URL", "backend:8080")])),
            Err(ConfigError::InvalidValue {
                field: "TALLY_BACKEND_URL",
                ..
            })
        ));
        assert!(matches!(
            GatewayConfig::from_lookup(lookup(&[
                ("TALLY_BACKEND_URL", "http://b"),
                ("TALLY_COOKIE_NAME", "a=b")
            ])),
            Err(ConfigError::InvalidValue {
                field: "TALLY_COOKIE_NAME",
                ..
            })
        ));
    }
}
