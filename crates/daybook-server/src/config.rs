// ABOUTME: Configuration loading and validation for the daybook server.
// ABOUTME: Reads environment variables for bind address, backend, TTL, backoff, and logging.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use daybook_store::{
    BackendError, BackoffPolicy, Connector, LinkConfig, MemoryBackend, RedisConnector,
    RedisSettings,
};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("REDIS_TLS is true but this build has no TLS support; use a TLS sidecar or set REDIS_TLS=false")]
    TlsUnsupported,

    #[error("DAYBOOK_RECONNECT_BASE_MS must not exceed DAYBOOK_RECONNECT_CAP_MS")]
    BackoffOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    /// Process-local store; data is lost on restart.
    Memory,
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(BackendKind::Redis),
            "memory" => Ok(BackendKind::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DaybookConfig {
    pub bind: SocketAddr,
    pub backend: BackendKind,
    pub redis: RedisSettings,
    pub link: LinkConfig,
    pub reconcile_interval: Option<Duration>,
    pub environment: String,
    pub log_format: LogFormat,
}

impl DaybookConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - DAYBOOK_BIND: socket address to bind (default: 0.0.0.0:3000)
    /// - DAYBOOK_BACKEND: `redis` or `memory` (default: redis)
    /// - REDIS_HOST / REDIS_PORT / REDIS_PASSWORD: backend address (default: localhost:6379, no password)
    /// - REDIS_TLS: must be false; TLS is not compiled in
    /// - DAYBOOK_RECORD_TTL_SECS: TTL of every write (default: 3600)
    /// - DAYBOOK_RECONNECT_BASE_MS / DAYBOOK_RECONNECT_CAP_MS: backoff step and cap (default: 100 / 3000)
    /// - DAYBOOK_RECONNECT_MAX_RETRIES: retries before the link closes (default: 10)
    /// - DAYBOOK_CONNECT_TIMEOUT_MS: per-attempt connect timeout (default: 5000)
    /// - DAYBOOK_RESPONSE_TIMEOUT_MS: wait for one command reply before the link counts as lost (default: 5000)
    /// - DAYBOOK_RECONCILE_INTERVAL_SECS: scheduled index rebuild (default: off)
    /// - DAYBOOK_ENV: `development` exposes internal error detail (default: production)
    /// - DAYBOOK_LOG_FORMAT: `pretty` or `json` (default: pretty)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let bind: SocketAddr = parse(&var, "DAYBOOK_BIND", "0.0.0.0:3000".parse().ok())?;
        let backend = parse(&var, "DAYBOOK_BACKEND", Some(BackendKind::Redis))?;

        let tls = var("REDIS_TLS")
            .map(|v| v == "true" || v == "1" || v == "yes")
            .unwrap_or(false);
        if tls {
            return Err(ConfigError::TlsUnsupported);
        }

        let redis = RedisSettings {
            host: var("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse(&var, "REDIS_PORT", Some(6379))?,
            password: var("REDIS_PASSWORD"),
            connect_timeout: Duration::from_millis(parse(
                &var,
                "DAYBOOK_CONNECT_TIMEOUT_MS",
                Some(5000),
            )?),
            response_timeout: Duration::from_millis(parse(
                &var,
                "DAYBOOK_RESPONSE_TIMEOUT_MS",
                Some(5000),
            )?),
        };
        if redis.response_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "DAYBOOK_RESPONSE_TIMEOUT_MS",
                value: "0".to_string(),
            });
        }

        let defaults = BackoffPolicy::default();
        let backoff = BackoffPolicy {
            base: Duration::from_millis(parse(
                &var,
                "DAYBOOK_RECONNECT_BASE_MS",
                Some(defaults.base.as_millis() as u64),
            )?),
            cap: Duration::from_millis(parse(
                &var,
                "DAYBOOK_RECONNECT_CAP_MS",
                Some(defaults.cap.as_millis() as u64),
            )?),
            max_retries: parse(&var, "DAYBOOK_RECONNECT_MAX_RETRIES", Some(defaults.max_retries))?,
        };
        if backoff.base > backoff.cap {
            return Err(ConfigError::BackoffOrder);
        }

        let ttl_secs: u64 = parse(&var, "DAYBOOK_RECORD_TTL_SECS", Some(3600))?;
        if ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "DAYBOOK_RECORD_TTL_SECS",
                value: "0".to_string(),
            });
        }

        let reconcile_interval = match var("DAYBOOK_RECONCILE_INTERVAL_SECS") {
            None => None,
            Some(_) => {
                let secs: u64 = parse(&var, "DAYBOOK_RECONCILE_INTERVAL_SECS", None)?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
        };

        Ok(Self {
            bind,
            backend,
            redis,
            link: LinkConfig {
                default_ttl: Duration::from_secs(ttl_secs),
                backoff,
            },
            reconcile_interval,
            environment: var("DAYBOOK_ENV").unwrap_or_else(|| "production".to_string()),
            log_format: parse(&var, "DAYBOOK_LOG_FORMAT", Some(LogFormat::Pretty))?,
        })
    }

    /// Whether internal error detail may be sent to clients.
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Build the connector for the configured backend.
    pub fn connector(&self) -> Result<Arc<dyn Connector>, BackendError> {
        Ok(match self.backend {
            BackendKind::Redis => Arc::new(RedisConnector::new(&self.redis)?),
            BackendKind::Memory => Arc::new(MemoryBackend::new().connector()),
        })
    }
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match (var(name), default) {
        (Some(raw), _) => {
            let parsed = raw.trim().parse();
            parsed.map_err(|_| ConfigError::Invalid { name, value: raw })
        }
        (None, Some(default)) => Ok(default),
        (None, None) => Err(ConfigError::Invalid {
            name,
            value: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<DaybookConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaybookConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn config_loads_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.bind, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.backend, BackendKind::Redis);
        assert_eq!(config.redis.host, "localhost");
        assert_eq!(config.redis.port, 6379);
        assert!(config.redis.password.is_none());
        assert_eq!(config.redis.response_timeout, Duration::from_millis(5000));
        assert_eq!(config.link.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.link.backoff, BackoffPolicy::default());
        assert!(config.reconcile_interval.is_none());
        assert!(!config.is_development());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn config_reads_overrides() {
        let config = load(&[
            ("DAYBOOK_BIND", "127.0.0.1:8080"),
            ("DAYBOOK_BACKEND", "memory"),
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_PASSWORD", "hunter2"),
            ("DAYBOOK_RECONNECT_MAX_RETRIES", "3"),
            ("DAYBOOK_RESPONSE_TIMEOUT_MS", "750"),
            ("DAYBOOK_RECONCILE_INTERVAL_SECS", "600"),
            ("DAYBOOK_ENV", "development"),
            ("DAYBOOK_LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.redis.host, "cache.internal");
        assert_eq!(config.redis.port, 6380);
        assert_eq!(config.redis.password.as_deref(), Some("hunter2"));
        assert_eq!(config.link.backoff.max_retries, 3);
        assert_eq!(config.redis.response_timeout, Duration::from_millis(750));
        assert_eq!(config.reconcile_interval, Some(Duration::from_secs(600)));
        assert!(config.is_development());
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn config_rejects_bad_values() {
        let err = load(&[("REDIS_PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("REDIS_PORT"), "{}", err);

        let err = load(&[("DAYBOOK_BACKEND", "postgres")]).unwrap_err();
        assert!(err.to_string().contains("DAYBOOK_BACKEND"), "{}", err);

        assert!(matches!(
            load(&[("REDIS_TLS", "true")]),
            Err(ConfigError::TlsUnsupported)
        ));
        assert!(matches!(
            load(&[("DAYBOOK_RECONNECT_BASE_MS", "5000")]),
            Err(ConfigError::BackoffOrder)
        ));
        assert!(load(&[("DAYBOOK_RECORD_TTL_SECS", "0")]).is_err());
        assert!(load(&[("DAYBOOK_RESPONSE_TIMEOUT_MS", "0")]).is_err());
    }

    #[test]
    fn zero_reconcile_interval_disables_schedule() {
        let config = load(&[("DAYBOOK_RECONCILE_INTERVAL_SECS", "0")]).unwrap();
        assert!(config.reconcile_interval.is_none());
    }
}
