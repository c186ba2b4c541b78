use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Server configuration, read once at startup from `HOTELD_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    /// WAL appends since the last compaction before the compactor rewrites it.
    pub compact_threshold: u64,
    pub lock_timeout: Duration,
    /// Prometheus exporter port. Unset disables the exporter.
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "hoteld".into(),
            max_connections: 256,
            compact_threshold: 1000,
            lock_timeout: Duration::from_millis(5000),
            metrics_port: None,
            tls_cert: None,
            tls_key: None,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(var = key, value = %raw, "invalid value, using default");
                default
            }
        },
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let lock_timeout_ms = parsed(&lookup, "HOTELD_LOCK_TIMEOUT_MS", 5000u64);
        let metrics_port = lookup("HOTELD_METRICS_PORT").and_then(|raw| match raw.trim().parse() {
            Ok(port) => Some(port),
            Err(_) => {
                warn!(var = "HOTELD_METRICS_PORT", value = %raw, "invalid value, metrics disabled");
                None
            }
        });

        Self {
            port: parsed(&lookup, "HOTELD_PORT", defaults.port),
            bind: lookup("HOTELD_BIND").unwrap_or(defaults.bind),
            data_dir: lookup("HOTELD_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            password: lookup("HOTELD_PASSWORD").unwrap_or(defaults.password),
            max_connections: parsed(&lookup, "HOTELD_MAX_CONNECTIONS", defaults.max_connections).max(1),
            compact_threshold: parsed(&lookup, "HOTELD_COMPACT_THRESHOLD", defaults.compact_threshold),
            lock_timeout: Duration::from_millis(lock_timeout_ms.max(1)),
            metrics_port,
            tls_cert: lookup("HOTELD_TLS_CERT"),
            tls_key: lookup("HOTELD_TLS_KEY"),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("hoteld.wal")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from_pairs(&[]);
        assert_eq!(config.port, 5433);
        assert_eq!(config.listen_addr(), "0.0.0.0:5433");
        assert_eq!(config.password, "hoteld");
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert!(config.metrics_port.is_none());
        assert_eq!(config.wal_path(), PathBuf::from("./data/hoteld.wal"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = from_pairs(&[
            ("HOTELD_PORT", "6000"),
            ("HOTELD_DATA_DIR", "/var/lib/hoteld"),
            ("HOTELD_LOCK_TIMEOUT_MS", "250"),
            ("HOTELD_METRICS_PORT", "9100"),
            ("HOTELD_COMPACT_THRESHOLD", "10"),
        ]);
        assert_eq!(config.port, 6000);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/hoteld"));
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.compact_threshold, 10);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = from_pairs(&[
            ("HOTELD_PORT", "not-a-port"),
            ("HOTELD_MAX_CONNECTIONS", "-3"),
            ("HOTELD_METRICS_PORT", "99999"),
        ]);
        assert_eq!(config.port, 5433);
        assert_eq!(config.max_connections, 256);
        assert!(config.metrics_port.is_none());
    }
}
