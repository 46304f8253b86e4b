//! Configuration management for `todo_service`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides
//! 2. Environment variables
//! 3. YAML config file (`--config`, or `todod.yaml` in the working directory)
//! 4. Defaults
//!
//! Every source is flattened into a [`ConfigLayer`] of normalized
//! `dotted.kebab-case` keys; the merged layer is then parsed once into a
//! typed [`ServiceConfig`].

use crate::error::{Result, TodoError};
use crate::storage::PoolConfig;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILENAME: &str = "todod.yaml";
/// Default database filename.
pub const DEFAULT_DB_FILENAME: &str = "todos.db";

/// Environment variables and the config keys they set, in increasing
/// precedence (`TODO_PORT` beats `PORT`).
const ENV_KEYS: &[(&str, &str)] = &[
    ("PORT", "port"),
    ("TODO_HOST", "host"),
    ("TODO_PORT", "port"),
    ("TODO_DATABASE", "database"),
    ("TODO_POOL_MAX_OPEN", "pool.max-open"),
    ("TODO_POOL_MAX_IDLE", "pool.max-idle"),
    ("TODO_POOL_IDLE_TIMEOUT_SECS", "pool.idle-timeout-secs"),
    ("TODO_POOL_ACQUIRE_TIMEOUT_SECS", "pool.acquire-timeout-secs"),
    ("TODO_POOL_BUSY_TIMEOUT_MS", "pool.busy-timeout-ms"),
    ("TODO_STATEMENT_TIMEOUT_SECS", "statement-timeout-secs"),
    ("TODO_REQUEST_TIMEOUT_SECS", "request-timeout-secs"),
    ("TODO_SHUTDOWN_GRACE_SECS", "shutdown-grace-secs"),
];

/// A flat set of configuration keys from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        Ok(layer_from_yaml_value(&value))
    }

    /// Build a layer from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_vars(env::vars())
    }

    /// Build a layer from `(name, value)` pairs, as [`from_env`](Self::from_env)
    /// does for the real environment.
    #[must_use]
    pub fn from_env_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let mut layer = Self::default();
        for (name, key) in ENV_KEYS {
            if let Some(value) = vars.get(*name) {
                if !value.trim().is_empty() {
                    layer.insert(key, value.trim().to_string());
                }
            }
        }
        layer
    }

    pub fn insert(&mut self, key: &str, value: String) {
        self.values.insert(normalize_key(key), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&String> {
        self.values.get(&normalize_key(key))
    }
}

/// CLI overrides for config loading (optional).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<PathBuf>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();

        if let Some(host) = &self.host {
            layer.insert("host", host.clone());
        }
        if let Some(port) = self.port {
            layer.insert("port", port.to_string());
        }
        if let Some(path) = &self.database {
            layer.insert("database", path.to_string_lossy().to_string());
        }

        layer
    }
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let defaults = ServiceConfig::default();
    let mut layer = ConfigLayer::default();
    layer.insert("host", defaults.host);
    layer.insert("port", defaults.port.to_string());
    layer.insert("database", defaults.database.to_string_lossy().to_string());
    layer.insert("pool.max-open", defaults.pool.max_open.to_string());
    layer.insert("pool.max-idle", defaults.pool.max_idle.to_string());
    layer.insert(
        "pool.idle-timeout-secs",
        defaults.pool.idle_timeout.as_secs().to_string(),
    );
    layer.insert(
        "pool.acquire-timeout-secs",
        defaults.pool.acquire_timeout.as_secs().to_string(),
    );
    layer.insert(
        "pool.busy-timeout-ms",
        defaults.pool.busy_timeout.as_millis().to_string(),
    );
    layer.insert(
        "statement-timeout-secs",
        defaults
            .statement_timeout
            .map_or(0, |timeout| timeout.as_secs())
            .to_string(),
    );
    layer.insert(
        "request-timeout-secs",
        defaults.request_timeout.as_secs().to_string(),
    );
    layer.insert(
        "shutdown-grace-secs",
        defaults.shutdown_grace.as_secs().to_string(),
    );
    layer
}

/// Fully resolved service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub database: PathBuf,
    pub pool: PoolConfig,
    /// `None` disables the store-side deadline.
    pub statement_timeout: Option<Duration>,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database: PathBuf::from(DEFAULT_DB_FILENAME),
            pool: PoolConfig::default(),
            statement_timeout: Some(Duration::from_secs(15)),
            request_timeout: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ServiceConfig {
    /// Parse a merged layer.
    ///
    /// # Errors
    ///
    /// Returns [`TodoError::Config`] naming the first key that is missing or
    /// cannot be parsed.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let pool = PoolConfig {
            max_open: parse_value(layer, "pool.max-open")?,
            max_idle: parse_value(layer, "pool.max-idle")?,
            idle_timeout: Duration::from_secs(parse_value(layer, "pool.idle-timeout-secs")?),
            acquire_timeout: Duration::from_secs(parse_value(
                layer,
                "pool.acquire-timeout-secs",
            )?),
            busy_timeout: Duration::from_millis(parse_value(layer, "pool.busy-timeout-ms")?),
        };
        if pool.max_open == 0 {
            return Err(TodoError::Config(
                "pool.max-open must be at least 1".to_string(),
            ));
        }

        let statement_timeout_secs: u64 = parse_value(layer, "statement-timeout-secs")?;

        Ok(Self {
            host: require(layer, "host")?.clone(),
            port: parse_value(layer, "port")?,
            database: PathBuf::from(require(layer, "database")?),
            pool,
            statement_timeout: (statement_timeout_secs > 0)
                .then(|| Duration::from_secs(statement_timeout_secs)),
            request_timeout: Duration::from_secs(parse_value(layer, "request-timeout-secs")?),
            shutdown_grace: Duration::from_secs(parse_value(layer, "shutdown-grace-secs")?),
        })
    }

    /// Get the socket address string.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load configuration with the standard precedence order.
///
/// An explicitly named config file must exist; the implicit
/// [`DEFAULT_CONFIG_FILENAME`] is optional.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed, or a value
/// is invalid.
pub fn load_config(config_file: Option<&Path>, cli: &CliOverrides) -> Result<ServiceConfig> {
    let file_layer = match config_file {
        Some(path) if !path.exists() => {
            return Err(TodoError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Some(path) => ConfigLayer::from_yaml(path)?,
        None => ConfigLayer::from_yaml(Path::new(DEFAULT_CONFIG_FILENAME))?,
    };

    let merged = ConfigLayer::merge_layers(&[
        default_config_layer(),
        file_layer,
        ConfigLayer::from_env(),
        cli.as_layer(),
    ]);
    ServiceConfig::from_layer(&merged)
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

fn require<'a>(layer: &'a ConfigLayer, key: &str) -> Result<&'a String> {
    layer
        .get(key)
        .ok_or_else(|| TodoError::Config(format!("missing config key: {key}")))
}

fn parse_value<T: std::str::FromStr>(layer: &ConfigLayer, key: &str) -> Result<T> {
    let raw = require(layer, key)?;
    raw.trim()
        .parse::<T>()
        .map_err(|_| TodoError::Config(format!("invalid value for {key}: {raw:?}")))
}

fn layer_from_yaml_value(value: &serde_yaml::Value) -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    let mut flat = HashMap::new();
    flatten_yaml(value, "", &mut flat);

    for (key, value) in flat {
        layer.insert(&key, value);
    }

    layer
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ServiceConfig::from_layer(&default_config_layer()).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
        assert_eq!(config.database, PathBuf::from(DEFAULT_DB_FILENAME));
        assert_eq!(config.pool, PoolConfig::default());
        assert_eq!(config.statement_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
    }

    #[test]
    fn merge_precedence_order() {
        let mut yaml = ConfigLayer::default();
        yaml.insert("port", "7000".to_string());
        yaml.insert("host", "127.0.0.1".to_string());

        let env_layer = ConfigLayer::from_env_vars(vars(&[("PORT", "7100")]));

        let cli = CliOverrides {
            port: Some(7200),
            ..CliOverrides::default()
        };

        let merged =
            ConfigLayer::merge_layers(&[default_config_layer(), yaml, env_layer, cli.as_layer()]);
        let config = ServiceConfig::from_layer(&merged).unwrap();
        assert_eq!(config.port, 7200);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn prefixed_port_beats_plain_port() {
        let layer = ConfigLayer::from_env_vars(vars(&[("PORT", "1"), ("TODO_PORT", "2")]));
        assert_eq!(layer.get("port").unwrap(), "2");
    }

    #[test]
    fn env_ignores_unrelated_and_blank_vars() {
        let layer = ConfigLayer::from_env_vars(vars(&[
            ("HOME", "/root"),
            ("TODO_DATABASE", "  "),
            ("TODO_POOL_MAX_OPEN", "3"),
        ]));
        assert_eq!(layer.values.len(), 1);
        assert_eq!(layer.get("pool.max-open").unwrap(), "3");
    }

    #[test]
    fn yaml_nesting_is_flattened_and_normalized() {
        let yaml = r"
port: 9000
database: /var/lib/todo/todos.db
pool:
  max_open: 4
  idle-timeout-secs: 30
statement_timeout_secs: 0
";
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).expect("parse yaml");
        let layer = layer_from_yaml_value(&value);
        assert_eq!(layer.get("pool.max-open").unwrap(), "4");

        let merged = ConfigLayer::merge_layers(&[default_config_layer(), layer]);
        let config = ServiceConfig::from_layer(&merged).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.database, PathBuf::from("/var/lib/todo/todos.db"));
        assert_eq!(config.pool.max_open, 4);
        assert_eq!(config.pool.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.statement_timeout, None);
    }

    #[test]
    fn invalid_values_name_the_key() {
        let mut layer = default_config_layer();
        layer.insert("port", "eighty".to_string());
        let err = ServiceConfig::from_layer(&layer).unwrap_err();
        assert!(err.to_string().contains("port"), "{err}");

        let mut layer = default_config_layer();
        layer.insert("pool.max-open", "0".to_string());
        assert!(ServiceConfig::from_layer(&layer).is_err());
    }

    #[test]
    fn config_file_is_loaded_and_must_exist_when_named() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("todod.yaml");
        fs::write(&path, "host: 127.0.0.1\nrequest_timeout_secs: 5\n").expect("write config");

        let layer = ConfigLayer::from_yaml(&path).expect("layer");
        assert_eq!(layer.get("host").unwrap(), "127.0.0.1");
        assert_eq!(layer.get("request-timeout-secs").unwrap(), "5");

        let missing = temp.path().join("nope.yaml");
        assert!(ConfigLayer::from_yaml(&missing).unwrap().values.is_empty());
        let err = load_config(Some(&missing), &CliOverrides::default()).unwrap_err();
        assert!(matches!(err, TodoError::Config(_)));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("bad.yaml");
        fs::write(&path, "port: [unclosed").expect("write config");
        assert!(matches!(
            ConfigLayer::from_yaml(&path),
            Err(TodoError::Yaml(_))
        ));
    }
}
