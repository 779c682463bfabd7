use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::loader::{
    jitter::{DEFAULT_JITTER_MAX_MS, DEFAULT_JITTER_MIN_MS},
    RetryBudget,
};

/// Prefix of environment variables that override the config file,
/// e.g. `OBS_DATASTORE__PASSWORD` for `datastore.password`
pub const ENVVAR_PREFIX: &str = "OBS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("no connection string provided (set `datastore.connection_string`, or all of `datastore.username`, `datastore.password` and `datastore.server`)")]
    NoConnectionString,
    #[error("no {0} provided")]
    Missing(&'static str),
    #[error("jitter range is empty or reversed: {min_ms}ms..{max_ms}ms")]
    JitterRange { min_ms: u64, max_ms: u64 },
}

pub async fn open(path: &Path) -> Result<Config, ConfigError> {
    let buf = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    from_str(&buf)
}

/// Parse a TOML config, apply `OBS_*` environment overrides, and validate
pub fn from_str(buf: &str) -> Result<Config, ConfigError> {
    from_str_with_env(buf, ENVVAR_PREFIX)
}

fn from_str_with_env(buf: &str, env_prefix: &str) -> Result<Config, ConfigError> {
    let settings: Settings = config::Config::builder()
        .add_source(config::File::from_str(buf, config::FileFormat::Toml))
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize()?;
    settings.validate()
}

/// The config as written, before anything is checked
#[derive(Debug, Clone, Deserialize)]
struct Settings {
    datastore: DataStoreSettings,
    #[serde(default)]
    loader: LoaderConfig,
    source: SourceConfig,
    #[serde(default)]
    log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DataStoreSettings {
    connection_string: Option<String>,
    username: Option<String>,
    password: Option<String>,
    server: Option<String>,
    #[serde(default = "default_true")]
    use_tls: bool,
    database_name: Option<String>,
    collection_name: Option<String>,
}

fn default_true() -> bool {
    true
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    fn validate(self) -> Result<Config, ConfigError> {
        let ds = self.datastore;
        let connection_string = match non_empty(ds.connection_string) {
            Some(cs) => cs,
            None => match (
                non_empty(ds.username.clone()),
                non_empty(ds.password.clone()),
                non_empty(ds.server.clone()),
            ) {
                (Some(user), Some(pass), Some(server)) => {
                    format!("mongodb://{user}:{pass}@{server}")
                }
                _ => return Err(ConfigError::NoConnectionString),
            },
        };
        let database_name =
            non_empty(ds.database_name).ok_or(ConfigError::Missing("database name"))?;
        let collection_name =
            non_empty(ds.collection_name).ok_or(ConfigError::Missing("collection name"))?;

        let loader = self.loader;
        if loader.jitter_max_ms < loader.jitter_min_ms {
            return Err(ConfigError::JitterRange {
                min_ms: loader.jitter_min_ms,
                max_ms: loader.jitter_max_ms,
            });
        }
        if self.source.path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("source path"));
        }

        Ok(Config {
            datastore: DataStoreConfig {
                connection_string,
                password: non_empty(ds.password),
                use_tls: ds.use_tls,
                database_name,
                collection_name,
            },
            loader,
            source: self.source,
            log: self.log,
        })
    }
}

/// Validated configuration, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub datastore: DataStoreConfig,
    pub loader: LoaderConfig,
    pub source: SourceConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStoreConfig {
    /// full connection string, either as given or built from username/password/server
    pub connection_string: String,
    /// kept only so it can be masked when the config is printed
    password: Option<String>,
    pub use_tls: bool,
    pub database_name: String,
    /// the collection observations are written to
    pub collection_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoaderConfig {
    /// how many failed attempts a batch may absorb before the load gives up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// extra random wait added to the store's retry hint (lower bound)
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,
    /// extra random wait added to the store's retry hint (exclusive upper bound)
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
    /// fixed seed for the jitter, for reproducible runs
    #[serde(default)]
    pub jitter_seed: Option<u64>,
}

fn default_max_retries() -> u32 {
    RetryBudget::DEFAULT.remaining()
}

fn default_jitter_min_ms() -> u64 {
    DEFAULT_JITTER_MIN_MS
}

fn default_jitter_max_ms() -> u64 {
    DEFAULT_JITTER_MAX_MS
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            jitter_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// JSON file holding the parsed observation records
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    /// default filter directive, `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
    /// also write logs to hourly files in this directory
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl Config {
    /// The effective configuration as JSON, with the password masked
    pub fn serialize_redacted(&self) -> String {
        let mut connection_string = self.datastore.connection_string.clone();
        if let Some(password) = &self.datastore.password {
            connection_string = connection_string.replace(password.as_str(), "*****");
        }
        let value = serde_json::json!({
            "datastore": {
                "connection_string": connection_string,
                "use_tls": self.datastore.use_tls,
                "database_name": self.datastore.database_name,
                "collection_name": self.datastore.collection_name,
            },
            "loader": {
                "max_retries": self.loader.max_retries,
                "jitter_min_ms": self.loader.jitter_min_ms,
                "jitter_max_ms": self.loader.jitter_max_ms,
                "jitter_seed": self.loader.jitter_seed,
            },
            "source": { "path": self.source.path },
            "log": { "level": self.log.level, "dir": self.log.dir },
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
    }
}
