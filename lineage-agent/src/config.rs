//! Configuration management for the lineage agent.
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML
//! file, `LINEAGE_*` environment variables (`LINEAGE_MYSQL__PORT=3307`), and
//! finally the URL-encoded `--options` list handed over by the orchestration
//! layer.

use crate::utils::errors::{LineageError, Result};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub tool: ToolConfig,
    pub mysql: MysqlConfig,
    pub backup: BackupConfig,
    pub retention: RetentionConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per backup artifact
    pub root: PathBuf,

    /// Take the storage lock around backup, restore and prune
    #[serde(default = "default_true")]
    pub lock: bool,

    /// Longest parent chain accepted before it is treated as a cycle
    #[serde(default = "default_max_lineage_depth")]
    pub max_lineage_depth: usize,

    /// Default restore staging directory
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Backup tool binary
    #[serde(default = "default_xtrabackup")]
    pub xtrabackup: PathBuf,

    /// Copy binary used to seed the staging directory
    #[serde(default = "default_copy")]
    pub copy: PathBuf,

    /// Extra arguments appended to every backup invocation
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    /// my.cnf passed to the backup tool
    #[serde(default)]
    pub defaults_file: Option<PathBuf>,

    #[serde(default)]
    pub socket: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Chain onto the latest backup when its lineage is intact
    #[serde(default)]
    pub incremental: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Full backups (with their incrementals) to keep; 0 disables pruning
    #[serde(default)]
    pub keep_full: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_true() -> bool {
    true
}

fn default_max_lineage_depth() -> usize {
    crate::lineage::DEFAULT_MAX_DEPTH
}

fn default_xtrabackup() -> PathBuf {
    PathBuf::from("xtrabackup")
}

fn default_copy() -> PathBuf {
    PathBuf::from("cp")
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_user() -> String {
    "tungsten".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                root: PathBuf::from("/opt/continuent/backups/xtrabackup"),
                lock: default_true(),
                max_lineage_depth: default_max_lineage_depth(),
                staging_dir: None,
            },
            tool: ToolConfig {
                xtrabackup: default_xtrabackup(),
                copy: default_copy(),
                extra_args: Vec::new(),
            },
            mysql: MysqlConfig {
                host: default_host(),
                port: default_port(),
                user: default_user(),
                password: None,
                defaults_file: None,
                socket: None,
            },
            backup: BackupConfig { incremental: false },
            retention: RetentionConfig { keep_full: 0 },
            log: LogConfig {
                level: default_log_level(),
            },
        }
    }
}

impl Config {
    /// Load defaults, then the optional TOML file, then `LINEAGE_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default()).map_err(config_error)?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LINEAGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|c| c.try_deserialize::<Config>())
            .map_err(config_error)
    }

    /// Apply `key=value` overrides from the orchestration layer.
    ///
    /// Unknown keys are logged and ignored.
    pub fn apply_options(&mut self, options: &[(String, String)]) -> Result<()> {
        for (key, value) in options {
            match key.as_str() {
                "host" => self.mysql.host = value.clone(),
                "port" => {
                    self.mysql.port = value.parse().map_err(|_| {
                        LineageError::Config(format!("invalid port '{}'", value))
                    })?
                }
                "user" => self.mysql.user = value.clone(),
                "password" => self.mysql.password = Some(value.clone()),
                "directory" => self.storage.root = PathBuf::from(value),
                "staging" => self.storage.staging_dir = Some(PathBuf::from(value)),
                "incremental" => self.backup.incremental = parse_bool(key, value)?,
                "keep_full" => {
                    self.retention.keep_full = value.parse().map_err(|_| {
                        LineageError::Config(format!("invalid keep_full '{}'", value))
                    })?
                }
                "defaults_file" => self.mysql.defaults_file = Some(PathBuf::from(value)),
                "socket" => self.mysql.socket = Some(PathBuf::from(value)),
                "xtrabackup" => self.tool.xtrabackup = PathBuf::from(value),
                _ => tracing::warn!("Ignoring unknown option '{}'", key),
            }
        }
        Ok(())
    }

    /// Check the configuration before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.storage.root.as_os_str().is_empty() {
            return Err(LineageError::Config("storage root must not be empty".to_string()));
        }
        if self.mysql.port == 0 {
            return Err(LineageError::Config("port must be non-zero".to_string()));
        }
        if self.storage.max_lineage_depth == 0 {
            return Err(LineageError::Config(
                "max_lineage_depth must be at least 1".to_string(),
            ));
        }
        if self.tool.xtrabackup.as_os_str().is_empty() || self.tool.copy.as_os_str().is_empty() {
            return Err(LineageError::Config("tool programs must not be empty".to_string()));
        }
        Ok(())
    }

    /// Effective configuration as TOML, password masked.
    pub fn to_toml_masked(&self) -> Result<String> {
        let mut masked = self.clone();
        if masked.mysql.password.is_some() {
            masked.mysql.password = Some("****".to_string());
        }
        toml::to_string_pretty(&masked)
            .map_err(|e| LineageError::Config(format!("failed to render configuration: {}", e)))
    }
}

/// Parse an URL-encoded `key=value&key=value` list.
pub fn parse_options(raw: &str) -> Result<Vec<(String, String)>> {
    let mut options = Vec::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            LineageError::Config(format!("option '{}' is not key=value", pair))
        })?;
        options.push((decode(key)?.trim().to_string(), decode(value)?));
    }
    Ok(options)
}

fn decode(raw: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| LineageError::Config(format!("invalid UTF-8 in option '{}': {}", raw, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(LineageError::Config(format!("invalid boolean for {}: '{}'", key, value))),
    }
}

fn config_error(e: config::ConfigError) -> LineageError {
    LineageError::Config(e.to_string())
}
