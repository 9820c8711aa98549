//! Configuration file loading and validation
//!
//! Configuration is loaded once at startup and handed to each component
//! explicitly. Search order for the file:
//! 1. Explicit path passed by the caller
//! 2. `SATCHEL_CONFIG` environment variable
//! 3. `satchel.yaml` / `satchel.yml` in the current directory

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "SATCHEL_CONFIG";

/// Configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["satchel.yaml", "satchel.yml"];

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SatchelConfig {
    /// Directory in which bags are assembled
    pub working_dir: Utf8PathBuf,

    /// Directory receiving exported tar archives
    pub export_dir: Utf8PathBuf,

    /// Directory holding the status log
    #[serde(default = "default_status_log_dir")]
    pub status_log_dir: Utf8PathBuf,

    /// Repository segment of every bag identifier
    pub repository: String,

    /// Value of the descriptor tag's Source-Organization field
    pub source_organization: String,

    /// Package locally but never contact the remote
    #[serde(default)]
    pub dry_run: bool,

    /// Delete the exported archive after a successful deposit
    #[serde(default)]
    pub remove_export: bool,

    /// Manifest algorithms, by manifest file name (`md5`, `sha256`, ...)
    #[serde(default = "default_manifest_algorithms")]
    pub manifest_algorithms: Vec<String>,

    /// Objects larger than this are filtered out before reaching the pipeline
    #[serde(default)]
    pub size_threshold_bytes: Option<u64>,

    /// Payload sub-path holding a nested bag to validate before packaging
    #[serde(default)]
    pub inner_bag: Option<String>,

    /// Directory on the remote receiving deposits
    #[serde(default)]
    pub remote_dir: Option<String>,

    /// Name of the remote used for deposits when several are configured
    #[serde(default)]
    pub default_remote: Option<String>,

    /// Repository metadata tag defaults
    #[serde(default)]
    pub metadata: MetadataDefaults,

    /// Configured remotes, keyed by name
    pub remotes: BTreeMap<String, TransportConfig>,

    /// External ingest status API
    #[serde(default)]
    pub ingest: Option<IngestApiConfig>,

    /// Retry policy applied to network calls
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_status_log_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("status")
}

fn default_manifest_algorithms() -> Vec<String> {
    vec!["md5".to_string()]
}

/// Defaults for the repository metadata tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetadataDefaults {
    #[serde(default = "default_access")]
    pub access: String,

    #[serde(default = "default_storage_option")]
    pub storage_option: String,
}

impl Default for MetadataDefaults {
    fn default() -> Self {
        Self {
            access: default_access(),
            storage_option: default_storage_option(),
        }
    }
}

fn default_access() -> String {
    "Institution".to_string()
}

fn default_storage_option() -> String {
    "Standard".to_string()
}

/// Remote endpoint settings, discriminated by `type`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    Filesystem(FilesystemSettings),
    S3(S3Settings),
    Sftp(SftpSettings),
}

impl TransportConfig {
    /// Discriminator as written in the configuration file
    pub fn type_name(&self) -> &'static str {
        match self {
            TransportConfig::Filesystem(_) => "filesystem",
            TransportConfig::S3(_) => "s3",
            TransportConfig::Sftp(_) => "sftp",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct FilesystemSettings {
    pub base_dir: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct S3Settings {
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom S3-compatible endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub prefix: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SftpSettings {
    pub host: String,

    #[serde(default = "default_sftp_port")]
    pub port: u16,

    pub username: String,

    /// Private key used for the session
    pub key_path: Utf8PathBuf,

    #[serde(default)]
    pub base_dir: Option<String>,
}

fn default_sftp_port() -> u16 {
    22
}

/// External ingest status API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IngestApiConfig {
    pub base_url: String,

    pub api_user: String,

    pub api_key: String,

    /// Prepended to the bag identifier to form the remote object identifier
    #[serde(default)]
    pub object_identifier_prefix: String,

    #[serde(default = "default_user_header")]
    pub user_header: String,

    #[serde(default = "default_key_header")]
    pub key_header: String,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_user_header() -> String {
    "X-Pharos-API-User".to_string()
}

fn default_key_header() -> String {
    "X-Pharos-API-Key".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Retry policy for an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Multiplier for exponential backoff
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}

/// Backoff strategy between attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    None,
    FixedDelay,
    #[default]
    ExponentialBackoff,
    LinearBackoff,
}

impl SatchelConfig {
    /// Load configuration from the given path, the environment, or the current directory
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_owned(),
            None => Self::find_config()?,
        };

        let content = fs::read_to_string(&config_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(config_path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        let config = Self::from_yaml(&content)?;
        tracing::debug!("Loaded configuration from {}", config_path);
        Ok(config)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: SatchelConfig = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn find_config() -> Result<Utf8PathBuf> {
        if let Ok(from_env) = std::env::var(CONFIG_ENV_VAR) {
            return Ok(Utf8PathBuf::from(from_env));
        }

        CONFIG_FILE_NAMES
            .iter()
            .map(|name| Utf8PathBuf::from(*name))
            .find(|p| p.exists())
            .ok_or_else(|| Error::config_not_found(CONFIG_FILE_NAMES.join(" or ")))
    }

    /// Check required fields and cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.working_dir.as_str().is_empty() {
            return Err(Error::invalid_config("working-dir is required"));
        }
        if self.export_dir.as_str().is_empty() {
            return Err(Error::invalid_config("export-dir is required"));
        }
        if self.working_dir == self.export_dir {
            return Err(Error::invalid_config(
                "working-dir and export-dir must be different directories",
            ));
        }
        if self.repository.trim().is_empty() {
            return Err(Error::invalid_config("repository is required"));
        }
        if self.source_organization.trim().is_empty() {
            return Err(Error::invalid_config("source-organization is required"));
        }
        if self.manifest_algorithms.is_empty() {
            return Err(Error::invalid_config(
                "manifest-algorithms must list at least one algorithm",
            ));
        }
        if self.remotes.is_empty() {
            return Err(Error::invalid_config("at least one remote must be configured"));
        }
        if let Some(name) = &self.default_remote {
            if !self.remotes.contains_key(name) {
                return Err(Error::invalid_config(format!(
                    "default-remote '{}' is not a configured remote",
                    name
                )));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_config("retry.max-attempts must be at least 1"));
        }
        Ok(())
    }

    /// Resolve the remote used for deposits
    pub fn deposit_remote(&self) -> Result<(&str, &TransportConfig)> {
        let name = match &self.default_remote {
            Some(name) => name.as_str(),
            None if self.remotes.len() == 1 => self
                .remotes
                .keys()
                .next()
                .map(String::as_str)
                .ok_or_else(|| Error::invalid_config("no remotes configured"))?,
            None => {
                return Err(Error::invalid_config(
                    "several remotes configured; set default-remote",
                ))
            }
        };

        self.remotes
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| Error::invalid_config(format!("unknown remote '{}'", name)))
    }
}
