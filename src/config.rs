use serde::{Deserialize, Serialize};

use crate::error::EvictError;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NsEvictConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub eviction: EvictionConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sled,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EvictionConfig {
    /// Separates the namespace from the entry id (`ns:42`).
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Appended to the namespace to form the counter key (`ns-vec_num`).
    #[serde(default = "default_counter_suffix")]
    pub counter_suffix: String,
    /// COUNT hint passed to every SCAN call.
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
    /// Upper bound on keys per DELETE call.
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,
    #[serde(default = "default_true")]
    pub drop_index: bool,
    #[serde(default = "default_true")]
    pub delete_documents: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backend() -> BackendKind {
    BackendKind::Sled
}

fn default_db_path() -> String {
    "./data/nsevict".to_string()
}

fn default_separator() -> String {
    ":".to_string()
}

fn default_counter_suffix() -> String {
    "-vec_num".to_string()
}

fn default_scan_count() -> usize {
    500
}

fn default_delete_batch_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

impl Default for NsEvictConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            eviction: EvictionConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_db_path(),
        }
    }
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            counter_suffix: default_counter_suffix(),
            scan_count: default_scan_count(),
            delete_batch_size: default_delete_batch_size(),
            drop_index: true,
            delete_documents: true,
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl EvictionConfig {
    pub fn validate(&self) -> Result<(), EvictError> {
        if self.separator.is_empty() {
            return Err(EvictError::Config("separator must not be empty".into()));
        }
        if self.counter_suffix.starts_with(&self.separator) {
            return Err(EvictError::Config(format!(
                "counter suffix '{}' starts with the separator and would be scanned as an entry",
                self.counter_suffix
            )));
        }
        if self.scan_count == 0 {
            return Err(EvictError::Config("scan_count must be at least 1".into()));
        }
        if self.delete_batch_size == 0 {
            return Err(EvictError::Config("delete_batch_size must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(EvictError::Config("max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

impl NsEvictConfig {
    pub fn from_toml(s: &str) -> Result<Self, EvictError> {
        let config: Self = toml::from_str(s).map_err(|e| EvictError::Config(e.to_string()))?;
        config.eviction.validate()?;
        Ok(config)
    }

    pub fn load(path: &str) -> Result<Self, EvictError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| EvictError::Config(format!("reading {}: {}", path, e)))?;
        Self::from_toml(&s)
    }

    /// Loads `path` if it exists. A missing file means defaults; a file that
    /// fails to parse or validate is an error.
    pub fn load_or_default(path: &str) -> Result<Self, EvictError> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
