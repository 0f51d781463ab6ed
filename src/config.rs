//! Service configuration
//!
//! Read from a JSON file. Every field is optional:
//!
//! ```json
//! {
//!   "bucket": "uploads",
//!   "storage": { "type": "http", "endpoint": "https://storage.googleapis.com" },
//!   "max_file_size": 209715200,
//!   "extraction_threads": 8,
//!   "analyzer": "game",
//!   "policy": { "encoding_rules": [], "rewrite_rules": [] }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::analyzer::AnalyzerKind;
use crate::archiver::Archiver;
use crate::limits::ExtractLimits;
use crate::paths::DEFAULT_IGNORE_PREFIXES;
use crate::policy::ContentPolicy;
use crate::storage::{FsStorage, HttpStorage, Storage, StorageError};

/// Where objects are read from and written to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// A local directory, one subdirectory per bucket
    Fs { root: PathBuf },

    /// GCS-style XML API
    Http {
        endpoint: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    crate::storage::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Fs {
            root: PathBuf::from("storage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bucket holding both the archives and the extracted files
    pub bucket: String,

    pub storage: StorageConfig,

    pub max_file_size: u64,
    pub max_total_size: u64,
    pub max_num_files: usize,
    pub max_file_name_length: usize,
    pub extraction_threads: usize,

    pub analyzer: AnalyzerKind,

    /// Entry prefixes skipped during extraction
    pub ignore_prefixes: Vec<String>,

    pub policy: ContentPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let limits = ExtractLimits::default();
        Self {
            bucket: "zipserver".to_string(),
            storage: StorageConfig::default(),
            max_file_size: limits.max_file_size,
            max_total_size: limits.max_total_size,
            max_num_files: limits.max_num_files,
            max_file_name_length: limits.max_file_name_length,
            extraction_threads: limits.extraction_threads,
            analyzer: AnalyzerKind::default(),
            ignore_prefixes: DEFAULT_IGNORE_PREFIXES.iter().map(|p| p.to_string()).collect(),
            policy: ContentPolicy::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("bucket name is empty")]
    MissingBucket,

    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),
}

impl Config {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let config: Self =
            serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;

        Ok(config)
    }

    /// Load the given file, or use defaults when no path is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Default limits for jobs, before per-job overrides
    pub fn limits(&self) -> ExtractLimits {
        ExtractLimits {
            max_file_size: self.max_file_size,
            max_total_size: self.max_total_size,
            max_num_files: self.max_num_files,
            max_file_name_length: self.max_file_name_length,
            extraction_threads: self.extraction_threads,
        }
    }

    pub fn build_storage(&self) -> Result<Arc<dyn Storage>, ConfigError> {
        Ok(match &self.storage {
            StorageConfig::Fs { root } => Arc::new(FsStorage::new(root.clone())),
            StorageConfig::Http {
                endpoint,
                token,
                timeout_secs,
            } => Arc::new(HttpStorage::new(
                endpoint,
                token.clone(),
                Duration::from_secs(*timeout_secs),
            )?),
        })
    }

    /// Archiver wired with this config's storage, analyzer and rules
    pub fn build_archiver(&self) -> Result<Archiver, ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::MissingBucket);
        }

        Ok(Archiver::new(self.build_storage()?, self.bucket.clone())
            .with_analyzer(self.analyzer.build())
            .with_policy(self.policy.clone())
            .with_ignore_prefixes(self.ignore_prefixes.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::EncodingRule;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.limits(), ExtractLimits::default());
        assert_eq!(config.ignore_prefixes, vec!["__MACOSX/"]);
        assert!(config.policy.encoding_rules.is_empty());
        assert_eq!(config.analyzer, AnalyzerKind::Game);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("zipserver.json");
        std::fs::write(
            &path,
            r#"{
                "bucket": "uploads",
                "storage": { "type": "http", "endpoint": "http://localhost:4443" },
                "extraction_threads": 8,
                "analyzer": "music",
                "policy": { "encoding_rules": [{ "extension": ".unityweb", "encoding": "gzip" }] }
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.bucket, "uploads");
        assert_eq!(config.extraction_threads, 8);
        assert_eq!(config.max_num_files, 100);
        assert_eq!(config.analyzer, AnalyzerKind::Music);
        assert_eq!(
            config.storage,
            StorageConfig::Http {
                endpoint: "http://localhost:4443".into(),
                token: None,
                timeout_secs: default_timeout_secs(),
            }
        );
        assert_eq!(
            config.policy.encoding_rules,
            vec![EncodingRule {
                extension: ".unityweb".into(),
                encoding: "gzip".into(),
            }]
        );
        assert!(config.policy.rewrite_rules.is_empty());
        assert!(config.build_archiver().is_ok());
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.json");
        let err = Config::load(&missing).unwrap_err();
        assert!(format!("{:?}", err).contains("missing.json"));

        let broken = temp.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        let err = Config::load(&broken).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let config = Config {
            bucket: String::new(),
            ..Config::default()
        };
        assert!(matches!(config.build_archiver(), Err(ConfigError::MissingBucket)));
    }
}
