//! Error types for the extraction engine

use thiserror::Error;

use crate::analyzer::AnalyzeError;
use crate::storage::StorageError;

/// A limit that an archive violated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Limit {
    TooManyFiles { count: usize, max: usize },
    ZipTooLarge { total: u64, max: u64 },
    PathTooLong { path: String, max: usize },
    FileTooLarge { path: String, size: u64, max: u64 },
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Limit::TooManyFiles { count, max } => {
                write!(f, "Too many files in zip ({} > {})", count, max)
            }
            Limit::ZipTooLarge { total, max } => {
                write!(f, "zip too large ({} > {} bytes)", total, max)
            }
            Limit::PathTooLong { path, max } => {
                write!(f, "zip contains paths that are too long ({:?} > {} characters)", path, max)
            }
            Limit::FileTooLarge { path, size, max } => {
                write!(f, "zip contains file that is too large ({:?}: {} > {} bytes)", path, size, max)
            }
        }
    }
}

/// Errors returned by an extraction job
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("archive not found: {0}")]
    NotFound(String),

    #[error("invalid zip archive {key}: {source}")]
    InvalidArchive {
        key: String,
        source: zip::result::ZipError,
    },

    #[error("{0}")]
    LimitExceeded(Limit),

    #[error("failed to analyze {key}: {source}")]
    Analysis { key: String, source: AnalyzeError },

    /// Two entries resolved to the same output key
    #[error("zip entries {first:?} and {second:?} both extract to {key}")]
    DuplicateKey { key: String, first: String, second: String },

    #[error("failed to upload {key}: {source}")]
    Upload { key: String, source: StorageError },

    #[error("failed to fetch {key}: {source}")]
    Fetch { key: String, source: StorageError },

    #[error("invalid extraction limits: {0}")]
    InvalidLimits(String),

    #[error("extraction worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

impl ExtractError {
    /// Get error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            ExtractError::NotFound(_) => "not_found",
            ExtractError::InvalidArchive { .. } => "invalid_archive",
            ExtractError::LimitExceeded(_) => "limit_exceeded",
            ExtractError::Analysis { .. } => "analysis",
            ExtractError::DuplicateKey { .. } => "duplicate_key",
            ExtractError::Upload { .. } => "upload",
            ExtractError::Fetch { .. } => "fetch",
            ExtractError::InvalidLimits(_) => "invalid_limits",
            ExtractError::Worker(_) => "worker",
        }
    }

    /// The violated limit, if this is a limit error
    pub fn limit(&self) -> Option<&Limit> {
        match self {
            ExtractError::LimitExceeded(limit) => Some(limit),
            _ => None,
        }
    }
}

impl From<Limit> for ExtractError {
    fn from(limit: Limit) -> Self {
        ExtractError::LimitExceeded(limit)
    }
}
