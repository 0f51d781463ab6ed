//! Per-job extraction limits

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Limit};

/// Bounds for a single extraction job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractLimits {
    /// Maximum uncompressed size of a single entry, in bytes
    pub max_file_size: u64,

    /// Maximum sum of uncompressed entry sizes, in bytes
    pub max_total_size: u64,

    /// Maximum number of entries in the archive
    pub max_num_files: usize,

    /// Maximum length of an entry path, in characters
    pub max_file_name_length: usize,

    /// Number of concurrent extraction workers
    pub extraction_threads: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_file_size: 200 * 1024 * 1024,
            max_total_size: 500 * 1024 * 1024,
            max_num_files: 100,
            max_file_name_length: 80,
            extraction_threads: 4,
        }
    }
}

impl ExtractLimits {
    /// Reject limits with zero fields
    pub fn validate(&self) -> Result<(), ExtractError> {
        let zero = [
            ("max_file_size", self.max_file_size == 0),
            ("max_total_size", self.max_total_size == 0),
            ("max_num_files", self.max_num_files == 0),
            ("max_file_name_length", self.max_file_name_length == 0),
            ("extraction_threads", self.extraction_threads == 0),
        ];

        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(ExtractError::InvalidLimits(format!("{} must be positive", name))),
            None => Ok(()),
        }
    }

    pub fn check_num_files(&self, count: usize) -> Result<(), Limit> {
        if count > self.max_num_files {
            return Err(Limit::TooManyFiles {
                count,
                max: self.max_num_files,
            });
        }
        Ok(())
    }

    pub fn check_total_size(&self, total: u64) -> Result<(), Limit> {
        if total > self.max_total_size {
            return Err(Limit::ZipTooLarge {
                total,
                max: self.max_total_size,
            });
        }
        Ok(())
    }

    pub fn check_path(&self, path: &str) -> Result<(), Limit> {
        if path.chars().count() > self.max_file_name_length {
            return Err(Limit::PathTooLong {
                path: path.to_string(),
                max: self.max_file_name_length,
            });
        }
        Ok(())
    }

    pub fn check_file_size(&self, path: &str, size: u64) -> Result<(), Limit> {
        if size > self.max_file_size {
            return Err(Limit::FileTooLarge {
                path: path.to_string(),
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }
}
