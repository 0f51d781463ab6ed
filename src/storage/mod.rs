//! Object store abstraction
//!
//! The archiver only needs four operations from a bucket: fetch the source
//! archive, put extracted objects with their headers, delete objects on
//! rollback, and list a prefix. Three backends are provided:
//! - [`MemStorage`]: in-process map with failure injection, used by tests
//! - [`FsStorage`]: a local directory per bucket
//! - [`HttpStorage`]: GCS-style XML API over HTTP

mod fs;
mod http;
mod memory;

pub use fs::FsStorage;
pub use http::{HttpStorage, DEFAULT_REQUEST_TIMEOUT};
pub use memory::MemStorage;

use async_trait::async_trait;
use thiserror::Error;

use crate::resource::ObjectHeaders;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for {key}")]
    Status { status: u16, key: String },

    #[error("invalid object key {0:?}")]
    InvalidKey(String),

    #[error("intentional failure for {0}")]
    Injected(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    pub(crate) fn not_found(bucket: &str, key: &str) -> Self {
        StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

/// A bucketed blob store
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a whole object
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Write an object, replacing any existing one
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        headers: &ObjectHeaders,
    ) -> Result<(), StorageError>;

    /// Delete an object. Deleting a missing object is an error.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    /// Keys under a prefix, sorted
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError>;
}
