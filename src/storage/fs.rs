//! Local directory storage
//!
//! Layout under the root:
//! - `<bucket>/<key>`: object data
//! - `.meta/<bucket>/<key>.json`: object headers

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::{Storage, StorageError};
use crate::resource::ObjectHeaders;

const META_DIR: &str = ".meta";

pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reject keys that would leave the bucket directory
    fn relative(bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(bucket).join(key);
        let valid = !bucket.is_empty()
            && bucket != META_DIR
            && !key.is_empty()
            && path.components().all(|c| matches!(c, Component::Normal(_)));
        if valid {
            Ok(path)
        } else {
            Err(StorageError::InvalidKey(format!("{}/{}", bucket, key)))
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(Self::relative(bucket, key)?))
    }

    fn meta_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.join(META_DIR).join(Self::relative(bucket, key)?);
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".json");
        path.set_file_name(name);
        Ok(path)
    }

    /// Headers stored with an object
    pub async fn headers(&self, bucket: &str, key: &str) -> Result<ObjectHeaders, StorageError> {
        let path = self.meta_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| StorageError::Io(std::io::Error::new(ErrorKind::InvalidData, e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(bucket, key)),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_file(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await?;
    Ok(())
}

fn collect_keys(dir: &Path, base: &Path, keys: &mut Vec<String>) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_keys(&path, base, keys)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            keys.push(crate::paths::to_linux_path(&rel.to_string_lossy()));
        }
    }
    Ok(())
}

#[async_trait]
impl Storage for FsStorage {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(bucket, key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        headers: &ObjectHeaders,
    ) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        let meta = self.meta_path(bucket, key)?;
        debug!("Writing {} ({} bytes)", path.display(), data.len());

        write_file(&path, &data).await?;
        let headers_json = serde_json::to_vec_pretty(headers)
            .map_err(|e| StorageError::Io(std::io::Error::new(ErrorKind::InvalidData, e)))?;
        write_file(&meta, &headers_json).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::not_found(bucket, key)),
            Err(e) => return Err(e.into()),
        }

        let meta = self.meta_path(bucket, key)?;
        if let Err(e) = tokio::fs::remove_file(&meta).await {
            if e.kind() != ErrorKind::NotFound {
                return Err(e.into());
            }
        }
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        if bucket.is_empty() || bucket == META_DIR || bucket.contains(['/', '\\']) {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }

        let base = self.root.join(bucket);
        let prefix = prefix.to_string();
        let mut keys = tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            collect_keys(&base, &base, &mut keys).map(|_| keys)
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        keys.retain(|k| k.starts_with(&prefix));
        keys.sort();
        Ok(keys)
    }
}
