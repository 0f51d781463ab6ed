//! In-memory storage with failure injection

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{Storage, StorageError};
use crate::resource::ObjectHeaders;

struct StoredObject {
    data: Vec<u8>,
    headers: ObjectHeaders,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    planned_failures: HashSet<String>,
}

/// Objects kept in a map keyed by `bucket/key`
#[derive(Default)]
pub struct MemStorage {
    state: Mutex<State>,
    put_delay: Option<Duration>,
}

fn object_path(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, key)
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every put, so uploads overlap in tests
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    /// Make the next put of `key` fail
    pub async fn plan_for_failure(&self, bucket: &str, key: &str) {
        self.state.lock().await.planned_failures.insert(object_path(bucket, key));
    }

    /// Headers stored with an object
    pub async fn headers(&self, bucket: &str, key: &str) -> Option<ObjectHeaders> {
        let state = self.state.lock().await;
        state.objects.get(&object_path(bucket, key)).map(|o| o.headers.clone())
    }

    /// Number of objects across all buckets
    pub async fn object_count(&self) -> usize {
        self.state.lock().await.objects.len()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let state = self.state.lock().await;
        state
            .objects
            .get(&object_path(bucket, key))
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        headers: &ObjectHeaders,
    ) -> Result<(), StorageError> {
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }

        let path = object_path(bucket, key);
        let mut state = self.state.lock().await;
        if state.planned_failures.remove(&path) {
            return Err(StorageError::Injected(path));
        }

        state.objects.insert(
            path,
            StoredObject {
                data,
                headers: headers.clone(),
            },
        );
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        state
            .objects
            .remove(&object_path(bucket, key))
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let bucket_prefix = object_path(bucket, "");
        let state = self.state.lock().await;
        Ok(state
            .objects
            .keys()
            .filter_map(|path| path.strip_prefix(&bucket_prefix))
            .filter(|key| key.starts_with(prefix))
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let storage = MemStorage::new();
        let mut headers = ObjectHeaders::new();
        headers.insert("content-type".into(), "text/plain".into());

        storage.put("b", "dir/a.txt", b"hello".to_vec(), &headers).await.unwrap();
        assert_eq!(storage.get("b", "dir/a.txt").await.unwrap(), b"hello");
        assert_eq!(storage.headers("b", "dir/a.txt").await.unwrap(), headers);
        assert!(storage.get("other", "dir/a.txt").await.unwrap_err().is_not_found());

        storage.delete("b", "dir/a.txt").await.unwrap();
        assert_eq!(storage.object_count().await, 0);
        assert!(storage.delete("b", "dir/a.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_planned_failure_fires_once() {
        let storage = MemStorage::new();
        storage.plan_for_failure("b", "k").await;

        let err = storage.put("b", "k", vec![1], &ObjectHeaders::new()).await.unwrap_err();
        assert!(err.to_string().contains("intentional failure"));
        storage.put("b", "k", vec![1], &ObjectHeaders::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let storage = MemStorage::new();
        for key in ["out/1", "out/2", "src.zip"] {
            storage.put("b", key, vec![], &ObjectHeaders::new()).await.unwrap();
        }
        storage.put("c", "out/3", vec![], &ObjectHeaders::new()).await.unwrap();

        assert_eq!(storage.list("b", "out/").await.unwrap(), vec!["out/1", "out/2"]);
        assert_eq!(storage.list("b", "").await.unwrap().len(), 3);
    }
}
