//! Per-job state shared by extraction workers

use futures::{future, stream, StreamExt};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Span};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::analyzer::{AnalyzeError, Analyzer};
use crate::error::{ExtractError, Limit, Result};
use crate::limits::ExtractLimits;
use crate::paths::{self, EntryPath};
use crate::policy::{Classified, ContentPolicy};
use crate::resource::ResourceSpec;
use crate::storage::Storage;

/// Archive bytes are shared, every worker clones the reader
pub(crate) type ArchiveReader = ZipArchive<Cursor<Arc<[u8]>>>;

/// An accepted entry waiting for a worker
#[derive(Debug, Clone)]
pub(crate) struct PlannedEntry {
    pub index: usize,
    pub key: String,
    pub declared_size: u64,
}

/// Entry bytes plus the resource they will be stored as
struct Prepared {
    spec: ResourceSpec,
    data: Vec<u8>,
}

pub(crate) struct JobContext {
    pub archive: ArchiveReader,
    pub archive_path: String,
    pub storage: Arc<dyn Storage>,
    pub bucket: String,
    pub dest_prefix: String,
    pub analyzer: Arc<dyn Analyzer>,
    pub policy: ContentPolicy,
    pub limits: ExtractLimits,

    /// Set by the first failing worker
    pub cancelled: AtomicBool,
    /// Decompressed bytes across all entries
    pub bytes_read: AtomicU64,
    /// Keys written so far, deleted on rollback
    pub uploaded: Mutex<Vec<String>>,
    /// Final key -> entry that produced it
    pub claimed: Mutex<HashMap<String, String>>,
}

/// Upper bound on the buffer reserved from a declared entry size
const INITIAL_CAPACITY: u64 = 64 * 1024;

/// Decompress one entry, stopping as soon as it passes the per-file limit
pub(crate) fn read_entry(
    reader: impl Read,
    archive_path: &str,
    entry: &PlannedEntry,
    limits: &ExtractLimits,
) -> Result<Vec<u8>> {
    // declared sizes are untrusted, grow past this from real bytes only
    let capacity = entry.declared_size.min(limits.max_file_size).min(INITIAL_CAPACITY) as usize;
    let mut data = Vec::with_capacity(capacity);

    reader
        .take(limits.max_file_size.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| ExtractError::InvalidArchive {
            key: archive_path.to_string(),
            source: ZipError::Io(e),
        })?;

    limits.check_file_size(&entry.key, data.len() as u64)?;
    Ok(data)
}

/// Add an entry's real size to the running total
pub(crate) fn charge_total(counter: &AtomicU64, len: u64, limits: &ExtractLimits) -> std::result::Result<(), Limit> {
    let total = counter.fetch_add(len, Ordering::SeqCst).saturating_add(len);
    limits.check_total_size(total)
}

impl JobContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark the job failed. Returns true for the first caller only.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    /// Decompress, analyze and classify an entry. `None` if the analyzer
    /// skipped it. Runs on a blocking thread.
    fn prepare(&self, entry: PlannedEntry) -> Result<Option<Prepared>> {
        let mut archive = self.archive.clone();
        let file = archive
            .by_index(entry.index)
            .map_err(|source| ExtractError::InvalidArchive {
                key: self.archive_path.clone(),
                source,
            })?;

        let data = read_entry(file, &self.archive_path, &entry, &self.limits)?;
        charge_total(&self.bytes_read, data.len() as u64, &self.limits)?;

        let analyzed = match self.analyzer.analyze(&mut data.as_slice(), &entry.key) {
            Ok(res) => res,
            Err(e) if e.is_skipped() => {
                debug!("Skipping {}: {}", entry.key, e);
                return Ok(None);
            }
            Err(source) => {
                return Err(ExtractError::Analysis {
                    key: entry.key,
                    source,
                })
            }
        };

        let mut classified = Classified {
            key: analyzed.key,
            content_type: analyzed.content_type,
            content_encoding: analyzed.content_encoding,
        };
        self.policy.apply(&mut classified);

        // the final key must still be a clean relative path
        match paths::sanitize_entry_name(&classified.key, &[]) {
            EntryPath::Accept(ref clean) if *clean == classified.key => {}
            _ => {
                return Err(ExtractError::Analysis {
                    key: entry.key,
                    source: AnalyzeError::UnsafeKey(classified.key),
                })
            }
        }
        self.limits.check_path(&classified.key)?;

        let spec = ResourceSpec {
            key: paths::join_key(&self.dest_prefix, &classified.key),
            size: data.len() as u64,
            content_type: classified.content_type,
            content_encoding: classified.content_encoding,
            metadata: analyzed.metadata,
        };
        Ok(Some(Prepared { spec, data }))
    }

    /// Reserve `key` for `entry`. Returns the entry already holding it.
    pub async fn claim(&self, key: &str, entry: &str) -> Option<String> {
        match self.claimed.lock().await.entry(key.to_string()) {
            Entry::Occupied(held) => Some(held.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(entry.to_string());
                None
            }
        }
    }

    /// Delete every uploaded key. Failures are logged, never returned.
    pub async fn rollback(&self) {
        let keys = std::mem::take(&mut *self.uploaded.lock().await);
        if keys.is_empty() {
            return;
        }

        warn!("Rolling back {} uploaded files", keys.len());
        let failures: Vec<_> = stream::iter(keys)
            .map(|key| async move {
                match self.storage.delete(&self.bucket, &key).await {
                    Ok(()) => None,
                    Err(e) => Some((key, e)),
                }
            })
            .buffer_unordered(self.limits.extraction_threads)
            .filter_map(future::ready)
            .collect()
            .await;

        for (key, err) in &failures {
            warn!("Failed to delete {} during rollback: {}", key, err);
        }
        if failures.is_empty() {
            info!("Rollback complete");
        }
    }
}

/// Run one entry through decompression, analysis and upload
pub(crate) async fn process_entry(ctx: Arc<JobContext>, entry: PlannedEntry) -> Result<Option<ResourceSpec>> {
    if ctx.is_cancelled() {
        debug!("Not starting {}, job cancelled", entry.key);
        return Ok(None);
    }

    let key = entry.key.clone();
    let span = Span::current();
    let worker = Arc::clone(&ctx);
    let prepared = tokio::task::spawn_blocking(move || span.in_scope(|| worker.prepare(entry)))
        .await
        .map_err(|e| ExtractError::Worker(format!("{}: {}", key, e)))??;

    let Some(Prepared { spec, data }) = prepared else {
        return Ok(None);
    };

    if ctx.is_cancelled() {
        debug!("Not uploading {}, job cancelled", spec.key);
        return Ok(None);
    }

    // an analyzer rename or rewrite rule can land on another entry's key
    if let Some(first) = ctx.claim(&spec.key, &key).await {
        return Err(ExtractError::DuplicateKey {
            key: spec.key,
            first,
            second: key,
        });
    }

    ctx.storage
        .put(&ctx.bucket, &spec.key, data, &spec.headers())
        .await
        .map_err(|source| ExtractError::Upload {
            key: spec.key.clone(),
            source,
        })?;
    ctx.uploaded.lock().await.push(spec.key.clone());

    debug!("Uploaded {}", spec);
    Ok(Some(spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(declared_size: u64) -> PlannedEntry {
        PlannedEntry {
            index: 0,
            key: "x".into(),
            declared_size,
        }
    }

    #[test]
    fn test_read_entry_enforces_actual_size() {
        let limits = ExtractLimits {
            max_file_size: 499,
            ..ExtractLimits::default()
        };
        let data = b"oh no".repeat(100);

        // declared size lies, the reader does not
        let err = read_entry(&data[..], "a.zip", &entry(5), &limits).unwrap_err();
        assert!(err.to_string().contains("file that is too large"));

        let data = read_entry(&data[..499], "a.zip", &entry(5), &limits).unwrap();
        assert_eq!(data.len(), 499);
    }

    #[test]
    fn test_read_entry_ignores_declared_capacity() {
        let limits = ExtractLimits::default();
        let data = read_entry(&b"tiny"[..], "a.zip", &entry(limits.max_file_size), &limits).unwrap();
        assert_eq!(data, b"tiny");
        assert!(data.capacity() as u64 <= INITIAL_CAPACITY);
    }

    #[test]
    fn test_charge_total() {
        let limits = ExtractLimits {
            max_total_size: 10,
            ..ExtractLimits::default()
        };
        let counter = AtomicU64::new(0);
        assert!(charge_total(&counter, 5, &limits).is_ok());
        assert!(charge_total(&counter, 5, &limits).is_ok());
        assert!(matches!(
            charge_total(&counter, 1, &limits),
            Err(Limit::ZipTooLarge { total: 11, max: 10 })
        ));
    }
}
