//! Zip extraction into an object store
//!
//! One call to [`Archiver::extract_zip`] is one job:
//! 1. Fetch the archive from storage and read its central directory
//! 2. Check entry count and declared total size
//! 3. Sanitize every entry name, checking path length and declared size of
//!    the entries that survive
//! 4. Decompress, analyze and upload entries on `extraction_threads` workers
//! 5. On the first failure, stop starting new work, wait for in-flight
//!    uploads, then delete everything the job wrote
//!
//! Limits are checked twice: up front against what the central directory
//! claims, then while streaming against the bytes actually decompressed.

mod job;

use futures::{stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use zip::ZipArchive;

use crate::analyzer::{Analyzer, GameAnalyzer};
use crate::error::{ExtractError, Result};
use crate::limits::ExtractLimits;
use crate::paths::{self, EntryPath, DEFAULT_IGNORE_PREFIXES};
use crate::policy::ContentPolicy;
use crate::resource::ResourceSpec;
use crate::storage::Storage;

use job::{process_entry, ArchiveReader, JobContext, PlannedEntry};

/// Central directory information for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZipEntryInfo {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    pub is_dir: bool,
}

/// Extracts zip archives stored in a bucket
pub struct Archiver {
    storage: Arc<dyn Storage>,
    bucket: String,
    analyzer: Arc<dyn Analyzer>,
    policy: ContentPolicy,
    ignore_prefixes: Vec<String>,
}

impl Archiver {
    /// Archiver with the game analyzer, no policy rules and the default
    /// ignore prefixes
    pub fn new(storage: Arc<dyn Storage>, bucket: impl Into<String>) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
            analyzer: Arc::new(GameAnalyzer),
            policy: ContentPolicy::default(),
            ignore_prefixes: DEFAULT_IGNORE_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_policy(mut self, policy: ContentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_ignore_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.ignore_prefixes = prefixes;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Extract `archive_path` into `dest_prefix`. Returns the uploaded
    /// resources in completion order. On error nothing from this job is
    /// left in storage (rollback failures are logged).
    pub async fn extract_zip(
        &self,
        archive_path: &str,
        dest_prefix: &str,
        limits: &ExtractLimits,
    ) -> Result<Vec<ResourceSpec>> {
        let job_id = Uuid::new_v4();
        let span = info_span!("extract", job = %job_id, archive = %archive_path);
        self.run_extract(archive_path, dest_prefix, limits)
            .instrument(span)
            .await
    }

    /// Entries of an archive as recorded in its central directory
    pub async fn list_zip(&self, archive_path: &str) -> Result<Vec<ZipEntryInfo>> {
        let mut archive = self.fetch(archive_path).await?;

        (0..archive.len())
            .map(|index| {
                let file = archive
                    .by_index_raw(index)
                    .map_err(|source| ExtractError::InvalidArchive {
                        key: archive_path.to_string(),
                        source,
                    })?;
                Ok(ZipEntryInfo {
                    name: file.name().to_string(),
                    size: file.size(),
                    compressed_size: file.compressed_size(),
                    is_dir: file.is_dir(),
                })
            })
            .collect()
    }

    async fn fetch(&self, archive_path: &str) -> Result<ArchiveReader> {
        let data = self
            .storage
            .get(&self.bucket, archive_path)
            .await
            .map_err(|source| {
                if source.is_not_found() {
                    ExtractError::NotFound(archive_path.to_string())
                } else {
                    ExtractError::Fetch {
                        key: archive_path.to_string(),
                        source,
                    }
                }
            })?;
        debug!("Fetched {} ({} bytes)", archive_path, data.len());

        let data: Arc<[u8]> = data.into();
        ZipArchive::new(Cursor::new(data)).map_err(|source| ExtractError::InvalidArchive {
            key: archive_path.to_string(),
            source,
        })
    }

    /// Validate the central directory and pick the entries to extract
    fn plan(
        &self,
        archive: &mut ArchiveReader,
        archive_path: &str,
        dest_prefix: &str,
        limits: &ExtractLimits,
    ) -> Result<Vec<PlannedEntry>> {
        limits.check_num_files(archive.len())?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut total = 0u64;
        for index in 0..archive.len() {
            let file = archive
                .by_index_raw(index)
                .map_err(|source| ExtractError::InvalidArchive {
                    key: archive_path.to_string(),
                    source,
                })?;
            total = total.saturating_add(file.size());
            entries.push((index, file.name().to_string(), file.size()));
        }
        limits.check_total_size(total)?;

        let mut planned = Vec::with_capacity(entries.len());
        let mut seen: HashMap<String, String> = HashMap::new();
        for (index, name, size) in entries {
            match paths::sanitize_entry_name(&name, &self.ignore_prefixes) {
                EntryPath::Ignore(reason) => debug!("Ignoring {:?} ({:?})", name, reason),
                EntryPath::Accept(key) => {
                    limits.check_path(&key)?;
                    limits.check_file_size(&key, size)?;
                    if let Some(first) = seen.insert(key.clone(), name.clone()) {
                        return Err(ExtractError::DuplicateKey {
                            key: paths::join_key(dest_prefix, &key),
                            first,
                            second: name,
                        });
                    }
                    planned.push(PlannedEntry {
                        index,
                        key,
                        declared_size: size,
                    });
                }
            }
        }

        Ok(planned)
    }

    async fn run_extract(
        &self,
        archive_path: &str,
        dest_prefix: &str,
        limits: &ExtractLimits,
    ) -> Result<Vec<ResourceSpec>> {
        limits.validate()?;

        let mut archive = self.fetch(archive_path).await?;
        let planned = self.plan(&mut archive, archive_path, dest_prefix, limits)?;
        info!(
            "Extracting {} of {} entries into {}",
            planned.len(),
            archive.len(),
            dest_prefix
        );

        let ctx = Arc::new(JobContext {
            archive,
            archive_path: archive_path.to_string(),
            storage: Arc::clone(&self.storage),
            bucket: self.bucket.clone(),
            dest_prefix: dest_prefix.to_string(),
            analyzer: Arc::clone(&self.analyzer),
            policy: self.policy.clone(),
            limits: limits.clone(),
            cancelled: AtomicBool::new(false),
            bytes_read: AtomicU64::new(0),
            uploaded: Mutex::new(Vec::new()),
            claimed: Mutex::new(HashMap::new()),
        });

        // Drain the whole pool so in-flight uploads are tracked before rollback
        let results: Vec<Result<Option<ResourceSpec>>> = stream::iter(planned)
            .map(|entry| {
                let ctx = Arc::clone(&ctx);
                async move {
                    let result = process_entry(Arc::clone(&ctx), entry).await;
                    if let Err(e) = &result {
                        if ctx.cancel() {
                            warn!("Extraction failed ({}), cancelling: {}", e.category(), e);
                        }
                    }
                    result
                }
            })
            .buffer_unordered(limits.extraction_threads)
            .collect()
            .await;

        let mut resources = Vec::with_capacity(results.len());
        let mut failure = None;
        for result in results {
            match result {
                Ok(Some(spec)) => resources.push(spec),
                Ok(None) => {}
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        if let Some(err) = failure {
            ctx.rollback().await;
            return Err(err);
        }

        info!("Extracted {} files", resources.len());
        Ok(resources)
    }
}
