//! zipserver - extracts untrusted zip uploads into an object store
//!
//! Entries are sanitized, checked against per-job limits, classified by a
//! pluggable [`analyzer::Analyzer`] and uploaded with their content headers.
//! A job that fails part way deletes everything it already wrote.

pub mod analyzer;
pub mod archiver;
pub mod config;
pub mod error;
pub mod limits;
pub mod mime;
pub mod paths;
pub mod policy;
pub mod resource;
pub mod storage;
pub mod tags;

pub use archiver::{Archiver, ZipEntryInfo};
pub use error::{ExtractError, Limit};
pub use limits::ExtractLimits;
pub use resource::ResourceSpec;
