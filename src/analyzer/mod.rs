//! Per-entry content analysis
//!
//! An analyzer reads an entry once and decides its content type, encoding
//! and (optionally) a new key. Analyzers may also decline a file by
//! returning [`AnalyzeError::Skipped`]; the entry is then left out of the
//! extraction without failing the job.

mod game;
mod music;

pub use game::GameAnalyzer;
pub use music::{MusicAnalyzer, TrackInfo};

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of analyzing one entry
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeResult {
    /// Output key, relative to the destination prefix
    pub key: String,
    pub metadata: Option<Metadata>,
    pub content_type: String,
    pub content_encoding: Option<String>,
}

impl AnalyzeResult {
    pub fn new(key: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            metadata: None,
            content_type: content_type.into(),
            content_encoding: None,
        }
    }
}

/// Analyzer-specific data attached to an uploaded resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metadata {
    Track(TrackInfo),
}

#[derive(Error, Debug)]
pub enum AnalyzeError {
    /// Not an error: the analyzer chose to ignore the file
    #[error("skipped file: {0}")]
    Skipped(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The analyzed key is absolute, empty or climbs out of the prefix
    #[error("analysis produced an unsafe key {0:?}")]
    UnsafeKey(String),
}

impl AnalyzeError {
    pub fn is_skipped(&self) -> bool {
        matches!(self, AnalyzeError::Skipped(_))
    }
}

/// Classifies archive entries.
///
/// Implementations run on blocking threads and may be shared between
/// concurrent workers.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, reader: &mut dyn Read, key: &str) -> Result<AnalyzeResult, AnalyzeError>;
}

/// Analyzer selection for configs and the CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// HTML5 game uploads
    #[default]
    Game,
    /// Music albums
    Music,
}

impl AnalyzerKind {
    pub fn build(self) -> Arc<dyn Analyzer> {
        match self {
            AnalyzerKind::Game => Arc::new(GameAnalyzer),
            AnalyzerKind::Music => Arc::new(MusicAnalyzer),
        }
    }
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzerKind::Game => write!(f, "game"),
            AnalyzerKind::Music => write!(f, "music"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_is_not_io() {
        assert!(AnalyzeError::Skipped("not audio".into()).is_skipped());
        let io = AnalyzeError::from(std::io::Error::other("boom"));
        assert!(!io.is_skipped());
    }

    #[test]
    fn test_kind_from_json() {
        let kind: AnalyzerKind = serde_json::from_str("\"music\"").unwrap();
        assert_eq!(kind, AnalyzerKind::Music);
        assert_eq!(AnalyzerKind::default(), AnalyzerKind::Game);
        assert_eq!(kind.to_string(), "music");
    }

    #[test]
    fn test_kind_builds_analyzer() {
        let analyzer = AnalyzerKind::Game.build();
        let res = analyzer.analyze(&mut &b"hello"[..], "file.txt").unwrap();
        assert_eq!(res.content_type, "text/plain; charset=utf-8");
    }
}
