//! Rules for HTML5 game uploads

use std::io::Read;

use super::{AnalyzeError, AnalyzeResult, Analyzer};
use crate::mime;
use crate::paths;
use crate::policy::OCTET_STREAM;

/// Suffixes used by gzip-compressed exports from Unity 5.5 and below
const UNITY_REPLACEMENTS: &[(&str, &str)] = &[
    (".jsgz", ".js"),
    (".datagz", ".data"),
    (".memgz", ".mem"),
    (".unity3dgz", ".unity3d"),
];

/// Classifies HTML5 game files.
///
/// gzip streams get `Content-Encoding: gzip` and, for legacy Unity suffixes,
/// the key loses its `gz`. A trailing `.br` means brotli: it cannot be
/// detected from content, so the extension is trusted. Never skips.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameAnalyzer;

impl Analyzer for GameAnalyzer {
    fn analyze(&self, reader: &mut dyn Read, key: &str) -> Result<AnalyzeResult, AnalyzeError> {
        let mut head = Vec::with_capacity(mime::SNIFF_LEN);
        (&mut *reader).take(mime::SNIFF_LEN as u64).read_to_end(&mut head)?;

        let extension = paths::extension(key);
        let sniffed = mime::detect_content_type(&head);
        let mut content_type = mime::type_by_extension(extension);
        let mut res = AnalyzeResult::new(key, "");

        if mime::is_gzip(&head) {
            res.content_encoding = Some("gzip".to_string());

            if extension == ".gz" {
                // a real extension may be hidden beneath
                let inner = paths::extension(key.strip_suffix(".gz").unwrap_or(key));
                if let Some(real) = mime::type_by_extension(inner) {
                    content_type = Some(real);
                }
            } else if let Some((old, new)) = UNITY_REPLACEMENTS.iter().find(|(old, _)| *old == extension) {
                res.key = paths::replace_extension(key, old, new);
            }
        } else if extension == ".br" {
            res.content_encoding = Some("br".to_string());
            let inner = paths::extension(key.strip_suffix(".br").unwrap_or(key));
            if let Some(real) = mime::type_by_extension(inner) {
                content_type = Some(real);
            }
        } else if content_type.is_none() {
            // wrong or missing extension, trust the content
            content_type = Some(sniffed);
        }

        res.content_type = content_type.unwrap_or(OCTET_STREAM).to_string();
        Ok(res)
    }
}
