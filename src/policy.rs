//! Content-encoding and key rewrite rules.
//!
//! Both tables are ordered and keyed by file extension. They run after the
//! analyzer, so they can override whatever it decided. Defaults are empty;
//! deployments fill them from the config file. A typical table for old Unity
//! WebGL exports:
//!
//! ```json
//! {
//!   "encoding_rules": [{ "extension": ".unityweb", "encoding": "gzip" }],
//!   "rewrite_rules": [{ "old_extension": ".jsgz", "new_extension": ".js" }]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::paths;

/// Opaque binary type used when the encoding is the only signal clients need
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Forces a `Content-Encoding` for an extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingRule {
    pub extension: String,
    pub encoding: String,
}

/// Rewrites an extension in the output key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub old_extension: String,
    pub new_extension: String,
}

/// Key, type and encoding of an entry while rules are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub key: String,
    pub content_type: String,
    pub content_encoding: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPolicy {
    #[serde(default)]
    pub encoding_rules: Vec<EncodingRule>,
    #[serde(default)]
    pub rewrite_rules: Vec<RewriteRule>,
}

impl ContentPolicy {
    pub fn new(encoding_rules: Vec<EncodingRule>, rewrite_rules: Vec<RewriteRule>) -> Self {
        Self {
            encoding_rules,
            rewrite_rules,
        }
    }

    /// Apply encoding rules, then rewrite rules
    pub fn apply(&self, classified: &mut Classified) {
        self.apply_encoding_rules(classified);
        self.apply_rewrite_rules(classified);
    }

    /// A rule forcing `gzip` also forces the opaque binary type. Encodings
    /// chosen by the analyzer keep the analyzer's type.
    pub fn apply_encoding_rules(&self, classified: &mut Classified) {
        let extension = paths::extension(&classified.key);

        let Some(rule) = self.encoding_rules.iter().find(|r| r.extension == extension) else {
            return;
        };

        classified.content_encoding = Some(rule.encoding.clone());
        if rule.encoding == "gzip" {
            classified.content_type = OCTET_STREAM.to_string();
        }
    }

    /// At most one rule fires
    pub fn apply_rewrite_rules(&self, classified: &mut Classified) {
        let extension = paths::extension(&classified.key);

        if let Some(rule) = self.rewrite_rules.iter().find(|r| r.old_extension == extension) {
            classified.key =
                paths::replace_extension(&classified.key, &rule.old_extension, &rule.new_extension);
        }
    }
}
