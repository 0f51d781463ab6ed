//! Output object description and upload headers

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::analyzer::Metadata;

/// Access-control header set on every extracted object
pub const ACL_HEADER: &str = "x-goog-acl";

/// Extracted files must be readable without authentication
pub const ACL_PUBLIC_READ: &str = "public-read";

pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_ENCODING: &str = "content-encoding";

/// Headers sent along with an object on upload
pub type ObjectHeaders = BTreeMap<String, String>;

/// One uploaded object of an extraction job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSpec {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl ResourceSpec {
    /// Headers for storing this resource
    pub fn headers(&self) -> ObjectHeaders {
        let mut headers = ObjectHeaders::new();
        headers.insert(ACL_HEADER.to_string(), ACL_PUBLIC_READ.to_string());
        headers.insert(CONTENT_TYPE.to_string(), self.content_type.clone());
        if let Some(encoding) = &self.content_encoding {
            headers.insert(CONTENT_ENCODING.to_string(), encoding.clone());
        }
        headers
    }
}

impl fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content_encoding {
            Some(encoding) => write!(f, "{} ({}, {} encoding)", self.key, self.content_type, encoding),
            None => write!(f, "{} ({})", self.key, self.content_type),
        }
    }
}
