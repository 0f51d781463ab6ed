//! Object storage over HTTP, GCS XML API style
//!
//! Objects live at `{endpoint}/{bucket}/{key}`. Headers passed to `put` are
//! sent as request headers, so `x-goog-acl` and `content-encoding` land on
//! the stored object.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::debug;

use super::{Storage, StorageError};
use crate::resource::ObjectHeaders;

/// Connection timeout: time to establish TCP connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default overall timeout for a single request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub struct HttpStorage {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpStorage {
    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint).map_err(|_| StorageError::InvalidKey(endpoint.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(StorageError::InvalidKey(endpoint.to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("zipserver/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, endpoint, token })
    }

    /// `{endpoint}/{bucket}/{key}` with each segment percent-encoded
    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidKey(key.to_string()))?
            .pop_if_empty()
            .push(bucket)
            .extend(key.split('/'));
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn check_status(status: StatusCode, bucket: &str, key: &str) -> Result<(), StorageError> {
    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::not_found(bucket, key));
    }
    if !status.is_success() {
        return Err(StorageError::Status {
            status: status.as_u16(),
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Page of a bucket listing: keys plus the marker of the next page
fn parse_listing(xml: &str) -> (Vec<String>, Option<String>) {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut keys = Vec::new();
    let mut truncated = false;
    let mut next_marker = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"Key" => {
                    if let Ok(text) = reader.read_text(e.name()) {
                        keys.push(text.to_string());
                    }
                }
                b"IsTruncated" => {
                    truncated = reader.read_text(e.name()).map(|t| t == "true").unwrap_or(false);
                }
                b"NextMarker" => {
                    next_marker = reader.read_text(e.name()).ok().map(|t| t.to_string());
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    let next = if truncated {
        next_marker.or_else(|| keys.last().cloned())
    } else {
        None
    };
    (keys, next)
}

#[async_trait]
impl Storage for HttpStorage {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.object_url(bucket, key)?;
        debug!("GET {}", url);

        let response = self.request(reqwest::Method::GET, url).send().await?;
        check_status(response.status(), bucket, key)?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        headers: &ObjectHeaders,
    ) -> Result<(), StorageError> {
        let url = self.object_url(bucket, key)?;
        debug!("PUT {} ({} bytes)", url, data.len());

        let mut request = self.request(reqwest::Method::PUT, url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.body(data).send().await?;
        check_status(response.status(), bucket, key)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let url = self.object_url(bucket, key)?;
        debug!("DELETE {}", url);

        let response = self.request(reqwest::Method::DELETE, url).send().await?;
        check_status(response.status(), bucket, key)
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = self.endpoint.clone();
            url.path_segments_mut()
                .map_err(|_| StorageError::InvalidKey(bucket.to_string()))?
                .pop_if_empty()
                .push(bucket);
            url.query_pairs_mut().append_pair("prefix", prefix);
            if let Some(marker) = &marker {
                url.query_pairs_mut().append_pair("marker", marker);
            }

            let response = self.request(reqwest::Method::GET, url).send().await?;
            check_status(response.status(), bucket, prefix)?;
            let body = response.text().await?;

            let (page, next) = parse_listing(&body);
            keys.extend(page);
            match next {
                Some(next) if marker.as_deref() != Some(next.as_str()) => marker = Some(next),
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(endpoint: &str) -> HttpStorage {
        HttpStorage::new(endpoint, None, DEFAULT_REQUEST_TIMEOUT).unwrap()
    }

    #[test]
    fn test_object_url_encodes_segments() {
        let url = storage("https://storage.example.com")
            .object_url("bucket", "games/1/my game.html")
            .unwrap();
        assert_eq!(url.as_str(), "https://storage.example.com/bucket/games/1/my%20game.html");

        let url = storage("http://localhost:4443/storage/").object_url("b", "k").unwrap();
        assert_eq!(url.as_str(), "http://localhost:4443/storage/b/k");
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(HttpStorage::new("not a url", None, DEFAULT_REQUEST_TIMEOUT).is_err());
        assert!(HttpStorage::new("mailto:someone@example.com", None, DEFAULT_REQUEST_TIMEOUT).is_err());
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(StatusCode::OK, "b", "k").is_ok());
        assert!(check_status(StatusCode::NOT_FOUND, "b", "k").unwrap_err().is_not_found());
        assert!(matches!(
            check_status(StatusCode::FORBIDDEN, "b", "k"),
            Err(StorageError::Status { status: 403, .. })
        ));
    }

    #[test]
    fn test_parse_listing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://doc.s3.amazonaws.com/2006-03-01">
  <Name>bucket</Name>
  <Prefix>out/</Prefix>
  <IsTruncated>true</IsTruncated>
  <NextMarker>out/2</NextMarker>
  <Contents><Key>out/1</Key><Size>5</Size></Contents>
  <Contents><Key>out/2</Key><Size>5</Size></Contents>
</ListBucketResult>"#;
        let (keys, next) = parse_listing(xml);
        assert_eq!(keys, vec!["out/1", "out/2"]);
        assert_eq!(next.as_deref(), Some("out/2"));

        let (keys, next) = parse_listing("<ListBucketResult><IsTruncated>false</IsTruncated></ListBucketResult>");
        assert!(keys.is_empty());
        assert!(next.is_none());
    }
}
