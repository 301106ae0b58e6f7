//! Byte-range reads over HTTP

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::DataError;

/// Half-open byte range `[start, end)`; an open end reads to the end of the
/// resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Range `[start, end)`; rejects empty ranges
    pub fn new(start: u64, end: u64) -> Result<Self, DataError> {
        if end <= start {
            return Err(DataError::InvalidRange {
                start,
                end: Some(end),
            });
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    /// Everything from `start` on
    pub fn open_ended(start: u64) -> Self {
        Self { start, end: None }
    }

    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end - self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Value of the HTTP `Range` header. The header's end is inclusive.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end - 1),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}..{}", self.start, end),
            None => write!(f, "{}..", self.start),
        }
    }
}

/// Random access to a remote resource
#[async_trait]
pub trait RangeFetch: Send + Sync {
    /// Total size of the resource in bytes
    async fn byte_length(&self) -> Result<u64, DataError>;

    /// Read one byte range
    async fn fetch(&self, range: ByteRange) -> Result<Bytes, DataError>;

    /// Where the bytes come from, for logs and messages
    fn location(&self) -> &str;
}

/// [`RangeFetch`] over HTTP: `HEAD` for the size, ranged `GET` for reads
#[derive(Debug)]
pub struct HttpRangeReader {
    client: Client,
    url: String,
    length: OnceCell<u64>,
}

impl HttpRangeReader {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            length: OnceCell::new(),
        }
    }

    /// Build the shared client from configuration
    pub fn client(config: &HttpConfig) -> Result<Client, DataError> {
        Ok(Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request_length(&self) -> Result<u64, DataError> {
        let response = self.client.head(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(DataError::HttpStatus {
                status: response.status().as_u16(),
                url: self.url.clone(),
            });
        }

        // The body of a HEAD response is empty, so read the header itself
        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or_else(|| DataError::MissingContentLength(self.url.clone()))?;

        debug!(url = %self.url, length, "read content length");
        Ok(length)
    }
}

#[async_trait]
impl RangeFetch for HttpRangeReader {
    async fn byte_length(&self) -> Result<u64, DataError> {
        self.length
            .get_or_try_init(|| self.request_length())
            .await
            .copied()
    }

    async fn fetch(&self, range: ByteRange) -> Result<Bytes, DataError> {
        if range.is_empty() {
            return Err(DataError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }

        let response = self
            .client
            .get(&self.url)
            .header(RANGE, range.header_value())
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::PARTIAL_CONTENT => {
                let body = response.bytes().await?;
                check_partial_body(&self.url, body, range)
            }
            StatusCode::OK => {
                // The server ignored the range and sent the whole resource
                warn!(url = %self.url, %range, "server ignored range request");
                let body = response.bytes().await?;
                slice_full_body(body, range)
            }
            _ => Err(DataError::HttpStatus {
                status: status.as_u16(),
                url: self.url.clone(),
            }),
        }
    }

    fn location(&self) -> &str {
        &self.url
    }
}

/// A 206 body must cover the whole requested range
fn check_partial_body(url: &str, body: Bytes, range: ByteRange) -> Result<Bytes, DataError> {
    match range.len() {
        Some(expected) if body.len() as u64 != expected => Err(DataError::ShortBody {
            url: url.to_owned(),
            range: range.to_string(),
            expected,
            actual: body.len() as u64,
        }),
        _ => Ok(body),
    }
}

fn slice_full_body(body: Bytes, range: ByteRange) -> Result<Bytes, DataError> {
    let len = body.len() as u64;
    let end = range.end.unwrap_or(len).min(len);
    if range.start >= end {
        return Err(DataError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }
    Ok(body.slice(range.start as usize..end as usize))
}
