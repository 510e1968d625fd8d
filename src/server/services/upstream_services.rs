use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use mockall::automock;
use reqwest::{
    StatusCode,
    header::{self, HeaderMap},
};
use tracing::{debug, error};

use crate::server::error::{AppResult, Error};

pub type DynUpstreamService = Arc<dyn UpstreamServiceTrait + Send + Sync>;

pub type BodyStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// what came back from upstream, body still unread
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// final url after redirects, playlists resolve against this
    pub url: String,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl UpstreamResponse {
    /// handy for building responses by hand
    pub fn from_bytes(
        status: StatusCode,
        url: impl Into<String>,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            url: url.into(),
            headers,
            body: futures::stream::once(async move { Ok(body) }).boxed(),
        }
    }

    pub fn header_str(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// buffers the whole body and decodes it as text, undoing gzip/zstd if upstream compressed it
    pub async fn text(self) -> AppResult<String> {
        let content_encoding = self
            .header_str(header::CONTENT_ENCODING)
            .map(|s| s.to_ascii_lowercase());

        let chunks: Vec<Bytes> = self.body.try_collect().await.map_err(|e| {
            error!("Failed to read response: {}", e);
            Error::InternalServerErrorWithContext(format!("Failed to read response: {}", e))
        })?;
        let bytes = chunks.concat();
        debug!("Read {} bytes", bytes.len());

        let decompressed: Vec<u8> = match content_encoding.as_deref() {
            Some("zstd") => {
                debug!("Decompressing zstd-encoded response");
                zstd::decode_all(&bytes[..]).map_err(|e| {
                    error!("Failed to decompress zstd: {}", e);
                    Error::InternalServerErrorWithContext(
                        "Failed to decompress response".to_string(),
                    )
                })?
            }
            Some("gzip") => {
                debug!("Decompressing gzip-encoded response");
                let mut decoder = GzDecoder::new(&bytes[..]);
                let mut decomp: Vec<u8> = Vec::new();
                decoder.read_to_end(&mut decomp).map_err(|e| {
                    error!("Failed to decompress gzip response: {}", e);
                    Error::InternalServerErrorWithContext(
                        "Failed to decompress response".to_string(),
                    )
                })?;
                decomp
            }
            _ => bytes,
        };

        String::from_utf8(decompressed).map_err(|e| {
            error!("Failed to parse response as UTF-8: {}", e);
            Error::InternalServerErrorWithContext("Invalid response encoding".to_string())
        })
    }
}

#[automock]
#[async_trait]
pub trait UpstreamServiceTrait {
    /// GET with exactly these headers, redirects followed
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> AppResult<UpstreamResponse>;
}

pub struct UpstreamService {
    http: reqwest::Client,
}

impl UpstreamService {
    /// `timeout` bounds connecting and each gap between reads, not the whole transfer
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build http client, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self { http }
    }
}

#[async_trait]
impl UpstreamServiceTrait for UpstreamService {
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> AppResult<UpstreamResponse> {
        debug!("Sending request to {}", url);

        let response = self
            .http
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| {
                error!("Request failed: {}", e);
                Error::Upstream(e)
            })?;

        debug!("Received response with status: {}", response.status());

        Ok(UpstreamResponse {
            status: response.status(),
            url: response.url().to_string(),
            headers: response.headers().clone(),
            body: response.bytes_stream().map_err(std::io::Error::other).boxed(),
        })
    }
}
