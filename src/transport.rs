//! Transport initiation: issuing the streaming POST and exposing the body as
//! a byte stream.

use crate::types::{StreamOptions, StreamRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;

/// A pinned, boxed stream of raw body chunks in arrival order.
///
/// Chunk boundaries are whatever the transport produced; they carry no
/// protocol meaning. Dropping the stream releases the underlying connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Opens the response body for a [`StreamRequest`].
///
/// Implementations must return [`Error::Cancelled`] when the request's token
/// is already cancelled, or fires before the response headers arrive.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Builds an HTTP client from the connect timeout in `options`.
    ///
    /// No whole-request timeout is set: a long answer is a valid answer. Use
    /// `idle_timeout` to bound silence between chunks instead.
    pub fn new(options: &StreamOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(options.connect_timeout))
            .build()
            .map_err(Error::Http)?;
        Ok(Self { http })
    }

    /// Wraps an existing client (shares its connection pool).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// The underlying HTTP client, shared with title generation.
    pub fn client(&self) -> &reqwest::Client {
        &self.http
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream> {
        let cancel = request.cancel_token();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let send = self
            .http
            .post(request.endpoint())
            .header("Authorization", format!("Bearer {}", request.api_key()))
            .header("Content-Type", "application/json")
            .json(&request.body())
            .send();

        // Dropping the send future aborts the connection attempt
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = send => result.map_err(Error::Http)?,
        };

        // Check for HTTP-level errors before handing out the body
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|e| {
                log::warn!("Failed to read error response body: {}", e);
                "Unknown error (failed to read response body)".to_string()
            });
            return Err(Error::api(format!("API error {}: {}", status, body)));
        }

        log::debug!(
            "Stream opened: {} (model {}, {} messages)",
            request.endpoint(),
            request.model(),
            request.messages().len()
        );

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::Http));
        Ok(Box::pin(stream))
    }
}
