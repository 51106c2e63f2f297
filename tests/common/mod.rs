//! Shared test transports.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chat_stream::{ByteStream, ChatMessage, Error, Result, StreamRequest, Transport};
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

/// Wraps a byte stream and counts how often it is dropped.
pub struct Tracked<S> {
    inner: S,
    releases: Arc<AtomicUsize>,
}

impl<S> Stream for Tracked<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for Tracked<S> {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport replaying a fixed list of chunks (or errors).
pub struct ScriptedTransport {
    chunks: Mutex<Option<Vec<Result<Bytes>>>>,
    pub releases: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(chunks: Vec<Result<Bytes>>) -> Self {
        Self {
            chunks: Mutex::new(Some(chunks)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_text_chunks<I, T>(chunks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Self::new(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_ref())))
                .collect(),
        )
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, _request: &StreamRequest) -> Result<ByteStream> {
        let chunks = self
            .chunks
            .lock()
            .unwrap()
            .take()
            .expect("transport opened twice");
        Ok(Box::pin(Tracked {
            inner: futures::stream::iter(chunks),
            releases: self.releases.clone(),
        }))
    }
}

/// Transport whose chunks are pushed by the test while the run is live.
pub struct ChannelTransport {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<Bytes>>>>,
    pub releases: Arc<AtomicUsize>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<Bytes>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            rx: Mutex::new(Some(rx)),
            releases: Arc::new(AtomicUsize::new(0)),
        };
        (transport, tx)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn open(&self, _request: &StreamRequest) -> Result<ByteStream> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .expect("transport opened twice");
        Ok(Box::pin(Tracked {
            inner: UnboundedReceiverStream::new(rx),
            releases: self.releases.clone(),
        }))
    }
}

/// Transport that fails to open.
pub struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn open(&self, _request: &StreamRequest) -> Result<ByteStream> {
        Err(Error::api("API error 401 Unauthorized: invalid key"))
    }
}

/// Transport that never answers until cancelled.
pub struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn open(&self, _request: &StreamRequest) -> Result<ByteStream> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

pub fn request(cancel: CancellationToken) -> StreamRequest {
    StreamRequest::new(
        "http://localhost/v1/chat/completions",
        "test-key",
        "test-model",
        vec![ChatMessage::user("Hello")],
        0.7,
        cancel,
    )
}

pub fn content_line(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({
            "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
        })
    )
}

pub fn reasoning_line(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({
            "choices": [{"index": 0, "delta": {"content": null, "reasoning_content": text}}]
        })
    )
}

pub const DONE_LINE: &str = "data: [DONE]\n\n";

pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}
