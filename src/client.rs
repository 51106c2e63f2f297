//! Client facade for streamed chat completions and title generation.
//!
//! [`ChatClient`] bundles what every run needs: options, a pooled HTTP client,
//! and a credential source. Each call to [`ChatClient::stream_chat`] creates a
//! fresh [`IngestRun`], so one client can serve several concurrent
//! conversations.
//!
//! ```rust,no_run
//! use chat_stream::{ChatClient, ChatMessage, StreamOptions, sink};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = StreamOptions::builder()
//!     .endpoint("https://api.siliconflow.cn/v1/chat/completions")
//!     .model("deepseek-ai/DeepSeek-R1")
//!     .api_key("sk-...")
//!     .build()?;
//! let client = ChatClient::new(options)?;
//!
//! let cancel = CancellationToken::new();
//! let mut sink = sink::from_fn(|update| print!("{}", update.delta));
//! let report = client
//!     .stream_chat(vec![ChatMessage::user("Hello!")], cancel, &mut sink)
//!     .await;
//!
//! if let Some(notice) = report.outcome.notice() {
//!     eprintln!("{}", notice);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{CredentialSource, EnvCredential, StaticCredential};
use crate::lifecycle::{IngestRun, RunReport};
use crate::sink::StreamSink;
use crate::title;
use crate::transport::HttpTransport;
use crate::types::{ChatMessage, StreamOptions, StreamRequest};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Streams chat completions for one configured endpoint.
#[derive(Clone)]
pub struct ChatClient {
    options: StreamOptions,
    transport: HttpTransport,
    credentials: Arc<dyn CredentialSource>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Creates a client. The credential comes from `options.api_key` when set,
    /// otherwise from the `CHAT_STREAM_API_KEY` environment variable at
    /// request time.
    pub fn new(options: StreamOptions) -> Result<Self> {
        let transport = HttpTransport::new(&options)?;
        let credentials: Arc<dyn CredentialSource> = match &options.api_key {
            Some(key) => Arc::new(StaticCredential::new(key.clone())),
            None => Arc::new(EnvCredential::default()),
        };
        Ok(Self {
            options,
            transport,
            credentials,
        })
    }

    /// Replaces the credential source.
    pub fn with_credentials(mut self, credentials: impl CredentialSource + 'static) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    /// The options this client was built with.
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Builds the immutable request for `messages`, resolving the credential.
    pub fn request(
        &self,
        messages: Vec<ChatMessage>,
        cancel: CancellationToken,
    ) -> Result<StreamRequest> {
        if messages.is_empty() {
            return Err(Error::invalid_input("conversation has no messages"));
        }
        let api_key = self.credentials.api_key()?;
        Ok(StreamRequest::from_options(
            &self.options,
            api_key,
            messages,
            cancel,
        ))
    }

    /// Streams one completion, pushing every content increment into `sink`.
    ///
    /// Always returns a report; failures are in `report.outcome`.
    pub async fn stream_chat<S>(
        &self,
        messages: Vec<ChatMessage>,
        cancel: CancellationToken,
        sink: &mut S,
    ) -> RunReport
    where
        S: StreamSink + ?Sized,
    {
        let request = match self.request(messages, cancel) {
            Ok(request) => request,
            Err(err) => return RunReport::failed(err),
        };

        IngestRun::new()
            .with_auto_scroll(self.options.auto_scroll)
            .with_idle_timeout(self.options.idle_timeout_duration())
            .execute(&self.transport, &request, sink)
            .await
    }

    /// Generates a short conversation title. Never fails; see [`crate::title`].
    pub async fn generate_title(&self, messages: &[ChatMessage]) -> String {
        let api_key = match self.credentials.api_key() {
            Ok(key) => key,
            Err(e) => {
                log::error!("Title generation failed: {}", e);
                return title::FAILED_TITLE.to_string();
            }
        };

        title::generate_title(
            self.transport.client(),
            &self.options.endpoint,
            &api_key,
            self.options.title_model(),
            messages,
            Duration::from_secs(self.options.title_timeout),
        )
        .await
    }
}

/// One-shot convenience: build a client from `options` and stream `messages`.
///
/// Errors only when the client itself cannot be built.
pub async fn stream_completion<S>(
    options: &StreamOptions,
    messages: Vec<ChatMessage>,
    cancel: CancellationToken,
    sink: &mut S,
) -> Result<RunReport>
where
    S: StreamSink + ?Sized,
{
    let client = ChatClient::new(options.clone())?;
    Ok(client.stream_chat(messages, cancel, sink).await)
}
