//! # chat-stream
//!
//! Streaming ingestion engine for OpenAI-compatible chat-completion APIs.
//!
//! ## Overview
//!
//! The engine issues a streamed chat-completion request, decodes the
//! server-sent-event (SSE) body as it arrives, and splits the model output into
//! two channels:
//!
//! - **content**: the visible answer
//! - **reasoning**: the "thinking" text some models (e.g. DeepSeek-R1) emit as
//!   `reasoning_content`
//!
//! Every content increment is pushed to a caller-supplied sink as soon as its
//! line is complete, together with the reasoning accumulated so far.
//!
//! ## Key Features
//!
//! - **Chunk-boundary safe**: multi-byte characters and SSE lines may be split
//!   anywhere by the network; results do not depend on where
//! - **Fault isolation**: a malformed `data:` line is logged and skipped
//! - **Cooperative cancellation**: a `CancellationToken` aborts the connect or
//!   the pending read immediately
//! - **Tagged outcomes**: `Completed`, `Cancelled` and `Failed` are data, not
//!   error identities
//! - **Per-run state**: no globals, any number of concurrent runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use chat_stream::{ChatClient, ChatMessage, StreamOptions, StreamOutcome, sink};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = StreamOptions::builder()
//!         .endpoint("https://api.siliconflow.cn/v1/chat/completions")
//!         .model("deepseek-ai/DeepSeek-R1")
//!         .api_key("sk-...")
//!         .temperature(0.6)
//!         .build()?;
//!
//!     let client = ChatClient::new(options)?;
//!     let cancel = CancellationToken::new();
//!
//!     let mut sink = sink::from_fn(|update| print!("{}", update.delta));
//!     let report = client
//!         .stream_chat(vec![ChatMessage::user("Why is the sky blue?")], cancel, &mut sink)
//!         .await;
//!
//!     match report.outcome {
//!         StreamOutcome::Completed(result) => {
//!             println!("\n\n[reasoning: {} chars]", result.reasoning.len());
//!         }
//!         other => eprintln!("{}", other.notice().unwrap_or_default()),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **transport**: issues the POST and exposes the body as a byte stream
//! - **decoder**: incremental UTF-8 decoding with carry-over
//! - **sse**: line splitting with carry-over, `data:` framing, `[DONE]`, payload parsing
//! - **accumulator**: the content and reasoning channels
//! - **sink**: live update delivery
//! - **lifecycle**: the per-run read loop, cancellation and outcomes
//! - **client**: the facade tying options, credentials and transport together
//! - **title**: non-streaming title generation
//! - **config**, **types**, **error**: configuration, data types, error taxonomy

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Dual-channel accumulation of content and reasoning.
mod accumulator;

/// Client facade: `ChatClient` and the `stream_completion()` convenience.
mod client;

/// Environment helpers and credential sources.
mod config;

/// Incremental UTF-8 decoding across chunk boundaries.
mod decoder;

/// Error taxonomy and the `Result<T>` alias.
mod error;

/// Per-run read loop, cancellation, outcomes and reader release.
mod lifecycle;

/// SSE line splitting and event parsing.
mod sse;

/// Option builder, chat messages, the immutable request, and wire formats.
mod types;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

/// Sinks receiving live content updates. Public as a module for `sink::from_fn`.
pub mod sink;

/// Non-streaming conversation title generation.
pub mod title;

/// Transport seam and the `reqwest` implementation.
pub mod transport;

// --- Client ---

pub use client::{ChatClient, stream_completion};

// --- Configuration ---

pub use config::{
    API_KEY_ENV, CredentialSource, DEFAULT_ENDPOINT, DEFAULT_MODEL, ENDPOINT_ENV, EnvCredential,
    MODEL_ENV, StaticCredential, get_endpoint, get_model,
};

// --- Error Handling ---

pub use error::{DecodeAnomaly, Error, LineParseError, Result};

// --- Pipeline Stages ---

pub use accumulator::{AccumulatedResult, ContentDelta, DualChannelAccumulator};
pub use decoder::Utf8ChunkDecoder;
pub use lifecycle::{
    ABORTED_NOTICE, FAILED_NOTICE, IngestRun, RunReport, RunState, RunStats, StreamOutcome,
};
pub use sink::{ContentUpdate, StreamSink};
pub use sse::{
    DATA_PREFIX, DONE_SENTINEL, DeltaRecord, LineOutcome, SseEvent, SseEventParser,
    SseLineSplitter, parse_line,
};
pub use transport::{ByteStream, HttpTransport, Transport};

// --- Core Types ---

pub use types::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ChatMessage, MessageRole,
    StreamOptions, StreamOptionsBuilder, StreamRequest,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The most commonly used types. Import with `use chat_stream::prelude::*;`.
pub mod prelude {
    pub use crate::{
        AccumulatedResult, ChatClient, ChatMessage, ContentUpdate, Error, MessageRole, Result,
        RunReport, StreamOptions, StreamOutcome, StreamSink, stream_completion,
    };
    pub use tokio_util::sync::CancellationToken;
}
