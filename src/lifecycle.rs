//! Run lifecycle: the read loop, cancellation, outcomes, and reader release.
//!
//! Every streamed completion is one [`IngestRun`], a per-run context that owns
//! all mutable state of the pipeline:
//!
//! - the decoder carry-over ([`Utf8ChunkDecoder`])
//! - the line carry-over and `[DONE]` latch ([`SseEventParser`])
//! - the two text channels ([`DualChannelAccumulator`])
//! - the byte-stream reader, once the transport has opened it
//!
//! Nothing is shared between runs, so any number of them can be in flight at
//! once.
//!
//! # State machine
//!
//! ```text
//! Idle ──execute()──▶ Running ──┬─ [DONE] / end of body ─────▶ Completed
//!                               ├─ token fired / idle timeout ─▶ Cancelled
//!                               └─ transport or read error ───▶ Failed
//! ```
//!
//! The only suspension points are opening the transport and reading the next
//! chunk. Both are raced against the cancellation token, so a pending read is
//! abandoned as soon as the token fires. Decoding, parsing, accumulation and
//! sink notification happen synchronously between reads, in arrival order.
//!
//! The reader is released exactly once on every terminal transition, by an
//! explicit release on the normal path and by [`Drop`] if the run future
//! itself is dropped mid-read.

use crate::accumulator::{AccumulatedResult, DualChannelAccumulator};
use crate::decoder::Utf8ChunkDecoder;
use crate::sink::{ContentUpdate, StreamSink};
use crate::sse::{SseEvent, SseEventParser};
use crate::transport::{ByteStream, Transport};
use crate::types::StreamRequest;
use crate::Error;
use futures::stream::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Notice shown to the user when a run was cancelled.
pub const ABORTED_NOTICE: &str = "Stream Request Aborted.";

/// Notice shown to the user when a run failed.
pub const FAILED_NOTICE: &str = "Stream Request Failed.";

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    /// True for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Cancelled | RunState::Failed
        )
    }
}

/// Terminal value of one run. Exactly one is produced per run.
#[derive(Debug)]
pub enum StreamOutcome {
    /// `[DONE]` or natural end of body
    Completed(AccumulatedResult),
    /// The caller cancelled (or the idle timeout expired)
    Cancelled,
    /// Transport, read, or other non-isolated failure
    Failed(Error),
}

impl StreamOutcome {
    /// The terminal [`RunState`] this outcome corresponds to.
    pub fn state(&self) -> RunState {
        match self {
            StreamOutcome::Completed(_) => RunState::Completed,
            StreamOutcome::Cancelled => RunState::Cancelled,
            StreamOutcome::Failed(_) => RunState::Failed,
        }
    }

    /// Returns true if the run reached `[DONE]` or the end of the body.
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamOutcome::Completed(_))
    }

    /// Returns true if the run was cancelled or timed out idle.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamOutcome::Cancelled)
    }

    /// Returns true if the run ended with an error.
    pub fn is_failed(&self) -> bool {
        matches!(self, StreamOutcome::Failed(_))
    }

    /// The user-facing notice, if any. Completed runs have none.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            StreamOutcome::Completed(_) => None,
            StreamOutcome::Cancelled => Some(ABORTED_NOTICE),
            StreamOutcome::Failed(_) => Some(FAILED_NOTICE),
        }
    }

    /// The final result of a completed run. Partial results of cancelled or
    /// failed runs are not exposed.
    pub fn into_result(self) -> Option<AccumulatedResult> {
        match self {
            StreamOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}

/// Counters collected during a run, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub chunks: u64,
    pub bytes: u64,
    pub lines: u64,
    pub malformed_lines: u64,
    pub content_increments: u64,
    pub reasoning_increments: u64,
}

/// Outcome plus statistics of a finished run.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: StreamOutcome,
    pub stats: RunStats,
}

impl RunReport {
    /// Report for a run that failed before anything was read.
    pub fn failed(err: Error) -> Self {
        log::error!("Stream failed before start: {}", err);
        Self {
            outcome: StreamOutcome::Failed(err),
            stats: RunStats::default(),
        }
    }
}

/// Exclusive owner of the byte-stream reader. Releases it at most once.
struct ReaderGuard {
    stream: Option<ByteStream>,
}

impl ReaderGuard {
    fn new(stream: ByteStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    async fn next_chunk(&mut self) -> Option<crate::Result<bytes::Bytes>> {
        match self.stream.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }

    /// Drops the reader. Returns `false` if it was already released.
    fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(stream) => {
                drop(stream);
                log::debug!("Stream reader released");
                true
            }
            None => false,
        }
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Why the read loop stopped.
enum LoopExit {
    Done,
    EndOfBody,
    Cancelled,
    IdleTimeout,
    Failed(Error),
}

/// What ingesting one chunk asked the loop to do next.
enum ChunkStep {
    Continue,
    Done,
    Cancelled,
}

/// Per-run pipeline context.
#[derive(Debug)]
pub struct IngestRun {
    /// Internal only; the caller observes the terminal state via the outcome.
    state: RunState,
    decoder: Utf8ChunkDecoder,
    parser: SseEventParser,
    accumulator: DualChannelAccumulator,
    stats: RunStats,
    auto_scroll: bool,
    idle_timeout: Option<Duration>,
}

impl Default for IngestRun {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestRun {
    /// Creates an idle run with auto-scroll on and no idle timeout.
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            decoder: Utf8ChunkDecoder::new(),
            parser: SseEventParser::new(),
            accumulator: DualChannelAccumulator::new(),
            stats: RunStats::default(),
            auto_scroll: true,
            idle_timeout: None,
        }
    }

    /// Preference forwarded to the sink with every update.
    pub fn with_auto_scroll(mut self, auto_scroll: bool) -> Self {
        self.auto_scroll = auto_scroll;
        self
    }

    /// Cancel the run when no chunk arrives for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Opens the transport and drives the stream to a terminal outcome.
    pub async fn execute<T, S>(
        mut self,
        transport: &T,
        request: &StreamRequest,
        sink: &mut S,
    ) -> RunReport
    where
        T: Transport + ?Sized,
        S: StreamSink + ?Sized,
    {
        self.transition(RunState::Running);
        let cancel = request.cancel_token().clone();

        if cancel.is_cancelled() {
            return self.finish(LoopExit::Cancelled);
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = transport.open(request) => result,
        };

        match opened {
            Ok(stream) => self.read_to_end(stream, &cancel, sink).await,
            Err(Error::Cancelled) => self.finish(LoopExit::Cancelled),
            Err(err) => self.finish(LoopExit::Failed(err)),
        }
    }

    /// Drives an already opened byte stream to a terminal outcome.
    pub async fn drive<S>(
        mut self,
        stream: ByteStream,
        cancel: &CancellationToken,
        sink: &mut S,
    ) -> RunReport
    where
        S: StreamSink + ?Sized,
    {
        self.transition(RunState::Running);
        self.read_to_end(stream, cancel, sink).await
    }

    async fn read_to_end<S>(
        mut self,
        stream: ByteStream,
        cancel: &CancellationToken,
        sink: &mut S,
    ) -> RunReport
    where
        S: StreamSink + ?Sized,
    {
        let mut reader = ReaderGuard::new(stream);
        let idle_timeout = self.idle_timeout;

        let exit = loop {
            let idle = async {
                match idle_timeout {
                    Some(timeout) => tokio::time::sleep(timeout).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break LoopExit::Cancelled,
                _ = idle => break LoopExit::IdleTimeout,
                next = reader.next_chunk() => next,
            };

            match next {
                Some(Ok(chunk)) => match self.ingest_chunk(&chunk, cancel, sink) {
                    ChunkStep::Continue => {}
                    ChunkStep::Done => break LoopExit::Done,
                    ChunkStep::Cancelled => break LoopExit::Cancelled,
                },
                Some(Err(err)) => break LoopExit::Failed(err),
                None => break LoopExit::EndOfBody,
            }
        };

        reader.release();
        self.finish(exit)
    }

    /// Decode, split, parse, accumulate, notify. No suspension points.
    fn ingest_chunk<S>(
        &mut self,
        chunk: &[u8],
        cancel: &CancellationToken,
        sink: &mut S,
    ) -> ChunkStep
    where
        S: StreamSink + ?Sized,
    {
        self.stats.chunks += 1;
        self.stats.bytes += chunk.len() as u64;

        let text = self.decoder.decode(chunk);
        if text.is_empty() {
            return ChunkStep::Continue;
        }

        for event in self.parser.feed(&text) {
            // The sink may cancel from inside a callback
            if cancel.is_cancelled() {
                return ChunkStep::Cancelled;
            }
            match event {
                SseEvent::Reasoning(increment) => {
                    self.stats.reasoning_increments += 1;
                    self.accumulator.apply_reasoning(&increment);
                }
                SseEvent::Content(increment) => {
                    self.stats.content_increments += 1;
                    let delta = self.accumulator.apply_content(&increment);
                    sink.on_content(&ContentUpdate {
                        delta: delta.delta,
                        reasoning: delta.reasoning,
                        partial: true,
                        auto_scroll: self.auto_scroll,
                    });
                }
                SseEvent::Done => return ChunkStep::Done,
            }
        }

        ChunkStep::Continue
    }

    fn finish(mut self, exit: LoopExit) -> RunReport {
        self.stats.lines = self.parser.lines_seen();
        self.stats.malformed_lines = self.parser.malformed_lines();

        let outcome = match exit {
            LoopExit::Done => {
                StreamOutcome::Completed(std::mem::take(&mut self.accumulator).into_result())
            }
            LoopExit::EndOfBody => {
                if let Some(anomaly) = self.decoder.finish() {
                    log::warn!("Decode anomaly: {}", anomaly);
                }
                self.parser.finish();
                StreamOutcome::Completed(std::mem::take(&mut self.accumulator).into_result())
            }
            LoopExit::Cancelled => {
                log::info!("{}", ABORTED_NOTICE);
                StreamOutcome::Cancelled
            }
            LoopExit::IdleTimeout => {
                log::info!("No data for {:?}; cancelling stream", self.idle_timeout);
                StreamOutcome::Cancelled
            }
            LoopExit::Failed(err) => {
                log::error!("{} {}", FAILED_NOTICE, err);
                StreamOutcome::Failed(err)
            }
        };

        self.transition(outcome.state());
        log::debug!(
            "Run stats: {} chunks, {} bytes, {} lines ({} malformed)",
            self.stats.chunks,
            self.stats.bytes,
            self.stats.lines,
            self.stats.malformed_lines
        );

        RunReport {
            outcome,
            stats: self.stats,
        }
    }

    fn transition(&mut self, to: RunState) {
        debug_assert!(!self.state.is_terminal(), "run already finished");
        log::debug!("Run {:?} -> {:?}", self.state, to);
        self.state = to;
    }
}
