//! Sink notification for live content updates.
//!
//! The pipeline calls the sink once per content increment, synchronously,
//! in arrival order. Reasoning increments are not pushed on their own; each
//! content update carries the reasoning accumulated so far.

use tokio::sync::mpsc;

/// One content increment as seen by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentUpdate<'a> {
    /// The new piece of answer text
    pub delta: &'a str,
    /// Full reasoning accumulated up to this point
    pub reasoning: &'a str,
    /// Always `true` while streaming: the answer is not finished yet
    pub partial: bool,
    /// Caller's preference for keeping the view at the newest text
    pub auto_scroll: bool,
}

/// Receiver of live content updates.
pub trait StreamSink: Send {
    fn on_content(&mut self, update: &ContentUpdate<'_>);
}

impl<F> StreamSink for F
where
    F: FnMut(&ContentUpdate<'_>) + Send,
{
    fn on_content(&mut self, update: &ContentUpdate<'_>) {
        self(update)
    }
}

/// Pins a closure to the sink signature so its argument type is inferred.
///
/// ```rust
/// use chat_stream::sink;
///
/// let mut text = String::new();
/// let _sink = sink::from_fn(move |update| text.push_str(update.delta));
/// ```
pub fn from_fn<F>(f: F) -> F
where
    F: FnMut(&ContentUpdate<'_>) + Send,
{
    f
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl StreamSink for NoopSink {
    fn on_content(&mut self, _update: &ContentUpdate<'_>) {}
}

/// Owned copy of a [`ContentUpdate`], for handing updates to another task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUpdate {
    pub delta: String,
    pub reasoning: String,
    pub auto_scroll: bool,
}

/// Forwards updates over an unbounded channel, e.g. to a UI task.
///
/// A closed receiver is not an error for the run; updates are then dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamUpdate>,
}

impl ChannelSink {
    /// Creates the sink together with the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StreamSink for ChannelSink {
    fn on_content(&mut self, update: &ContentUpdate<'_>) {
        let owned = StreamUpdate {
            delta: update.delta.to_string(),
            reasoning: update.reasoning.to_string(),
            auto_scroll: update.auto_scroll,
        };
        if self.tx.send(owned).is_err() {
            log::debug!("Sink receiver dropped; discarding update");
        }
    }
}
