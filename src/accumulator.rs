//! Dual-channel accumulation of answer content and reasoning.

use serde::Serialize;

/// Final (or partial) text of one run. Both channels only ever grow by append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccumulatedResult {
    pub content: String,
    pub reasoning: String,
}

/// A content increment paired with the reasoning accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentDelta<'a> {
    pub delta: &'a str,
    pub reasoning: &'a str,
}

/// Owns the two channels of a single run.
#[derive(Debug, Default)]
pub struct DualChannelAccumulator {
    result: AccumulatedResult,
}

impl DualChannelAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reasoning increment. Nothing is delivered to the sink for it.
    pub fn apply_reasoning(&mut self, increment: &str) {
        self.result.reasoning.push_str(increment);
    }

    /// Appends to the content channel and hands back the increment together
    /// with the full reasoning snapshot.
    pub fn apply_content<'a>(&'a mut self, increment: &'a str) -> ContentDelta<'a> {
        self.result.content.push_str(increment);
        ContentDelta {
            delta: increment,
            reasoning: &self.result.reasoning,
        }
    }

    /// Answer text accumulated so far.
    pub fn content(&self) -> &str {
        &self.result.content
    }

    /// Reasoning text accumulated so far.
    pub fn reasoning(&self) -> &str {
        &self.result.reasoning
    }

    pub fn snapshot(&self) -> &AccumulatedResult {
        &self.result
    }

    /// Consumes the accumulator, yielding both channels.
    pub fn into_result(self) -> AccumulatedResult {
        self.result
    }
}
