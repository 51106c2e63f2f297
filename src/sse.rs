//! SSE line splitting and event parsing.
//!
//! The completion endpoint answers with a line protocol:
//!
//! ```text
//! data: {"choices":[{"delta":{"reasoning_content":"Let me think"}}]}
//!
//! data: {"choices":[{"delta":{"content":"Hello"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Two things make this harder than `text.lines()`:
//!
//! 1. **Lines do not align with chunks.** A single `data:` line may arrive in
//!    several decoded fragments, and one fragment may hold several lines plus
//!    the start of the next one. [`SseLineSplitter`] keeps the unterminated
//!    tail and only releases a line once its `\n` has been seen.
//!
//! 2. **Bad lines must not kill the stream.** A payload that is not valid JSON
//!    is logged and skipped; the lines around it are unaffected.
//!
//! # Flow
//!
//! ```text
//! decoded text
//!     │
//!     │ SseLineSplitter::push()
//!     ▼
//! complete lines
//!     │
//!     │ parse_line()
//!     ▼
//! LineOutcome::{Ignored, Done, Delta, Malformed}
//!     │
//!     │ SseEventParser::feed()
//!     ▼
//! Vec<SseEvent>  (Reasoning / Content increments, then Done)
//! ```

use crate::error::LineParseError;
use crate::types::ChatCompletionChunk;

/// Prefix of a data line, including the single space.
pub const DATA_PREFIX: &str = "data: ";

/// Payload signalling normal end of stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Reassembles `\n`-terminated lines from arbitrarily split text.
#[derive(Debug, Default)]
pub struct SseLineSplitter {
    /// Text after the last `\n` seen so far.
    partial: String,
}

impl SseLineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` and returns every line completed by it, in order,
    /// without terminators. A trailing `\r` is stripped so CRLF framing works.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        // Only the new text can hold a line break; the carried tail has none
        let Some(offset) = text.rfind('\n') else {
            self.partial.push_str(text);
            return Vec::new();
        };
        let last_newline = self.partial.len() + offset;
        self.partial.push_str(text);

        let tail = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, tail);

        complete
            .split_terminator('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }

    /// The unterminated tail currently held back.
    pub fn partial(&self) -> &str {
        &self.partial
    }

    /// Takes the unterminated tail, if any. Used at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial))
        }
    }
}

/// Channel increments carried by one parsed `data:` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaRecord {
    pub content: Option<String>,
    pub reasoning: Option<String>,
}

impl DeltaRecord {
    /// Extracts `choices[0].delta`. Empty strings count as absent.
    pub fn from_chunk(chunk: ChatCompletionChunk) -> Self {
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Self::default();
        };
        Self {
            content: choice.delta.content.filter(|s| !s.is_empty()),
            reasoning: choice.delta.reasoning_content.filter(|s| !s.is_empty()),
        }
    }

    /// True when the line carried neither channel.
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.reasoning.is_none()
    }

    /// Events for this record; reasoning is emitted before content.
    pub fn into_events(self) -> impl Iterator<Item = SseEvent> {
        self.reasoning
            .map(SseEvent::Reasoning)
            .into_iter()
            .chain(self.content.map(SseEvent::Content))
    }
}

/// Result of evaluating one complete line.
#[derive(Debug)]
pub enum LineOutcome {
    /// Not a data line (blank keep-alive, comment, `event:` field, ...)
    Ignored,
    /// `data: [DONE]`
    Done,
    /// A parsed payload
    Delta(DeltaRecord),
    /// A data line whose payload is not a valid chunk
    Malformed(LineParseError),
}

/// Evaluates a single complete line.
pub fn parse_line(line: &str) -> LineOutcome {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return LineOutcome::Ignored;
    };

    if payload == DONE_SENTINEL {
        return LineOutcome::Done;
    }

    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => LineOutcome::Delta(DeltaRecord::from_chunk(chunk)),
        Err(source) => LineOutcome::Malformed(LineParseError {
            payload: payload.to_string(),
            source,
        }),
    }
}

/// Increment produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Reasoning(String),
    Content(String),
    Done,
}

/// Line splitter plus per-line evaluation, with the `[DONE]` latch.
///
/// Once `[DONE]` has been seen, `feed()` returns nothing for the rest of the
/// run, even if more lines follow in the same fragment.
#[derive(Debug, Default)]
pub struct SseEventParser {
    splitter: SseLineSplitter,
    done: bool,
    lines_seen: u64,
    malformed_lines: u64,
}

impl SseEventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds decoded text and returns the events of every line it completed.
    pub fn feed(&mut self, text: &str) -> Vec<SseEvent> {
        if self.done {
            return Vec::new();
        }

        let mut events = Vec::new();
        for line in self.splitter.push(text) {
            self.lines_seen += 1;
            match parse_line(&line) {
                LineOutcome::Ignored => {}
                LineOutcome::Done => {
                    self.done = true;
                    events.push(SseEvent::Done);
                    break;
                }
                LineOutcome::Delta(record) => events.extend(record.into_events()),
                LineOutcome::Malformed(err) => {
                    self.malformed_lines += 1;
                    log::warn!("Skipping SSE line: {}", err);
                }
            }
        }
        events
    }

    /// End of stream: an unterminated trailing line is discarded, never evaluated.
    pub fn finish(&mut self) {
        if let Some(rest) = self.splitter.finish() {
            if !rest.trim().is_empty() {
                log::warn!(
                    "Discarding {} byte(s) of unterminated SSE line at end of stream",
                    rest.len()
                );
            }
        }
    }

    /// Whether `[DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Complete lines evaluated so far, including blank ones.
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    /// Data lines skipped because their payload did not parse.
    pub fn malformed_lines(&self) -> u64 {
        self.malformed_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_line(text: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_splitter_holds_partial_line() {
        let mut splitter = SseLineSplitter::new();
        assert!(splitter.push("data: {\"a\"").is_empty());
        assert_eq!(splitter.partial(), "data: {\"a\"");

        let lines = splitter.push(":1}\n\ndata: x");
        assert_eq!(lines, vec!["data: {\"a\":1}", ""]);
        assert_eq!(splitter.partial(), "data: x");
    }

    #[test]
    fn test_splitter_strips_carriage_return() {
        let mut splitter = SseLineSplitter::new();
        let lines = splitter.push("data: [DONE]\r\n");
        assert_eq!(lines, vec!["data: [DONE]"]);
    }

    #[test]
    fn test_splitter_long_line_in_single_chars() {
        let line = format!("data: {}", "é".repeat(2048));
        let mut splitter = SseLineSplitter::new();

        for ch in line.chars() {
            assert!(splitter.push(ch.encode_utf8(&mut [0; 4])).is_empty());
        }
        assert_eq!(splitter.partial().len(), line.len());

        assert_eq!(splitter.push("\ntail"), vec![line]);
        assert_eq!(splitter.partial(), "tail");
    }

    #[test]
    fn test_splitter_crlf_split_across_pushes() {
        let mut splitter = SseLineSplitter::new();
        assert!(splitter.push("data: ü\r").is_empty());
        assert_eq!(splitter.push("\ndata: x\n"), vec!["data: ü", "data: x"]);
        assert_eq!(splitter.partial(), "");
    }

    #[test]
    fn test_splitter_finish() {
        let mut splitter = SseLineSplitter::new();
        splitter.push("line\nrest");
        assert_eq!(splitter.finish().as_deref(), Some("rest"));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_parse_line_variants() {
        assert!(matches!(parse_line(""), LineOutcome::Ignored));
        assert!(matches!(parse_line(": keep-alive"), LineOutcome::Ignored));
        assert!(matches!(parse_line("event: message"), LineOutcome::Ignored));
        // No space after the colon is not the framing this protocol uses
        assert!(matches!(parse_line("data:[DONE]"), LineOutcome::Ignored));
        assert!(matches!(parse_line("data: [DONE]"), LineOutcome::Done));
        assert!(matches!(parse_line("data: {oops"), LineOutcome::Malformed(_)));

        let line = r#"data: {"choices":[{"delta":{"content":"Hi","reasoning_content":"hm"}}]}"#;
        match parse_line(line) {
            LineOutcome::Delta(record) => {
                assert_eq!(record.content.as_deref(), Some("Hi"));
                assert_eq!(record.reasoning.as_deref(), Some("hm"));
            }
            other => panic!("Expected delta, got {:?}", other),
        }
    }

    #[test]
    fn test_delta_record_ignores_empty_strings_and_missing_choices() {
        match parse_line(r#"data: {"choices":[{"delta":{"content":"","role":"assistant"}}]}"#) {
            LineOutcome::Delta(record) => assert!(record.is_empty()),
            other => panic!("Expected delta, got {:?}", other),
        }
        match parse_line(r#"data: {"choices":[]}"#) {
            LineOutcome::Delta(record) => assert!(record.is_empty()),
            other => panic!("Expected delta, got {:?}", other),
        }
    }

    #[test]
    fn test_record_events_reasoning_first() {
        let record = DeltaRecord {
            content: Some("answer".to_string()),
            reasoning: Some("thought".to_string()),
        };
        let events: Vec<_> = record.into_events().collect();
        assert_eq!(
            events,
            vec![
                SseEvent::Reasoning("thought".to_string()),
                SseEvent::Content("answer".to_string())
            ]
        );
    }

    #[test]
    fn test_parser_skips_malformed_line() {
        let mut parser = SseEventParser::new();
        let text = format!("{}data: {{broken\n{}", content_line("a"), content_line("b"));
        let events = parser.feed(&text);
        assert_eq!(
            events,
            vec![
                SseEvent::Content("a".to_string()),
                SseEvent::Content("b".to_string())
            ]
        );
        assert_eq!(parser.malformed_lines(), 1);
        assert_eq!(parser.lines_seen(), 3);
    }

    #[test]
    fn test_parser_stops_at_done() {
        let mut parser = SseEventParser::new();
        let text = format!("{}data: [DONE]\n{}", content_line("a"), content_line("late"));
        let events = parser.feed(&text);
        assert_eq!(
            events,
            vec![SseEvent::Content("a".to_string()), SseEvent::Done]
        );
        assert!(parser.is_done());
        assert!(parser.feed(&content_line("later")).is_empty());
    }

    #[test]
    fn test_parser_no_event_before_line_terminator() {
        let mut parser = SseEventParser::new();
        assert!(parser.feed(r#"data: {"choices":[{"delta":{"con"#).is_empty());
        assert_eq!(
            parser.feed("tent\":\"X\"}}]}\n"),
            vec![SseEvent::Content("X".to_string())]
        );
    }

    #[test]
    fn test_parser_finish_discards_unterminated_line() {
        let mut parser = SseEventParser::new();
        assert!(parser.feed(content_line("x").trim_end()).is_empty());
        parser.finish();
        assert!(parser.feed("\n").is_empty());
    }
}
