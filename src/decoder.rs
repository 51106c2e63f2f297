//! Incremental UTF-8 decoding of transport chunks.
//!
//! HTTP bodies arrive in chunks whose boundaries have nothing to do with
//! character boundaries. A multi-byte character can be split across two
//! chunks:
//!
//! ```text
//! "é" = [0xC3, 0xA9]
//!
//! chunk 1: [... 0x22, 0xC3]   <- first byte only
//! chunk 2: [0xA9, 0x22, ...]  <- continuation byte
//! ```
//!
//! [`Utf8ChunkDecoder`] keeps the incomplete tail of one chunk and prepends it
//! to the next, so the character above decodes exactly as if it had arrived in
//! one piece. Sequences that are invalid (as opposed to merely incomplete) are
//! replaced with U+FFFD and decoding continues.
//!
//! A byte-order mark at the very start of the body is dropped, even when it is
//! itself split across chunks. Anywhere else U+FEFF is ordinary text.

use crate::error::DecodeAnomaly;
use std::borrow::Cow;

/// UTF-8 encoding of U+FEFF.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Stateful chunk decoder. One per run.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    /// Trailing bytes of the previous chunk that did not yet form a character.
    /// Never longer than 3 bytes.
    pending: Vec<u8>,
    /// Set once enough leading bytes were seen to rule a BOM in or out.
    bom_checked: bool,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one raw chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let input: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            Cow::Owned(joined)
        };

        let mut skip = 0;
        if !self.bom_checked {
            // Too few bytes to decide yet: hold them back
            if input.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(&input) {
                self.pending = input.into_owned();
                return String::new();
            }
            self.bom_checked = true;
            if input.starts_with(UTF8_BOM) {
                skip = UTF8_BOM.len();
            }
        }

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input[skip..];

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));

                    match err.error_len() {
                        // Invalid sequence in the middle of the input
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Input ends inside a character: keep it for next time
                        None => {
                            self.pending.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Number of bytes currently carried over.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Ends decoding. Returns an anomaly when bytes of an unfinished character
    /// are still pending; they are dropped either way.
    pub fn finish(&mut self) -> Option<DecodeAnomaly> {
        if self.pending.is_empty() {
            return None;
        }
        let pending_bytes = self.pending.len();
        self.pending.clear();
        Some(DecodeAnomaly { pending_bytes })
    }
}
