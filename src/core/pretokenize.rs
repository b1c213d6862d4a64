//! Pretokenization: split text into chunks that BPE merges never cross.
//!
//! Each named vocabulary ships with one fixed pattern. The default backend is
//! `fancy-regex`, which supports the `\s+(?!\S)` lookahead both patterns rely
//! on; PCRE2 is available behind the `pcre2` feature.

use std::str::Utf8Chunks;

use tracing::warn;

#[cfg(feature = "pcre2")]
use pcre2::bytes::Regex as Pcre2Regex;

use super::tokenizer::TokenizerError;

/// Pattern for cl100k_base (GPT-4, GPT-3.5-turbo).
pub const CL100K_BASE_PATTERN: &str = r"(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Pattern for o200k_base (GPT-4o).
///
/// Splits words on case changes (`HelloWorld` → `Hello`, `World`) and keeps
/// contractions attached to their word.
pub const O200K_BASE_PATTERN: &str = r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+(?i:'s|'t|'re|'ve|'m|'ll|'d)?|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*(?i:'s|'t|'re|'ve|'m|'ll|'d)?|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n/]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Regex backend: fancy-regex (default) or PCRE2 (optional).
enum RegexBackend {
    Fancy(Box<fancy_regex::Regex>),
    #[cfg(feature = "pcre2")]
    Pcre2(Pcre2Regex),
}

impl RegexBackend {
    /// First match in `text` starting at or after `pos`, as byte offsets.
    ///
    /// A runtime matching error is logged and reported as "no match".
    fn find_at(&self, text: &str, pos: usize) -> Option<(usize, usize)> {
        let found = match self {
            RegexBackend::Fancy(regex) => regex
                .find_from_pos(text, pos)
                .map(|m| m.map(|m| (m.start(), m.end())))
                .map_err(|e| e.to_string()),
            #[cfg(feature = "pcre2")]
            RegexBackend::Pcre2(regex) => regex
                .find_at(text.as_bytes(), pos)
                .map(|m| m.map(|m| (m.start(), m.end())))
                .map_err(|e| e.to_string()),
        };
        found.unwrap_or_else(|error| {
            warn!(%error, pos, "pretokenizer match failed; keeping rest of run as one chunk");
            None
        })
    }
}

/// Splits text into chunks according to a fixed pattern.
pub struct Pretokenizer {
    regex: RegexBackend,
    pattern: String,
}

impl Pretokenizer {
    /// Compile `pattern` with the fancy-regex backend.
    pub fn new(pattern: &str) -> Result<Self, TokenizerError> {
        let regex = fancy_regex::Regex::new(pattern)?;
        Ok(Self {
            regex: RegexBackend::Fancy(Box::new(regex)),
            pattern: pattern.to_string(),
        })
    }

    /// Compile `pattern` with PCRE2 (UTF + Unicode properties).
    #[cfg(feature = "pcre2")]
    pub fn new_pcre2(pattern: &str, use_jit: bool) -> Result<Self, TokenizerError> {
        let mut builder = pcre2::bytes::RegexBuilder::new();
        if use_jit {
            builder.jit_if_available(true);
        }
        builder.utf(true);
        builder.ucp(true);
        let regex = builder.build(pattern)?;
        Ok(Self {
            regex: RegexBackend::Pcre2(regex),
            pattern: pattern.to_string(),
        })
    }

    /// The pattern this pretokenizer was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the PCRE2 backend is active.
    pub fn is_pcre2(&self) -> bool {
        match self.regex {
            RegexBackend::Fancy(_) => false,
            #[cfg(feature = "pcre2")]
            RegexBackend::Pcre2(_) => true,
        }
    }

    /// Lazily split `text` into chunks.
    ///
    /// Concatenating the chunks reproduces `text` exactly. Valid UTF-8 runs
    /// are split by the pattern; every byte of an invalid UTF-8 sequence
    /// becomes a chunk of its own.
    pub fn chunks<'p, 't>(&'p self, text: &'t [u8]) -> Chunks<'p, 't> {
        Chunks {
            regex: &self.regex,
            runs: text.utf8_chunks(),
            valid: "",
            pos: 0,
            pending: None,
            invalid: &[],
        }
    }
}

/// Iterator over the chunks of one text. See [`Pretokenizer::chunks`].
pub struct Chunks<'p, 't> {
    regex: &'p RegexBackend,
    runs: Utf8Chunks<'t>,
    /// Valid UTF-8 run being split.
    valid: &'t str,
    /// Offset of the next unconsumed byte in `valid`.
    pos: usize,
    /// Match found after a gap, emitted on the next call.
    pending: Option<(usize, usize)>,
    /// Invalid bytes following `valid`.
    invalid: &'t [u8],
}

impl<'t> Chunks<'_, 't> {
    fn next_in_run(&mut self) -> &'t [u8] {
        let valid: &'t str = self.valid;
        let bytes = valid.as_bytes();
        if let Some((start, end)) = self.pending.take() {
            self.pos = end;
            return &bytes[start..end];
        }

        let start = self.pos;
        let end = match self.regex.find_at(valid, start) {
            Some((m_start, m_end)) if m_start >= start => {
                if m_start > start {
                    // Text the pattern skipped over still has to come out.
                    if m_end > m_start {
                        self.pending = Some((m_start, m_end));
                    }
                    m_start
                } else if m_end > m_start {
                    m_end
                } else {
                    // Empty match: step over one character.
                    start + valid[start..].chars().next().map_or(1, char::len_utf8)
                }
            }
            _ => bytes.len(),
        };
        self.pos = end;
        &bytes[start..end]
    }
}

impl<'t> Iterator for Chunks<'_, 't> {
    type Item = &'t [u8];

    fn next(&mut self) -> Option<&'t [u8]> {
        loop {
            if self.pending.is_some() || self.pos < self.valid.len() {
                return Some(self.next_in_run());
            }
            if !self.invalid.is_empty() {
                let (byte, rest) = self.invalid.split_at(1);
                self.invalid = rest;
                return Some(byte);
            }
            let run = self.runs.next()?;
            self.valid = run.valid();
            self.pos = 0;
            self.invalid = run.invalid();
        }
    }
}
