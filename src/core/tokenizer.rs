use std::collections::TryReserveError;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;

use super::bpe::{byte_pair_count, byte_pair_encode};
use super::decoder;
use super::pretokenize::Pretokenizer;
use super::table::{TokenId, VocabTable};
use super::vocab::{load_tiktoken_bpe, load_tiktoken_bpe_file, VocabError};

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Invalid token id: {0}")]
    InvalidTokenId(TokenId),
    #[error("Decoding error: invalid UTF-8 after {valid_up_to} bytes")]
    MalformedText { valid_up_to: usize },
    #[error("Allocation failed: {0}")]
    AllocationFailure(#[from] TryReserveError),
    #[error("Regex compilation error (fancy-regex): {0}")]
    Regex(#[from] fancy_regex::Error),
    #[cfg(feature = "pcre2")]
    #[error("Regex compilation error (PCRE2): {0}")]
    Pcre2Error(#[from] pcre2::Error),
    #[error("PCRE2 feature not enabled. Compile with --features pcre2")]
    Pcre2NotEnabled,
    #[error("Vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("Unknown pretrained vocabulary: {0}")]
    UnknownPretrained(String),
}

/// Byte-level BPE tokenizer.
///
/// A tokenizer pairs an immutable [`VocabTable`] with the pretokenization
/// pattern for that vocabulary. Both are shared behind `Arc`, so cloning is
/// cheap and one handle can be used from any number of threads at once.
/// Every operation takes `&self` and keeps its scratch space local to the
/// call.
///
/// # Example
///
/// ```ignore
/// let tokenizer = Tokenizer::from_pretrained("cl100k_base")?;
/// let tokens = tokenizer.encode("Hello, world!");
/// assert_eq!(tokenizer.count("Hello, world!"), tokens.len());
/// assert_eq!(tokenizer.decode(&tokens)?, "Hello, world!");
/// ```
#[derive(Clone)]
pub struct Tokenizer {
    table: Arc<VocabTable>,
    pretokenizer: Arc<Pretokenizer>,
    use_pcre2: bool,
    use_jit: bool,
}

impl Tokenizer {
    /// Create a tokenizer from a built table and a pretokenization pattern.
    pub fn new(table: VocabTable, pattern: &str) -> Result<Self, TokenizerError> {
        let pretokenizer = Pretokenizer::new(pattern)?;
        Ok(Self {
            table: Arc::new(table),
            pretokenizer: Arc::new(pretokenizer),
            use_pcre2: false,
            use_jit: true,
        })
    }

    /// Create a tokenizer from raw tiktoken vocabulary bytes.
    pub fn from_bytes(vocab_data: &[u8], pattern: &str) -> Result<Self, TokenizerError> {
        let ranks = load_tiktoken_bpe(vocab_data)?;
        Self::new(VocabTable::from_ranks(ranks)?, pattern)
    }

    /// Create a tokenizer from a tiktoken vocabulary file.
    pub fn from_file(vocab_path: impl AsRef<Path>, pattern: &str) -> Result<Self, TokenizerError> {
        let ranks = load_tiktoken_bpe_file(vocab_path)?;
        Self::new(VocabTable::from_ranks(ranks)?, pattern)
    }

    /// Create a tokenizer for a named vocabulary (`cl100k_base`, `o200k_base`).
    ///
    /// See [`pretrained`](super::pretrained) for where the vocabulary files
    /// are read from.
    pub fn from_pretrained(name: &str) -> Result<Self, TokenizerError> {
        super::pretrained::from_pretrained(name)
    }

    /// Switch to the PCRE2 regex backend, or back to fancy-regex.
    ///
    /// # Example
    /// ```ignore
    /// let tokenizer = Tokenizer::from_pretrained("cl100k_base")?.pcre2(true)?;
    /// ```
    ///
    /// # Errors
    /// Returns an error if the `pcre2` feature is not enabled or regex
    /// compilation fails.
    #[cfg(feature = "pcre2")]
    pub fn pcre2(mut self, use_pcre2: bool) -> Result<Self, TokenizerError> {
        self.use_pcre2 = use_pcre2;
        self.rebuild_pretokenizer()?;
        Ok(self)
    }

    /// Switch to the PCRE2 regex backend (stub when feature not enabled).
    #[cfg(not(feature = "pcre2"))]
    pub fn pcre2(self, use_pcre2: bool) -> Result<Self, TokenizerError> {
        if use_pcre2 {
            Err(TokenizerError::Pcre2NotEnabled)
        } else {
            Ok(self)
        }
    }

    /// Enable or disable JIT compilation for the PCRE2 backend.
    ///
    /// JIT is used only where the platform supports it. fancy-regex has no
    /// JIT, so the setting takes effect once PCRE2 is active.
    #[cfg(feature = "pcre2")]
    pub fn jit(mut self, use_jit: bool) -> Result<Self, TokenizerError> {
        self.use_jit = use_jit;
        if self.use_pcre2 {
            self.rebuild_pretokenizer()?;
        }
        Ok(self)
    }

    /// Enable or disable JIT compilation (no effect without PCRE2).
    #[cfg(not(feature = "pcre2"))]
    pub fn jit(mut self, use_jit: bool) -> Result<Self, TokenizerError> {
        self.use_jit = use_jit;
        Ok(self)
    }

    #[cfg(feature = "pcre2")]
    fn rebuild_pretokenizer(&mut self) -> Result<(), TokenizerError> {
        let pattern = self.pretokenizer.pattern();
        let pretokenizer = if self.use_pcre2 {
            Pretokenizer::new_pcre2(pattern, self.use_jit)?
        } else {
            Pretokenizer::new(pattern)?
        };
        self.pretokenizer = Arc::new(pretokenizer);
        Ok(())
    }

    /// Encode text to token ids.
    pub fn encode(&self, text: &str) -> Vec<TokenId> {
        self.encode_bytes(text.as_bytes())
    }

    /// Encode arbitrary bytes to token ids.
    ///
    /// Invalid UTF-8 is never rejected: those bytes bypass the pattern and
    /// come out as single-byte tokens.
    pub fn encode_bytes(&self, text: &[u8]) -> Vec<TokenId> {
        let mut tokens = Vec::with_capacity(text.len() / 3);
        for chunk in self.pretokenizer.chunks(text) {
            byte_pair_encode(chunk, &self.table, &mut tokens);
        }
        tokens
    }

    /// Encode text using Rayon parallel processing over chunks.
    ///
    /// Only beneficial for very large texts; the output is identical to
    /// [`encode`](Self::encode).
    pub fn encode_rayon(&self, text: &str) -> Vec<TokenId> {
        let chunks: Vec<&[u8]> = self.pretokenizer.chunks(text.as_bytes()).collect();
        let results: Vec<Vec<TokenId>> = chunks
            .par_iter()
            .map(|chunk| {
                let mut out = Vec::new();
                byte_pair_encode(chunk, &self.table, &mut out);
                out
            })
            .collect();
        results.into_iter().flatten().collect()
    }

    /// Number of tokens [`encode`](Self::encode) would produce.
    pub fn count(&self, text: &str) -> usize {
        self.count_bytes(text.as_bytes())
    }

    /// Number of tokens [`encode_bytes`](Self::encode_bytes) would produce.
    pub fn count_bytes(&self, text: &[u8]) -> usize {
        self.pretokenizer
            .chunks(text)
            .map(|chunk| byte_pair_count(chunk, &self.table))
            .sum()
    }

    /// Count tokens, stopping early once the count reaches `limit`.
    ///
    /// Chunks are processed in order. The result is the running total at the
    /// first chunk boundary where it is `>= limit`, or the full count if that
    /// never happens. A `limit` of 0 returns 0 without looking at the text.
    pub fn count_till_limit(&self, text: &str, limit: usize) -> usize {
        self.count_bytes_till_limit(text.as_bytes(), limit)
    }

    /// Byte-input form of [`count_till_limit`](Self::count_till_limit).
    pub fn count_bytes_till_limit(&self, text: &[u8], limit: usize) -> usize {
        if limit == 0 {
            return 0;
        }
        let mut total = 0;
        for chunk in self.pretokenizer.chunks(text) {
            total += byte_pair_count(chunk, &self.table);
            if total >= limit {
                break;
            }
        }
        total
    }

    /// `Some(count)` if `text` fits in `limit` tokens, `None` otherwise.
    ///
    /// Stops as soon as the running count exceeds `limit`.
    pub fn count_within(&self, text: &str, limit: usize) -> Option<usize> {
        let count = self.count_till_limit(text, limit.saturating_add(1));
        (count <= limit).then_some(count)
    }

    /// Decode token ids to bytes.
    ///
    /// # Errors
    /// [`TokenizerError::InvalidTokenId`] for the first id outside the
    /// vocabulary, [`TokenizerError::AllocationFailure`] if the output cannot
    /// be allocated.
    pub fn decode_bytes(&self, tokens: &[TokenId]) -> Result<Vec<u8>, TokenizerError> {
        decoder::decode_bytes(&self.table, tokens)
    }

    /// Decode token ids to a string.
    ///
    /// Fails with [`TokenizerError::MalformedText`] when the ids split a
    /// UTF-8 character; use [`decode_lossy`](Self::decode_lossy) or
    /// [`decode_bytes`](Self::decode_bytes) for such sequences.
    pub fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        decoder::decode_text(&self.table, tokens)
    }

    /// Decode token ids to a string, replacing invalid UTF-8 with U+FFFD.
    pub fn decode_lossy(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        let bytes = self.decode_bytes(tokens)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Batch encode multiple texts in parallel.
    pub fn encode_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<Vec<TokenId>> {
        texts
            .par_iter()
            .map(|text| self.encode(text.as_ref()))
            .collect()
    }

    /// Batch count multiple texts in parallel.
    pub fn count_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<usize> {
        texts
            .par_iter()
            .map(|text| self.count(text.as_ref()))
            .collect()
    }

    /// Batch decode multiple token lists in parallel.
    pub fn decode_batch(&self, token_lists: &[Vec<TokenId>]) -> Result<Vec<String>, TokenizerError> {
        token_lists
            .par_iter()
            .map(|tokens| self.decode(tokens))
            .collect()
    }

    /// Number of entries in the vocabulary. Valid ids are `0..vocab_size()`.
    pub fn vocab_size(&self) -> usize {
        self.table.len()
    }

    /// The vocabulary table.
    pub fn table(&self) -> &VocabTable {
        &self.table
    }

    /// The pretokenization pattern.
    pub fn pattern(&self) -> &str {
        self.pretokenizer.pattern()
    }
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer")
            .field("vocab_size", &self.table.len())
            .field("merge_count", &self.table.merge_count())
            .field("pattern", &self.pretokenizer.pattern())
            .field("pcre2", &self.pretokenizer.is_pcre2())
            .finish()
    }
}
