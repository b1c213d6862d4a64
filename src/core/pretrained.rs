//! Named vocabularies.
//!
//! - `cl100k_base` - OpenAI GPT-4, GPT-3.5-turbo (~100k tokens)
//! - `o200k_base` - OpenAI GPT-4o (~200k tokens)
//!
//! Vocabulary files are not bundled with the crate. They are read as
//! `<name>.tiktoken` from the directory named by the `BPE_VOCAB_DIR`
//! environment variable, or from `vocabs/` when it is unset.
//!
//! # Example
//!
//! ```ignore
//! use bpecount::pretrained::from_pretrained;
//!
//! let tokenizer = from_pretrained("o200k_base")?;
//! let tokens = tokenizer.encode("Hello, world!");
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use super::pretokenize::{CL100K_BASE_PATTERN, O200K_BASE_PATTERN};
use super::table::VocabTable;
use super::tokenizer::{Tokenizer, TokenizerError};
use super::vocab::{load_tiktoken_bpe, VocabError};

/// Environment variable naming the vocabulary directory.
pub const VOCAB_DIR_ENV: &str = "BPE_VOCAB_DIR";

/// Vocabulary directory used when [`VOCAB_DIR_ENV`] is unset.
pub const DEFAULT_VOCAB_DIR: &str = "vocabs";

/// Supported named vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PretrainedVocab {
    /// OpenAI cl100k_base (GPT-4, GPT-3.5-turbo)
    Cl100kBase,
    /// OpenAI o200k_base (GPT-4o)
    O200kBase,
}

impl PretrainedVocab {
    /// Parse vocabulary name from string.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cl100k_base" => Some(Self::Cl100kBase),
            "o200k_base" => Some(Self::O200kBase),
            _ => None,
        }
    }

    /// Get all supported vocabulary names.
    pub fn supported_names() -> &'static [&'static str] {
        &["cl100k_base", "o200k_base"]
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Cl100kBase => "cl100k_base",
            Self::O200kBase => "o200k_base",
        }
    }

    /// Pretokenization pattern this vocabulary was trained with.
    pub fn pattern(self) -> &'static str {
        match self {
            Self::Cl100kBase => CL100K_BASE_PATTERN,
            Self::O200kBase => O200K_BASE_PATTERN,
        }
    }

    /// File name of the vocabulary inside the vocabulary directory.
    pub fn file_name(self) -> String {
        format!("{}.tiktoken", self.name())
    }
}

/// Directory named vocabularies are read from.
pub fn vocab_dir() -> PathBuf {
    std::env::var_os(VOCAB_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_VOCAB_DIR))
}

/// Create a tokenizer by vocabulary name, reading from [`vocab_dir`].
pub fn from_pretrained(name: &str) -> Result<Tokenizer, TokenizerError> {
    from_pretrained_in(name, vocab_dir())
}

/// Create a tokenizer by vocabulary name, reading from `dir`.
pub fn from_pretrained_in(name: &str, dir: impl AsRef<Path>) -> Result<Tokenizer, TokenizerError> {
    let vocab = PretrainedVocab::from_name(name).ok_or_else(|| {
        TokenizerError::UnknownPretrained(format!(
            "{}. Supported: {}",
            name,
            PretrainedVocab::supported_names().join(", ")
        ))
    })?;

    let path = dir.as_ref().join(vocab.file_name());
    let data = std::fs::read(&path).map_err(VocabError::from)?;
    debug!(name, path = %path.display(), bytes = data.len(), "loading named vocabulary");
    from_vocab_bytes(vocab, &data)
}

/// Create a tokenizer for `vocab` from tiktoken data already in memory.
pub fn from_vocab_bytes(vocab: PretrainedVocab, data: &[u8]) -> Result<Tokenizer, TokenizerError> {
    let table = VocabTable::from_ranks(load_tiktoken_bpe(data)?)?;
    debug!(
        name = vocab.name(),
        vocab_size = table.len(),
        "named vocabulary ready"
    );
    Tokenizer::new(table, vocab.pattern())
}
