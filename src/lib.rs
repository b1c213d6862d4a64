//! bpecount - byte-level BPE tokenization and token counting.
//!
//! Encodes text to token ids, decodes ids back to text, and counts tokens
//! (optionally stopping early at a limit) for tiktoken-style vocabularies
//! such as `cl100k_base` and `o200k_base`.
//!
//! ```ignore
//! use bpecount::Tokenizer;
//!
//! let tokenizer = Tokenizer::from_pretrained("cl100k_base")?;
//! let tokens = tokenizer.encode("Hello, world!");
//! assert_eq!(tokenizer.decode(&tokens)?, "Hello, world!");
//!
//! // Does this prompt fit in 4096 tokens?
//! let fits = tokenizer.count_within(prompt, 4096).is_some();
//! ```

pub mod core;

pub use core::pretrained;
pub use core::{
    MergeRule, PretrainedVocab, Rank, StreamingDecoder, TokenId, Tokenizer, TokenizerError,
    VocabError, VocabTable, CL100K_BASE_PATTERN, O200K_BASE_PATTERN,
};
