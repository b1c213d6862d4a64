//! Core tokenization engine for bpecount.
//!
//! # Architecture
//!
//! - [`VocabTable`]: immutable id ↔ bytes table with merge ranks keyed by
//!   token-id pairs
//! - [`vocab`]: vocabulary loading for the tiktoken format
//! - [`Pretokenizer`]: splits text into chunks with a fixed pattern
//! - [`bpe`]: greedy rank-ordered merging of a single chunk
//! - [`Tokenizer`]: shared handle with the encode/count/decode API
//! - [`StreamingDecoder`]: UTF-8 safe decoder for token-by-token output
//! - [`pretrained`]: named vocabularies (`cl100k_base`, `o200k_base`)
//!
//! # Performance
//!
//! - Merge lookups on `(u32, u32)` keys in an `FxHashMap`, never on byte strings
//! - Linked-list merging; min-heap selection for long chunks
//! - Counting never materializes token ids, and stops early under a limit
//! - Rayon parallelism for batch operations
//! - Optional PCRE2 with JIT for pretokenization

pub mod bpe;
mod decoder;
pub mod pretokenize;
pub mod pretrained;
mod table;
mod tokenizer;
pub mod vocab;

pub use bpe::{byte_pair_count, byte_pair_encode};
pub use decoder::StreamingDecoder;
pub use pretokenize::{Chunks, Pretokenizer, CL100K_BASE_PATTERN, O200K_BASE_PATTERN};
pub use pretrained::{from_pretrained, PretrainedVocab};
pub use table::{MergeRule, Rank, TokenId, VocabTable};
pub use tokenizer::{Tokenizer, TokenizerError};
pub use vocab::{load_tiktoken_bpe, load_tiktoken_bpe_file, VocabError};
