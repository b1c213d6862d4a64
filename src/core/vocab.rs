//! Vocabulary loading for the tiktoken BPE format.
//!
//! Each line of a `.tiktoken` file holds a base64-encoded token followed by a
//! space and its rank:
//!
//! ```text
//! SGVsbG8= 0
//! V29ybGQ= 1
//! IQ== 2
//! ```
//!
//! For tiktoken vocabularies the rank doubles as the token id, and it is also
//! the merge priority of the token: lower ranks merge first. The loader only
//! parses; invariants such as "every byte has an entry" are checked when the
//! parsed map is turned into a [`VocabTable`](super::table::VocabTable).

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::table::{Rank, TokenId};

/// Errors raised while loading vocabulary data or assembling a table from it.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("Invalid base64 encoding: {0}")]
    Base64Error(#[from] base64::DecodeError),
    #[error("Invalid line format: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Entry {0} has an empty payload")]
    EmptyEntry(TokenId),
    #[error("Entries {first} and {second} share the same bytes")]
    DuplicateEntry { first: TokenId, second: TokenId },
    #[error("Rank {0} is assigned to more than one entry")]
    DuplicateId(Rank),
    #[error("Ids are not dense: expected {expected} entries, highest id is {max_id}")]
    NonDenseIds { expected: usize, max_id: TokenId },
    #[error("No single-byte entry for byte 0x{0:02x}")]
    MissingByte(u8),
    #[error("Merge at rank {rank} references unknown token {id}")]
    UnknownMergeInput { rank: Rank, id: TokenId },
    #[error("Merge ({left}, {right}) at rank {rank} produces bytes that are not in the vocabulary")]
    MergeResultMissing {
        rank: Rank,
        left: TokenId,
        right: TokenId,
    },
    #[error("Merge ({left}, {right}) is listed more than once")]
    DuplicateMerge { left: TokenId, right: TokenId },
}

/// Load a tiktoken BPE vocabulary from raw bytes.
///
/// Format: `base64_token rank\n` per line. Blank lines are skipped, and a
/// trailing `\r` on a line is tolerated.
pub fn load_tiktoken_bpe(data: &[u8]) -> Result<FxHashMap<Vec<u8>, Rank>, VocabError> {
    let mut encoder = FxHashMap::default();

    for (line_no, line) in data.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        let space_pos = line.iter().rposition(|&b| b == b' ').ok_or_else(|| {
            VocabError::ParseError(format!("line {}: missing space separator", line_no + 1))
        })?;

        let token = STANDARD.decode(&line[..space_pos])?;

        let rank_str = std::str::from_utf8(&line[space_pos + 1..]).map_err(|_| {
            VocabError::ParseError(format!("line {}: invalid UTF-8 in rank", line_no + 1))
        })?;
        let rank: Rank = rank_str.trim().parse().map_err(|_| {
            VocabError::ParseError(format!("line {}: invalid rank {:?}", line_no + 1, rank_str))
        })?;

        if encoder.insert(token, rank).is_some() {
            return Err(VocabError::ParseError(format!(
                "line {}: token listed twice",
                line_no + 1
            )));
        }
    }

    Ok(encoder)
}

/// Load a tiktoken BPE vocabulary from a file path.
pub fn load_tiktoken_bpe_file(
    path: impl AsRef<Path>,
) -> Result<FxHashMap<Vec<u8>, Rank>, VocabError> {
    let data = std::fs::read(path)?;
    load_tiktoken_bpe(&data)
}
