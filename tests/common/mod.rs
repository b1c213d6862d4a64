//! Shared fixtures for integration tests.
#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine};
use bpecount::{TokenId, Tokenizer, VocabTable};

/// Splits letters into pairs, so "abab" is two chunks of one token each.
pub const PAIR_PATTERN: &str = r"[a-d]{1,2}|\s+|.";

/// `a b c d` at ids 0-3, `ab` at id 4 (merge rank 0), then every other byte
/// from id 5 on.
pub fn toy_table() -> VocabTable {
    let mut entries: Vec<Vec<u8>> = b"abcd".iter().map(|&b| vec![b]).collect();
    entries.push(b"ab".to_vec());
    entries.extend((0..=u8::MAX).filter(|b| !b"abcd".contains(b)).map(|b| vec![b]));
    VocabTable::from_merges(entries, &[(0, 1)]).unwrap()
}

pub fn toy_tokenizer(pattern: &str) -> Tokenizer {
    Tokenizer::new(toy_table(), pattern).unwrap()
}

/// Tokens for a small English-ish vocabulary, in rank order after the 256
/// single bytes. Every multi-byte token is reachable by merging.
pub const ENGLISH_TOKENS: &[&str] = &[
    "th", "he", "the", " t", " the", "in", "ing", "er", " a", "an", " an", "and", " and", "on",
    "re", "ou", "es", "st", "en", "at", "  ", "    ", "\n\n", "00", "000", "é", "ll", "'s", "is",
    " is", "it", " it", "or", "ed", " o", " of", "of",
];

/// Tiktoken-format vocabulary data: the 256 single bytes at ranks 0-255,
/// then `extra` in order.
pub fn tiktoken_data(extra: &[&str]) -> Vec<u8> {
    let mut out = String::new();
    let singles = (0..=u8::MAX).map(|b| vec![b]);
    let extras = extra.iter().map(|s| s.as_bytes().to_vec());
    for (rank, bytes) in singles.chain(extras).enumerate() {
        out.push_str(&STANDARD.encode(&bytes));
        out.push(' ');
        out.push_str(&rank.to_string());
        out.push('\n');
    }
    out.into_bytes()
}

pub fn english_tokenizer(pattern: &str) -> Tokenizer {
    Tokenizer::from_bytes(&tiktoken_data(ENGLISH_TOKENS), pattern).unwrap()
}

pub fn byte_id(tokenizer: &Tokenizer, byte: u8) -> TokenId {
    tokenizer.table().byte_id(byte)
}

/// xorshift64, enough to spread test inputs around.
pub fn pseudo_random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}
