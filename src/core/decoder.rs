//! Token ids back to bytes and text.
//!
//! Decoding is a plain table lookup per id; it never consults the
//! pretokenizer. A caller-supplied id sequence can split a multi-byte UTF-8
//! character, so the concatenated bytes are not guaranteed to be valid text:
//! [`Tokenizer::decode`] reports that as [`TokenizerError::MalformedText`],
//! [`Tokenizer::decode_bytes`] returns the raw bytes, and
//! [`Tokenizer::decode_lossy`] substitutes U+FFFD.

use super::table::{TokenId, VocabTable};
use super::tokenizer::{Tokenizer, TokenizerError};

/// Concatenate the payloads of `tokens`.
///
/// Fails on the first id outside the vocabulary. The output buffer is
/// reserved up front, so a failed allocation is reported instead of
/// aborting.
pub(crate) fn decode_bytes(
    table: &VocabTable,
    tokens: &[TokenId],
) -> Result<Vec<u8>, TokenizerError> {
    let mut total = 0usize;
    for &id in tokens {
        total += table
            .bytes(id)
            .ok_or(TokenizerError::InvalidTokenId(id))?
            .len();
    }

    let mut out = Vec::new();
    out.try_reserve_exact(total)?;
    for bytes in tokens.iter().filter_map(|&id| table.bytes(id)) {
        out.extend_from_slice(bytes);
    }
    Ok(out)
}

/// Decode to a `String`, rejecting invalid UTF-8.
pub(crate) fn decode_text(table: &VocabTable, tokens: &[TokenId]) -> Result<String, TokenizerError> {
    let bytes = decode_bytes(table, tokens)?;
    String::from_utf8(bytes).map_err(|e| TokenizerError::MalformedText {
        valid_up_to: e.utf8_error().valid_up_to(),
    })
}

/// A decoder for token-by-token output whose boundaries may split UTF-8
/// characters.
///
/// Bytes are buffered until they form complete characters. A sequence that
/// can never become valid is emitted as U+FFFD as soon as that is known; an
/// incomplete trailing sequence stays buffered until more tokens arrive or
/// [`flush`](Self::flush) is called.
///
/// # Example
///
/// ```ignore
/// let tokenizer = Tokenizer::from_pretrained("cl100k_base")?;
/// let mut decoder = StreamingDecoder::new(&tokenizer);
///
/// for token_id in token_stream {
///     if let Some(text) = decoder.add_token(token_id)? {
///         print!("{}", text);
///     }
/// }
/// print!("{}", decoder.flush());
/// ```
pub struct StreamingDecoder<'a> {
    table: &'a VocabTable,
    buffer: Vec<u8>,
}

impl<'a> StreamingDecoder<'a> {
    /// Create a streaming decoder over `tokenizer`'s vocabulary.
    pub fn new(tokenizer: &'a Tokenizer) -> Self {
        Self {
            table: tokenizer.table(),
            buffer: Vec::with_capacity(16),
        }
    }

    /// Add a token and return any text that is now complete.
    pub fn add_token(&mut self, token_id: TokenId) -> Result<Option<String>, TokenizerError> {
        let bytes = self
            .table
            .bytes(token_id)
            .ok_or(TokenizerError::InvalidTokenId(token_id))?;
        self.buffer.extend_from_slice(bytes);
        Ok(self.extract_complete_utf8())
    }

    /// Add several tokens at once.
    ///
    /// Either all tokens are accepted or, on an unknown id, none are.
    pub fn add_tokens(&mut self, token_ids: &[TokenId]) -> Result<Option<String>, TokenizerError> {
        let bytes = decode_bytes(self.table, token_ids)?;
        self.buffer.extend_from_slice(&bytes);
        Ok(self.extract_complete_utf8())
    }

    /// Drain the buffer, replacing an incomplete trailing sequence with U+FFFD.
    pub fn flush(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        text
    }

    /// Discard any buffered bytes.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Whether bytes are waiting for the rest of their character.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Number of buffered bytes.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn extract_complete_utf8(&mut self) -> Option<String> {
        let mut text = String::new();
        let mut consumed = 0;

        while consumed < self.buffer.len() {
            let rest = &self.buffer[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.buffer.len();
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    text.push_str(std::str::from_utf8(&rest[..valid_up_to]).unwrap_or_default());
                    match e.error_len() {
                        // Invalid no matter what follows.
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid_up_to + bad;
                        }
                        // Incomplete: wait for more bytes.
                        None => {
                            consumed += valid_up_to;
                            break;
                        }
                    }
                }
            }
        }

        self.buffer.drain(..consumed);
        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pretokenize::CL100K_BASE_PATTERN;
    use crate::core::table::tests::toy_table;

    fn toy_tokenizer() -> Tokenizer {
        Tokenizer::new(toy_table(), CL100K_BASE_PATTERN).unwrap()
    }

    fn byte_tokens(tokenizer: &Tokenizer, bytes: &[u8]) -> Vec<TokenId> {
        bytes.iter().map(|&b| tokenizer.table().byte_id(b)).collect()
    }

    #[test]
    fn test_decode_bytes() {
        let table = toy_table();
        assert_eq!(decode_bytes(&table, &[4, 2, 3]).unwrap(), b"abcd");
        assert!(decode_bytes(&table, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_invalid_id() {
        let table = toy_table();
        let err = decode_bytes(&table, &[0, 999, 1]).unwrap_err();
        assert!(matches!(err, TokenizerError::InvalidTokenId(999)), "got {err:?}");
    }

    #[test]
    fn test_decode_text_rejects_split_character() {
        let table = toy_table();
        // First two bytes of "é" (0xC3 0xA9) swapped.
        let tokens = [table.byte_id(0xa9), table.byte_id(0xc3)];
        let err = decode_text(&table, &tokens).unwrap_err();
        assert!(
            matches!(err, TokenizerError::MalformedText { valid_up_to: 0 }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_streaming_simple_ascii() {
        let tokenizer = toy_tokenizer();
        let mut decoder = StreamingDecoder::new(&tokenizer);
        assert_eq!(decoder.add_token(4).unwrap(), Some("ab".to_string()));
        assert_eq!(decoder.add_token(2).unwrap(), Some("c".to_string()));
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_streaming_split_character() {
        let tokenizer = toy_tokenizer();
        let mut decoder = StreamingDecoder::new(&tokenizer);
        // 🦀 = F0 9F A6 80
        let tokens = byte_tokens(&tokenizer, "🦀".as_bytes());

        assert_eq!(decoder.add_token(tokens[0]).unwrap(), None);
        assert_eq!(decoder.add_token(tokens[1]).unwrap(), None);
        assert_eq!(decoder.add_token(tokens[2]).unwrap(), None);
        assert_eq!(decoder.pending_bytes(), 3);
        assert_eq!(decoder.add_token(tokens[3]).unwrap(), Some("🦀".to_string()));
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_streaming_mixed_complete_incomplete() {
        let tokenizer = toy_tokenizer();
        let mut decoder = StreamingDecoder::new(&tokenizer);
        let mut tokens = vec![4];
        tokens.extend(byte_tokens(&tokenizer, &"é".as_bytes()[..1]));

        assert_eq!(decoder.add_tokens(&tokens).unwrap(), Some("ab".to_string()));
        assert_eq!(decoder.pending_bytes(), 1);
        let rest = byte_tokens(&tokenizer, &"é".as_bytes()[1..]);
        assert_eq!(decoder.add_tokens(&rest).unwrap(), Some("é".to_string()));
    }

    #[test]
    fn test_streaming_invalid_bytes_replaced() {
        let tokenizer = toy_tokenizer();
        let mut decoder = StreamingDecoder::new(&tokenizer);
        let tokens = byte_tokens(&tokenizer, b"\xffab");
        assert_eq!(
            decoder.add_tokens(&tokens).unwrap(),
            Some("\u{fffd}ab".to_string())
        );
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_streaming_flush_and_reset() {
        let tokenizer = toy_tokenizer();
        let mut decoder = StreamingDecoder::new(&tokenizer);
        let partial = byte_tokens(&tokenizer, &"世".as_bytes()[..2]);

        assert_eq!(decoder.add_tokens(&partial).unwrap(), None);
        assert_eq!(decoder.flush(), "\u{fffd}");
        assert!(!decoder.has_pending());

        decoder.add_tokens(&partial).unwrap();
        decoder.reset();
        assert_eq!(decoder.pending_bytes(), 0);
        assert_eq!(decoder.flush(), "");
    }

    #[test]
    fn test_streaming_unknown_token() {
        let tokenizer = toy_tokenizer();
        let mut decoder = StreamingDecoder::new(&tokenizer);
        assert!(decoder.add_token(999).is_err());
        assert!(decoder.add_tokens(&[0, 999]).is_err());
        assert!(!decoder.has_pending(), "failed batch must not leave bytes behind");
    }
}
