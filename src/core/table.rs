//! Immutable vocabulary table: id ↔ bytes plus the merge-rank table.
//!
//! Merges are keyed by *token-id pairs*: `(left_id, right_id) → (rank,
//! result_id)`. The merge loop therefore never hashes variable-length byte
//! strings; only the initial byte → id step touches byte payloads, and that
//! goes through a flat 256-entry array.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::vocab::VocabError;

/// Token identifier. Valid ids are `0..VocabTable::len()`.
pub type TokenId = u32;

/// Merge priority. Lower ranks merge first.
pub type Rank = u32;

/// The merge that applies to an adjacent pair of tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRule {
    /// Priority of the merge.
    pub rank: Rank,
    /// Entry whose payload is the concatenation of the pair.
    pub result: TokenId,
}

/// Vocabulary entries, reverse lookup and merge ranks for one vocabulary.
///
/// A table is built once and never mutated. Every byte value has a
/// single-byte entry, so any input can be represented.
#[derive(Debug)]
pub struct VocabTable {
    /// Decode table, indexed by id.
    entries: Vec<Vec<u8>>,
    /// Reverse lookup: bytes → id.
    lookup: FxHashMap<Vec<u8>, TokenId>,
    /// Pair merge lookup: (left, right) → rule.
    merges: FxHashMap<(TokenId, TokenId), MergeRule>,
    /// Single-byte entries, indexed by byte value.
    byte_ids: [TokenId; 256],
}

impl VocabTable {
    /// Build a table from explicit entries and an ordered merge list.
    ///
    /// `entries[id]` is the payload of token `id`. `merges` lists input pairs
    /// in priority order: the first pair has rank 0.
    pub fn from_merges(
        entries: Vec<Vec<u8>>,
        merges: &[(TokenId, TokenId)],
    ) -> Result<Self, VocabError> {
        let mut lookup = FxHashMap::with_capacity_and_hasher(entries.len(), Default::default());
        for (id, bytes) in entries.iter().enumerate() {
            let id = id as TokenId;
            if bytes.is_empty() {
                return Err(VocabError::EmptyEntry(id));
            }
            if let Some(first) = lookup.insert(bytes.clone(), id) {
                return Err(VocabError::DuplicateEntry { first, second: id });
            }
        }
        let byte_ids = byte_ids(&lookup)?;

        let mut merge_map = FxHashMap::with_capacity_and_hasher(merges.len(), Default::default());
        for (rank, &(left, right)) in merges.iter().enumerate() {
            let rank = rank as Rank;
            let (Some(left_bytes), Some(right_bytes)) =
                (entries.get(left as usize), entries.get(right as usize))
            else {
                let id = if (left as usize) < entries.len() { right } else { left };
                return Err(VocabError::UnknownMergeInput { rank, id });
            };

            let mut merged = Vec::with_capacity(left_bytes.len() + right_bytes.len());
            merged.extend_from_slice(left_bytes);
            merged.extend_from_slice(right_bytes);
            let result = *lookup
                .get(&merged)
                .ok_or(VocabError::MergeResultMissing { rank, left, right })?;

            if merge_map
                .insert((left, right), MergeRule { rank, result })
                .is_some()
            {
                return Err(VocabError::DuplicateMerge { left, right });
            }
        }

        let table = Self {
            entries,
            lookup,
            merges: merge_map,
            byte_ids,
        };
        table.log_built("explicit merges");
        Ok(table)
    }

    /// Build a table from a tiktoken rank map (rank == token id).
    ///
    /// Ranks must be dense (`0..len`). Merge rules are derived from the
    /// entries: every split of a multi-byte entry into two entries is a rule
    /// whose rank is the rank of the whole entry. This reproduces tiktoken's
    /// "merge the adjacent pair whose concatenation has the lowest rank".
    pub fn from_ranks(ranks: FxHashMap<Vec<u8>, Rank>) -> Result<Self, VocabError> {
        let n = ranks.len();
        let mut entries = vec![Vec::new(); n];
        for (bytes, &rank) in &ranks {
            let slot = entries.get_mut(rank as usize).ok_or_else(|| VocabError::NonDenseIds {
                expected: n,
                max_id: ranks.values().copied().max().unwrap_or(rank),
            })?;
            if bytes.is_empty() {
                return Err(VocabError::EmptyEntry(rank));
            }
            if !slot.is_empty() {
                return Err(VocabError::DuplicateId(rank));
            }
            *slot = bytes.clone();
        }
        let byte_ids = byte_ids(&ranks)?;

        let mut merges = FxHashMap::default();
        for (id, bytes) in entries.iter().enumerate() {
            for split in 1..bytes.len() {
                let (left, right) = bytes.split_at(split);
                if let (Some(&left_id), Some(&right_id)) = (ranks.get(left), ranks.get(right)) {
                    let id = id as TokenId;
                    merges.insert(
                        (left_id, right_id),
                        MergeRule {
                            rank: id,
                            result: id,
                        },
                    );
                }
            }
        }

        let table = Self {
            entries,
            lookup: ranks,
            merges,
            byte_ids,
        };
        table.log_built("tiktoken ranks");
        Ok(table)
    }

    fn log_built(&self, source: &str) {
        debug!(
            source,
            vocab_size = self.entries.len(),
            merge_count = self.merges.len(),
            "vocabulary table built"
        );
    }

    /// Number of entries. Valid ids are `0..len()`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed table (it holds at least 256 entries).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of merge rules.
    pub fn merge_count(&self) -> usize {
        self.merges.len()
    }

    /// Payload of a token, or `None` when `id` is out of range.
    #[inline]
    pub fn bytes(&self, id: TokenId) -> Option<&[u8]> {
        self.entries.get(id as usize).map(Vec::as_slice)
    }

    /// Token whose payload is exactly `bytes`.
    #[inline]
    pub fn id(&self, bytes: &[u8]) -> Option<TokenId> {
        self.lookup.get(bytes).copied()
    }

    /// Single-byte token for `byte`.
    #[inline]
    pub fn byte_id(&self, byte: u8) -> TokenId {
        self.byte_ids[byte as usize]
    }

    /// Merge rule for an adjacent pair, if any.
    #[inline]
    pub fn merge(&self, left: TokenId, right: TokenId) -> Option<MergeRule> {
        self.merges.get(&(left, right)).copied()
    }
}

fn byte_ids(lookup: &FxHashMap<Vec<u8>, TokenId>) -> Result<[TokenId; 256], VocabError> {
    let mut ids = [0; 256];
    for byte in 0..=u8::MAX {
        ids[byte as usize] = *lookup.get([byte].as_slice()).ok_or(VocabError::MissingByte(byte))?;
    }
    Ok(ids)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// `a b c d` at ids 0-3, `ab` at id 4 (merge rank 0), then every other
    /// byte from id 5 on.
    pub(crate) fn toy_table() -> VocabTable {
        let mut entries: Vec<Vec<u8>> = b"abcd".iter().map(|&b| vec![b]).collect();
        entries.push(b"ab".to_vec());
        entries.extend((0..=u8::MAX).filter(|b| !b"abcd".contains(b)).map(|b| vec![b]));
        VocabTable::from_merges(entries, &[(0, 1)]).unwrap()
    }

    fn all_bytes() -> Vec<Vec<u8>> {
        (0..=u8::MAX).map(|b| vec![b]).collect()
    }

    fn rank_map(extra: &[&[u8]]) -> FxHashMap<Vec<u8>, Rank> {
        let mut map: FxHashMap<Vec<u8>, Rank> = all_bytes()
            .into_iter()
            .enumerate()
            .map(|(i, b)| (b, i as Rank))
            .collect();
        for (i, bytes) in extra.iter().enumerate() {
            map.insert(bytes.to_vec(), 256 + i as Rank);
        }
        map
    }

    #[test]
    fn test_toy_lookups() {
        let table = toy_table();
        assert_eq!(table.len(), 257);
        assert_eq!(table.bytes(4), Some(b"ab".as_slice()));
        assert_eq!(table.id(b"ab"), Some(4));
        assert_eq!(table.byte_id(b'c'), 2);
        assert_eq!(table.merge(0, 1), Some(MergeRule { rank: 0, result: 4 }));
        assert_eq!(table.merge(1, 0), None);
        assert_eq!(table.bytes(999), None);
        assert_eq!(table.merge_count(), 1);
    }

    #[test]
    fn test_missing_byte_rejected() {
        let entries = vec![b"a".to_vec(), b"b".to_vec()];
        let err = VocabTable::from_merges(entries, &[]).unwrap_err();
        assert!(matches!(err, VocabError::MissingByte(0)), "got {err:?}");
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let mut entries = all_bytes();
        entries.push(b"a".to_vec());
        let err = VocabTable::from_merges(entries, &[]).unwrap_err();
        assert!(
            matches!(err, VocabError::DuplicateEntry { first: 97, second: 256 }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_empty_entry_rejected() {
        let mut entries = all_bytes();
        entries.push(Vec::new());
        let err = VocabTable::from_merges(entries, &[]).unwrap_err();
        assert!(matches!(err, VocabError::EmptyEntry(256)), "got {err:?}");
    }

    #[test]
    fn test_merge_validation() {
        let err = VocabTable::from_merges(all_bytes(), &[(97, 1000)]).unwrap_err();
        assert!(
            matches!(err, VocabError::UnknownMergeInput { rank: 0, id: 1000 }),
            "got {err:?}"
        );

        let err = VocabTable::from_merges(all_bytes(), &[(97, 98)]).unwrap_err();
        assert!(
            matches!(err, VocabError::MergeResultMissing { rank: 0, left: 97, right: 98 }),
            "got {err:?}"
        );

        let mut entries = all_bytes();
        entries.push(b"ab".to_vec());
        let err = VocabTable::from_merges(entries, &[(97, 98), (97, 98)]).unwrap_err();
        assert!(matches!(err, VocabError::DuplicateMerge { left: 97, right: 98 }), "got {err:?}");
    }

    #[test]
    fn test_from_ranks_derives_every_split() {
        let table = VocabTable::from_ranks(rank_map(&[b"ab", b"bc", b"abc"])).unwrap();
        assert_eq!(table.len(), 259);
        let ab = table.id(b"ab").unwrap();
        let bc = table.id(b"bc").unwrap();
        let abc = table.id(b"abc").unwrap();
        assert_eq!(table.merge(97, 98), Some(MergeRule { rank: ab, result: ab }));
        // Both decompositions of "abc" lead to the same entry and rank.
        assert_eq!(table.merge(ab, 99), Some(MergeRule { rank: abc, result: abc }));
        assert_eq!(table.merge(97, bc), Some(MergeRule { rank: abc, result: abc }));
        assert_eq!(table.merge_count(), 4);
    }

    #[test]
    fn test_from_ranks_requires_dense_ids() {
        let mut map = rank_map(&[]);
        map.insert(b"xy".to_vec(), 300);
        let err = VocabTable::from_ranks(map).unwrap_err();
        assert!(
            matches!(err, VocabError::NonDenseIds { expected: 257, max_id: 300 }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_from_ranks_requires_every_byte() {
        let mut map = rank_map(&[]);
        map.remove([0xffu8].as_slice());
        map.insert(b"xy".to_vec(), 255);
        let err = VocabTable::from_ranks(map).unwrap_err();
        assert!(matches!(err, VocabError::MissingByte(0xff)), "got {err:?}");
    }
}
