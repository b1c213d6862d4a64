//! Greedy rank-ordered byte-pair merging for a single chunk.
//!
//! A chunk starts as one symbol per byte. Each step merges the adjacent pair
//! with the globally lowest merge rank (leftmost on equal rank) until no
//! adjacent pair has a merge rule.
//!
//! Symbols live in a flat-array doubly-linked list, so a merge is O(1). The
//! minimum is found by a linear scan for short chunks and by a lazily
//! invalidated min-heap for long ones.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use smallvec::SmallVec;

use super::table::{Rank, TokenId, VocabTable};

/// Chunks up to this many bytes use the linear scan.
const LINEAR_SCAN_MAX: usize = 32;

const NONE: u32 = u32::MAX;

/// A symbol in the merge list.
///
/// `rank`/`result` cache the rule for merging this symbol with its successor;
/// `rank == Rank::MAX` means there is none.
#[derive(Clone, Copy)]
struct Node {
    token_id: TokenId,
    rank: Rank,
    result: TokenId,
    prev: u32,
    next: u32,
}

struct Symbols<'a> {
    table: &'a VocabTable,
    nodes: SmallVec<[Node; LINEAR_SCAN_MAX]>,
    len: usize,
}

impl<'a> Symbols<'a> {
    fn new(piece: &[u8], table: &'a VocabTable) -> Self {
        let n = piece.len();
        let mut nodes: SmallVec<[Node; LINEAR_SCAN_MAX]> = SmallVec::with_capacity(n);
        for (i, &byte) in piece.iter().enumerate() {
            nodes.push(Node {
                token_id: table.byte_id(byte),
                rank: Rank::MAX,
                result: 0,
                prev: if i > 0 { (i - 1) as u32 } else { NONE },
                next: if i + 1 < n { (i + 1) as u32 } else { NONE },
            });
        }
        let mut symbols = Self {
            table,
            nodes,
            len: n,
        };
        for i in 0..n.saturating_sub(1) {
            symbols.refresh(i);
        }
        symbols
    }

    /// Recompute the cached rule for node `i` and its successor.
    #[inline]
    fn refresh(&mut self, i: usize) -> Rank {
        let next = self.nodes[i].next;
        let rule = if next == NONE {
            None
        } else {
            self.table
                .merge(self.nodes[i].token_id, self.nodes[next as usize].token_id)
        };
        let node = &mut self.nodes[i];
        match rule {
            Some(rule) => {
                node.rank = rule.rank;
                node.result = rule.result;
            }
            None => node.rank = Rank::MAX,
        }
        node.rank
    }

    /// Merge node `i` with its successor. Returns `i`'s predecessor.
    #[inline]
    fn merge_at(&mut self, i: usize) -> u32 {
        let j = self.nodes[i].next as usize;
        let j_next = self.nodes[j].next;

        self.nodes[i].token_id = self.nodes[i].result;
        self.nodes[i].next = j_next;
        if j_next != NONE {
            self.nodes[j_next as usize].prev = i as u32;
        }
        self.nodes[j].rank = Rank::MAX;
        self.len -= 1;

        self.nodes[i].prev
    }

    fn run(&mut self) {
        if self.nodes.len() <= LINEAR_SCAN_MAX {
            self.run_linear();
        } else {
            self.run_heap();
        }
    }

    /// O(n) per merge. Best for short chunks.
    fn run_linear(&mut self) {
        loop {
            let mut best: (Rank, u32) = (Rank::MAX, NONE);
            let mut cur = 0u32;
            while cur != NONE {
                let node = &self.nodes[cur as usize];
                if node.rank < best.0 {
                    best = (node.rank, cur);
                }
                cur = node.next;
            }
            if best.0 == Rank::MAX {
                return;
            }

            let i = best.1 as usize;
            let pred = self.merge_at(i);
            self.refresh(i);
            if pred != NONE {
                self.refresh(pred as usize);
            }
        }
    }

    /// O(log n) per merge. Best for long chunks.
    fn run_heap(&mut self) {
        // Node indices increase left to right, so (rank, index) order picks
        // the leftmost pair among equal ranks.
        let mut heap: BinaryHeap<Reverse<(Rank, u32)>> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.rank != Rank::MAX)
            .map(|(i, node)| Reverse((node.rank, i as u32)))
            .collect();

        while let Some(Reverse((rank, idx))) = heap.pop() {
            let i = idx as usize;
            // Stale entry.
            if self.nodes[i].rank != rank {
                continue;
            }

            let pred = self.merge_at(i);
            let new_rank = self.refresh(i);
            if new_rank != Rank::MAX {
                heap.push(Reverse((new_rank, idx)));
            }
            if pred != NONE {
                let pred_rank = self.refresh(pred as usize);
                if pred_rank != Rank::MAX {
                    heap.push(Reverse((pred_rank, pred)));
                }
            }
        }
    }

    fn collect_into(&self, out: &mut Vec<TokenId>) {
        out.reserve(self.len);
        let mut cur = 0u32;
        while cur != NONE {
            let node = &self.nodes[cur as usize];
            out.push(node.token_id);
            cur = node.next;
        }
    }
}

/// Encode one chunk, appending its token ids to `out`.
pub fn byte_pair_encode(piece: &[u8], table: &VocabTable, out: &mut Vec<TokenId>) {
    match piece {
        [] => {}
        [byte] => out.push(table.byte_id(*byte)),
        _ => {
            let mut symbols = Symbols::new(piece, table);
            symbols.run();
            symbols.collect_into(out);
        }
    }
}

/// Number of tokens [`byte_pair_encode`] would produce for `piece`.
pub fn byte_pair_count(piece: &[u8], table: &VocabTable) -> usize {
    if piece.len() < 2 {
        return piece.len();
    }
    let mut symbols = Symbols::new(piece, table);
    symbols.run();
    symbols.len
}
