//! Code-point → code-unit mapping (spec §3 "Code-unit mapping", §4.2).
//!
//! Converts a set of Unicode code points into a small trie whose edges are
//! themselves [`RangeSet`]s of code units, so the TNFA builder can turn one
//! character-class transition into a short chain of single-code-unit
//! transitions. BMP code points produce a one-edge path; supplementary code
//! points produce a two-edge path (high surrogate, then low surrogate) when
//! targeting UTF-16.
//!
//! Grounded on `examples/BurntSushi-ucd-generate/src/dfa.rs`'s
//! `DFABuilder`/`sparse_transitions`: states keyed by an ordered set of
//! reachable targets, transitions compacted into maximal contiguous runs
//! that share a destination. One description of this trie builds it by
//! inserting *reversed* code-unit sequences so that shared continuations
//! merge structurally; this implementation instead builds the trie
//! root-first in consumption order (root = first code unit read) and lets
//! the TNFA builder (`src/tnfa.rs`) converge every accepting leaf onto the
//! same caller-supplied target state. Both orders describe the same
//! automaton fragment — only the intermediate sharing differs, which is a
//! space optimization left as an implementation choice, not a
//! matching-semantics requirement.

use crate::range_set::RangeSet;

/// Which code-unit width a pattern is compiled to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// One code unit per code point (Rust's native `char` iteration). This
    /// is the default: the TDFA simulator (`src/simulate.rs`) scans `&str`
    /// by `char`, so code points and code units coincide and the trie for
    /// every class is a single edge.
    Utf32,
    /// Two 16-bit code units for supplementary-plane code points, one for
    /// BMP code points. Exercised by `code_unit` module tests and available
    /// to callers who need to model UTF-16 input explicitly.
    Utf16,
}

const SURROGATE_LO: u32 = 0xD800;
const SURROGATE_HI: u32 = 0xDFFF;
const SUPPLEMENTARY_START: u32 = 0x10000;
const MAX_CODE_POINT: u32 = 0x10FFFF;

/// A node in the code-unit trie. Children carry pairwise-disjoint
/// [`RangeSet`] edge labels; `accept` is only ever set on a node with no
/// children (a leaf).
#[derive(Debug, Clone, Default)]
pub struct TrieNode {
    children: Vec<(RangeSet, TrieNode)>,
    accept: bool,
}

impl TrieNode {
    fn leaf() -> Self {
        TrieNode {
            children: Vec::new(),
            accept: true,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.accept
    }

    pub fn children(&self) -> &[(RangeSet, TrieNode)] {
        &self.children
    }
}

/// A code-unit trie rooted at the first code unit consumed.
#[derive(Debug, Clone, Default)]
pub struct Trie {
    root: TrieNode,
}

impl Trie {
    pub fn root(&self) -> &TrieNode {
        &self.root
    }
}

/// Build the code-unit trie for `codepoints` under `encoding`.
pub fn build_trie(codepoints: &RangeSet, encoding: Encoding) -> Trie {
    let mut root = TrieNode::default();
    match encoding {
        Encoding::Utf32 => {
            for r in codepoints.ranges() {
                root.children
                    .push((RangeSet::from_range(r.lo, r.hi), TrieNode::leaf()));
            }
        }
        Encoding::Utf16 => {
            let bmp = RangeSet::from_range(0, (SURROGATE_LO - 1).min(MAX_CODE_POINT))
                .union(&RangeSet::from_range(
                    (SURROGATE_HI + 1).min(MAX_CODE_POINT),
                    0xFFFF,
                ));
            let supplementary = RangeSet::from_range(SUPPLEMENTARY_START, MAX_CODE_POINT);
            for r in codepoints.intersection(&bmp).ranges() {
                root.children
                    .push((RangeSet::from_range(r.lo, r.hi), TrieNode::leaf()));
            }
            for r in codepoints.intersection(&supplementary).ranges() {
                for (high, low) in utf16_surrogate_segments(r.lo, r.hi) {
                    let mut child = TrieNode::default();
                    child.children.push((low, TrieNode::leaf()));
                    root.children.push((high, child));
                }
            }
        }
    }
    Trie { root }
}

/// Decompose a supplementary-plane code point range `[lo, hi]` into the
/// minimal set of (high-surrogate-range, low-surrogate-range) edge pairs.
fn utf16_surrogate_segments(lo: u32, hi: u32) -> Vec<(RangeSet, RangeSet)> {
    debug_assert!(lo >= SUPPLEMENTARY_START && hi <= MAX_CODE_POINT && lo <= hi);
    let lo_base = lo - SUPPLEMENTARY_START;
    let hi_base = hi - SUPPLEMENTARY_START;
    let high_lo = 0xD800 + (lo_base >> 10);
    let high_hi = 0xD800 + (hi_base >> 10);
    let low_of = |base: u32| 0xDC00 + (base & 0x3FF);

    if high_lo == high_hi {
        return vec![(
            RangeSet::single(high_lo),
            RangeSet::from_range(low_of(lo_base), low_of(hi_base)),
        )];
    }

    let mut segments = Vec::new();
    let lo_frac = lo_base & 0x3FF;
    let hi_frac = hi_base & 0x3FF;

    // Full-range middle block, widened to absorb the first/last high
    // surrogate when their low-surrogate range is already the full block.
    let mut middle_lo = high_lo + 1;
    let mut middle_hi = high_hi - 1;

    if lo_frac == 0 {
        middle_lo = high_lo;
    } else {
        segments.push((RangeSet::single(high_lo), RangeSet::from_range(low_of(lo_frac), 0xDFFF)));
    }
    if hi_frac == 0x3FF {
        middle_hi = high_hi;
    } else {
        segments.push((RangeSet::single(high_hi), RangeSet::from_range(0xDC00, low_of(hi_frac))));
    }
    if middle_lo <= middle_hi {
        segments.push((
            RangeSet::from_range(middle_lo, middle_hi),
            RangeSet::from_range(0xDC00, 0xDFFF),
        ));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf32_is_single_edge_per_range() {
        let set = RangeSet::from_ranges([('a' as u32, 'z' as u32)]);
        let trie = build_trie(&set, Encoding::Utf32);
        assert_eq!(trie.root().children().len(), 1);
        let (edge, child) = &trie.root().children()[0];
        assert_eq!(edge.ranges(), set.ranges());
        assert!(child.is_leaf());
    }

    #[test]
    fn utf16_bmp_is_single_edge() {
        let set = RangeSet::single('A' as u32);
        let trie = build_trie(&set, Encoding::Utf16);
        assert_eq!(trie.root().children().len(), 1);
        assert!(trie.root().children()[0].1.is_leaf());
    }

    #[test]
    fn utf16_supplementary_is_two_edges() {
        // U+10000 .. U+10001: a single high surrogate (0xD800), low
        // surrogate range 0xDC00..0xDC01.
        let set = RangeSet::from_range(0x10000, 0x10001);
        let trie = build_trie(&set, Encoding::Utf16);
        assert_eq!(trie.root().children().len(), 1);
        let (high, child) = &trie.root().children()[0];
        assert_eq!(high.ranges(), &[crate::range_set::Range::new(0xD800, 0xD800)]);
        assert!(!child.is_leaf());
        let (low, leaf) = &child.children()[0];
        assert_eq!(low.ranges(), &[crate::range_set::Range::new(0xDC00, 0xDC01)]);
        assert!(leaf.is_leaf());
    }

    #[test]
    fn utf16_spanning_many_high_surrogates_merges_middle_block() {
        // From just after the start of one high surrogate's block to just
        // before the end of a much later one: first and last segments are
        // partial, everything between is one merged full block.
        let lo = 0x10000 + 1; // mid-way into first block
        let hi = 0x10000 + 3 * 0x400 + 5; // partial into fourth block
        let segments = utf16_surrogate_segments(lo, hi);
        // Expect: partial first (high=D800), full middle (D801..D802), partial last (high=D803).
        assert_eq!(segments.len(), 3);
    }

    #[test]
    fn utf16_full_block_aligned_merges_into_one_segment() {
        let lo = 0x10000; // aligned to block start
        let hi = 0x10000 + 2 * 0x400 - 1; // aligned to block end, spans 2 blocks
        let segments = utf16_surrogate_segments(lo, hi);
        assert_eq!(segments.len(), 1);
        let (high, low) = &segments[0];
        assert_eq!(high.ranges(), &[crate::range_set::Range::new(0xD800, 0xD801)]);
        assert_eq!(low.ranges(), &[crate::range_set::Range::new(0xDC00, 0xDFFF)]);
    }
}
