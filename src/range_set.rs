//! Canonical sets of code units represented as sorted, non-overlapping,
//! non-adjacent inclusive ranges (spec §3 "Range set", §4.1).
//!
//! This is the leaf component of the pipeline (spec §2: "Range sets", 5%
//! share) — every other module eventually bottoms out in a comparison
//! against, or a partition of, a `RangeSet`. Written in the same "small
//! pure total functions over a `Vec`" style as `ComparableAst`
//! (`src/compiletime/character_class.rs`) and `dfa.rs`'s sparse-range
//! compaction.

use std::collections::HashMap;
use std::fmt;

/// An inclusive range of code units, `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    pub lo: u32,
    pub hi: u32,
}

impl Range {
    pub fn new(lo: u32, hi: u32) -> Self {
        debug_assert!(lo <= hi, "invalid range [{lo}, {hi}]");
        Range { lo, hi }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lo == self.hi {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{}-{}", self.lo, self.hi)
        }
    }
}

/// A canonical, ordered sequence of non-overlapping, non-adjacent ranges.
///
/// Invariant: for consecutive ranges `r1, r2` in `ranges`, `r1.hi + 1 <
/// r2.lo`. An empty `RangeSet` matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RangeSet {
    ranges: Vec<Range>,
}

impl RangeSet {
    /// The empty set.
    pub fn empty() -> Self {
        RangeSet { ranges: Vec::new() }
    }

    /// A set containing exactly the closed interval `[lo, hi]`.
    pub fn from_range(lo: u32, hi: u32) -> Self {
        RangeSet {
            ranges: vec![Range::new(lo, hi)],
        }
    }

    /// A set containing exactly one code unit.
    pub fn single(c: u32) -> Self {
        Self::from_range(c, c)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Build a canonical set from arbitrary (possibly overlapping,
    /// unsorted) ranges.
    pub fn from_ranges<I: IntoIterator<Item = (u32, u32)>>(ranges: I) -> Self {
        let mut out = RangeSet::empty();
        for (lo, hi) in ranges {
            out = out.union(&RangeSet::from_range(lo, hi));
        }
        out
    }

    pub fn contains(&self, x: u32) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if x < r.lo {
                    std::cmp::Ordering::Greater
                } else if x > r.hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Merge-push a range onto a ranges-under-construction vector,
    /// coalescing it with the previous range if they touch or overlap.
    fn push_merging(ranges: &mut Vec<Range>, next: Range) {
        if let Some(last) = ranges.last_mut() {
            // Adjacent-or-overlapping iff `next.lo <= last.hi + 1`, computed
            // without overflow for `last.hi == u32::MAX`.
            let touches = last.hi == u32::MAX || next.lo <= last.hi + 1;
            if touches {
                last.hi = last.hi.max(next.hi);
                return;
            }
        }
        ranges.push(next);
    }

    fn from_sorted_merged(mut ranges: Vec<Range>) -> Self {
        ranges.sort_by_key(|r| r.lo);
        let mut out = Vec::with_capacity(ranges.len());
        for r in ranges {
            Self::push_merging(&mut out, r);
        }
        RangeSet { ranges: out }
    }

    pub fn union(&self, other: &RangeSet) -> RangeSet {
        let mut all: Vec<Range> = self.ranges.iter().chain(other.ranges.iter()).copied().collect();
        all.sort_by_key(|r| r.lo);
        Self::from_sorted_merged(all)
    }

    pub fn intersection(&self, other: &RangeSet) -> RangeSet {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            let lo = a.lo.max(b.lo);
            let hi = a.hi.min(b.hi);
            if lo <= hi {
                out.push(Range::new(lo, hi));
            }
            if a.hi < b.hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        // Intersections of a sorted disjoint sweep are themselves sorted and
        // cannot be adjacent (they are each contained in a distinct pair of
        // already-disjoint source ranges), but fold through the merger for
        // safety against pathological adjacent-at-the-seam cases.
        Self::from_sorted_merged(out)
    }

    pub fn difference(&self, other: &RangeSet) -> RangeSet {
        if other.is_empty() {
            return self.clone();
        }
        let mut out = Vec::new();
        for &a in &self.ranges {
            let mut lo = a.lo;
            for &b in &other.ranges {
                if b.hi < lo {
                    continue;
                }
                if b.lo > a.hi {
                    break;
                }
                if b.lo > lo {
                    out.push(Range::new(lo, b.lo - 1));
                }
                lo = if b.hi == u32::MAX { a.hi + 1 } else { b.hi + 1 };
                if lo > a.hi {
                    break;
                }
            }
            if lo <= a.hi {
                out.push(Range::new(lo, a.hi));
            }
        }
        Self::from_sorted_merged(out)
    }

    pub fn negate_within(&self, universe: &RangeSet) -> RangeSet {
        universe.difference(self)
    }

    /// Produce the coarsest partition of `union(inputs)` such that each
    /// part lies in exactly the same subset of `inputs` (spec §4.1).
    ///
    /// Returns pairs of (part, indices of `inputs` that contain this part),
    /// ordered by the part's lowest code unit.
    pub fn disjoint_partition(inputs: &[RangeSet]) -> Vec<(RangeSet, Vec<usize>)> {
        if inputs.is_empty() {
            return Vec::new();
        }

        // Coordinate-compress on every range boundary (start, and one past
        // the end) across all inputs, then classify each elementary
        // interval by which inputs contain its representative point.
        let mut breakpoints: Vec<u32> = Vec::new();
        for set in inputs {
            for r in &set.ranges {
                breakpoints.push(r.lo);
                if r.hi != u32::MAX {
                    breakpoints.push(r.hi + 1);
                }
            }
        }
        breakpoints.sort_unstable();
        breakpoints.dedup();

        // Group consecutive elementary intervals sharing the same
        // membership signature, even when they are not contiguous across
        // the whole sweep (a class can recur after being interrupted by
        // another class's boundary).
        let mut by_signature: Vec<(Vec<usize>, Vec<Range>)> = Vec::new();
        let mut index_of: HashMap<Vec<usize>, usize> = HashMap::new();

        for w in breakpoints.windows(2) {
            let (lo, hi) = (w[0], w[1] - 1);
            Self::classify_and_accumulate(inputs, lo, hi, &mut by_signature, &mut index_of);
        }
        // Handle the half-open tail starting at the last breakpoint, up to
        // u32::MAX, in case some input range extends to the maximum code
        // unit.
        if let Some(&last) = breakpoints.last() {
            if last != u32::MAX || inputs.iter().any(|s| s.ranges.iter().any(|r| r.hi == u32::MAX)) {
                Self::classify_and_accumulate(inputs, last, u32::MAX, &mut by_signature, &mut index_of);
            }
        }

        let mut parts: Vec<(RangeSet, Vec<usize>)> = by_signature
            .into_iter()
            .map(|(sig, ranges)| (Self::from_sorted_merged(ranges), sig))
            .collect();
        parts.sort_by_key(|(set, _)| set.ranges.first().map(|r| r.lo).unwrap_or(u32::MAX));
        parts
    }

    fn classify_and_accumulate(
        inputs: &[RangeSet],
        lo: u32,
        hi: u32,
        by_signature: &mut Vec<(Vec<usize>, Vec<Range>)>,
        index_of: &mut HashMap<Vec<usize>, usize>,
    ) {
        let membership: Vec<usize> = inputs
            .iter()
            .enumerate()
            .filter(|(_, set)| set.contains(lo))
            .map(|(i, _)| i)
            .collect();
        if membership.is_empty() {
            return;
        }
        debug_assert!(
            inputs
                .iter()
                .enumerate()
                .all(|(i, set)| set.contains(lo) == membership.contains(&i)),
            "lo is a representative of the whole elementary interval [{lo}, {hi}]"
        );
        let entry = index_of.entry(membership.clone()).or_insert_with(|| {
            by_signature.push((membership, Vec::new()));
            by_signature.len() - 1
        });
        by_signature[*entry].1.push(Range::new(lo, hi));
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{r}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_merges_adjacent() {
        let a = RangeSet::from_range(0, 5);
        let b = RangeSet::from_range(6, 10);
        let u = a.union(&b);
        assert_eq!(u.ranges(), &[Range::new(0, 10)]);
    }

    #[test]
    fn union_merges_overlapping() {
        let a = RangeSet::from_range(0, 5);
        let b = RangeSet::from_range(3, 10);
        assert_eq!(a.union(&b).ranges(), &[Range::new(0, 10)]);
    }

    #[test]
    fn union_keeps_disjoint_separate() {
        let a = RangeSet::from_range(0, 2);
        let b = RangeSet::from_range(10, 12);
        assert_eq!(a.union(&b).ranges(), &[Range::new(0, 2), Range::new(10, 12)]);
    }

    #[test]
    fn intersection_basic() {
        let a = RangeSet::from_ranges([(0, 10), (20, 30)]);
        let b = RangeSet::from_range(5, 25);
        assert_eq!(
            a.intersection(&b).ranges(),
            &[Range::new(5, 10), Range::new(20, 25)]
        );
    }

    #[test]
    fn difference_basic() {
        let a = RangeSet::from_range(0, 10);
        let b = RangeSet::from_range(3, 5);
        assert_eq!(
            a.difference(&b).ranges(),
            &[Range::new(0, 2), Range::new(6, 10)]
        );
    }

    #[test]
    fn difference_full_cover() {
        let a = RangeSet::from_range(0, 10);
        let b = RangeSet::from_range(0, 10);
        assert!(a.difference(&b).is_empty());
    }

    #[test]
    fn contains_checks_all_ranges() {
        let a = RangeSet::from_ranges([(0, 2), (10, 12)]);
        assert!(a.contains(1));
        assert!(a.contains(11));
        assert!(!a.contains(5));
    }

    #[test]
    fn disjoint_partition_splits_overlap() {
        // 'a'-'z' and 'd'-'f' overlap in the middle.
        let digits = RangeSet::from_range(b'a' as u32, b'z' as u32);
        let mid = RangeSet::from_range(b'd' as u32, b'f' as u32);
        let parts = RangeSet::disjoint_partition(&[digits.clone(), mid.clone()]);
        // Expect three parts: a-c (only digits), d-f (both), g-z (only digits).
        assert_eq!(parts.len(), 3);
        let memberships: Vec<Vec<usize>> = parts.iter().map(|(_, m)| m.clone()).collect();
        assert!(memberships.contains(&vec![0]));
        assert!(memberships.contains(&vec![0, 1]));
        let total: u32 = parts
            .iter()
            .map(|(set, _)| set.ranges().iter().map(|r| r.hi - r.lo + 1).sum::<u32>())
            .sum();
        assert_eq!(total, digits.union(&mid).ranges().iter().map(|r| r.hi - r.lo + 1).sum());
    }

    #[test]
    fn disjoint_partition_recurring_signature_same_part() {
        // Two separate inputs both covering [0,2] and [10,12]; a third
        // input covering only [5,7]. The signature {0,1} recurs
        // non-contiguously and should end up in one combined RangeSet.
        let a = RangeSet::from_ranges([(0, 2), (10, 12)]);
        let b = RangeSet::from_ranges([(0, 2), (10, 12)]);
        let c = RangeSet::from_range(5, 7);
        let parts = RangeSet::disjoint_partition(&[a, b, c]);
        let shared = parts
            .iter()
            .find(|(_, m)| m == &vec![0, 1])
            .expect("signature {0,1} present");
        assert_eq!(shared.0.ranges(), &[Range::new(0, 2), Range::new(10, 12)]);
    }
}
