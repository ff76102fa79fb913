//! Group markers and fixed-distance classes (spec §3 "Group marker" /
//! "Group markers / fixed-distance classes", §4.3).
//!
//! A weighted union–find over capture-group boundary markers: two markers
//! land in the same class when the TNFA builder can prove they are always
//! exactly `d` code units apart (e.g. the start and end of `()` around a
//! single literal), or that a marker sits at a fixed offset from an input
//! endpoint (e.g. `^(a)` anchors group 1's start to offset 0). Markers
//! proven fixed this way never need a runtime register — the fixed-tag
//! finalizer (`src/simulate.rs`) reconstructs them at accept time instead.
//!
//! No prior module here implements a weighted union-find; this is written in
//! the dense-newtype-id idiom shared by `src/compiletime/ids.rs` and the rest
//! of this crate, using path compression the way `src/dfa.rs`'s minimizer
//! `find_group` pattern looks states up by identity.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ids::GroupId;
use crate::tdfa::MatchMode;

/// A capture-group boundary: the start or end of group `i`. Group 0 is the
/// whole match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Marker {
    Start(GroupId),
    End(GroupId),
}

impl Marker {
    pub fn group(self) -> GroupId {
        match self {
            Marker::Start(g) | Marker::End(g) => g,
        }
    }

    pub fn is_start(self) -> bool {
        matches!(self, Marker::Start(_))
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Marker::Start(g) => write!(f, "S{}", g.as_usize()),
            Marker::End(g) => write!(f, "E{}", g.as_usize()),
        }
    }
}

/// The resolved fixed-distance status of one marker, as returned by
/// [`GroupMarkerClasses::fixed_classes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedClass {
    /// This marker always sits exactly `offset` code units after the start
    /// of the matched region.
    AnchoredStart { offset: i64 },
    /// This marker always sits exactly `offset` code units after the end of
    /// the matched region. Never produced in [`MatchMode::Prefix`] (spec
    /// §4.3: "PREFIX does not [allow anchoring to end]; end is
    /// runtime-dependent").
    AnchoredEnd { offset: i64 },
    /// This marker is the representative of its class and must be tracked
    /// by a runtime register.
    Representative,
    /// This marker is always exactly `offset` code units after its class's
    /// representative, which is tracked by a runtime register.
    Member { representative: Marker, offset: i64 },
}

#[derive(Debug, Clone, Copy)]
struct Node {
    parent: Marker,
    /// Distance from this node to `parent`: `parent_abs = self_abs + weight`.
    /// Always non-negative once `parent` differs from `self` — the parent
    /// is always at or to the right of its children (spec's "root is the
    /// rightmost marker of its class").
    weight: i64,
}

/// Root-only bookkeeping: anchors to the start/end of the matched region,
/// expressed relative to the class representative.
#[derive(Debug, Clone, Copy, Default)]
struct RootFacts {
    /// `root_abs = start_abs + offset`.
    anchor_start: Option<i64>,
    /// `root_abs = end_abs + offset`.
    anchor_end: Option<i64>,
}

/// The forest of group markers and their fixed-distance classes.
#[derive(Debug, Default)]
pub struct GroupMarkerClasses {
    nodes: HashMap<Marker, Node>,
    facts: HashMap<Marker, RootFacts>,
    order: Vec<Marker>,
}

impl GroupMarkerClasses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every marker registered so far, in registration order.
    pub fn markers(&self) -> impl Iterator<Item = Marker> + '_ {
        self.order.iter().copied()
    }

    /// Register a brand-new marker as its own singleton class.
    pub fn add_fresh(&mut self, marker: Marker) {
        if self.nodes.contains_key(&marker) {
            return;
        }
        self.nodes.insert(
            marker,
            Node {
                parent: marker,
                weight: 0,
            },
        );
        self.facts.insert(marker, RootFacts::default());
        self.order.push(marker);
    }

    /// Find the class representative of `marker` and the (non-negative)
    /// distance from `marker` to it, with path compression.
    fn find(&mut self, marker: Marker) -> (Marker, i64) {
        let node = *self.nodes.get(&marker).expect("marker was not added via add_fresh");
        if node.parent == marker {
            return (marker, 0);
        }
        let (root, parent_to_root) = self.find(node.parent);
        let total = node.weight + parent_to_root;
        self.nodes.insert(
            marker,
            Node {
                parent: root,
                weight: total,
            },
        );
        (root, total)
    }

    /// Record that `b` is exactly `d` code units after `a` (`b_abs = a_abs +
    /// d`). Raises [`crate::error::ErrorKind::GroupClassConflict`] if this
    /// contradicts an already-established distance.
    pub fn record_fixed_distance(&mut self, a: Marker, d: i64, b: Marker) -> Result<()> {
        let (ra, oa) = self.find(a); // a_abs = ra_abs - oa
        let (rb, ob) = self.find(b); // b_abs = rb_abs - ob
                                      // rb_abs - ob = ra_abs - oa + d  =>  rb_abs = ra_abs + (oa - ob + d)
        let gap = oa - ob + d; // rb_abs - ra_abs
        if ra == rb {
            if gap != 0 {
                return Err(Error::group_conflict(a.to_string(), b.to_string()));
            }
            return Ok(());
        }
        self.union(ra, rb, gap, a, b)
    }

    /// Record that `marker` is exactly `d` code units after the start
    /// (`is_start = true`) or end (`is_start = false`) of the matched
    /// region.
    pub fn record_anchor(&mut self, marker: Marker, d: i64, is_start: bool) -> Result<()> {
        let (root, offset) = self.find(marker); // marker_abs = root_abs - offset
                                                  // root_abs = marker_abs + offset = anchor_abs + d + offset
        let root_rel = d + offset;
        let facts = self.facts.entry(root).or_default();
        let slot = if is_start {
            &mut facts.anchor_start
        } else {
            &mut facts.anchor_end
        };
        match *slot {
            Some(existing) if existing != root_rel => {
                Err(Error::group_conflict(marker.to_string(), "input endpoint".to_string()))
            }
            _ => {
                *slot = Some(root_rel);
                Ok(())
            }
        }
    }

    /// Union two distinct roots known to be `gap = rb_abs - ra_abs` apart.
    fn union(&mut self, ra: Marker, rb: Marker, gap: i64, ctx_a: Marker, ctx_b: Marker) -> Result<()> {
        let (new_root, absorbed, absorbed_weight) = if gap >= 0 {
            // rb is at or to the right of ra: rb stays root, ra absorbed.
            (rb, ra, gap)
        } else {
            (ra, rb, -gap)
        };
        let absorbed_facts = self.facts.remove(&absorbed).unwrap_or_default();
        self.nodes.insert(
            absorbed,
            Node {
                parent: new_root,
                weight: absorbed_weight,
            },
        );

        // Translate the absorbed root's anchors into the new root's frame.
        // absorbed_abs = new_root_abs - absorbed_weight, so
        // new_root_abs - anchor_abs = (absorbed_abs - anchor_abs) + absorbed_weight.
        let mut new_root_facts = self.facts.remove(&new_root).unwrap_or_default();
        if let Some(s) = absorbed_facts.anchor_start {
            Self::merge_anchor(&mut new_root_facts.anchor_start, s + absorbed_weight, ctx_a, ctx_b)?;
        }
        if let Some(e) = absorbed_facts.anchor_end {
            Self::merge_anchor(&mut new_root_facts.anchor_end, e + absorbed_weight, ctx_a, ctx_b)?;
        }
        self.facts.insert(new_root, new_root_facts);
        Ok(())
    }

    fn merge_anchor(slot: &mut Option<i64>, value: i64, ctx_a: Marker, ctx_b: Marker) -> Result<()> {
        match *slot {
            Some(existing) if existing != value => Err(Error::group_conflict(ctx_a.to_string(), ctx_b.to_string())),
            _ => {
                *slot = Some(value);
                Ok(())
            }
        }
    }

    /// Resolve every registered marker's fixed-distance status.
    pub fn fixed_classes(&mut self, mode: MatchMode) -> HashMap<Marker, FixedClass> {
        let markers = self.order.clone();
        let mut resolved = HashMap::with_capacity(markers.len());
        for &m in &markers {
            let (root, offset) = self.find(m);
            let facts = self.facts.get(&root).copied().unwrap_or_default();
            let class = if let Some(s) = facts.anchor_start {
                FixedClass::AnchoredStart { offset: s - offset }
            } else if mode == MatchMode::Full && facts.anchor_end.is_some() {
                FixedClass::AnchoredEnd {
                    offset: facts.anchor_end.unwrap() - offset,
                }
            } else if m == root {
                FixedClass::Representative
            } else {
                FixedClass::Member {
                    representative: root,
                    offset: -offset,
                }
            };
            resolved.insert(m, class);
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::GroupId;

    fn g(i: usize) -> GroupId {
        GroupId::new(i)
    }

    #[test]
    fn fresh_marker_is_its_own_representative() {
        let mut classes = GroupMarkerClasses::new();
        let s1 = Marker::Start(g(1));
        classes.add_fresh(s1);
        let resolved = classes.fixed_classes(MatchMode::Full);
        assert_eq!(resolved[&s1], FixedClass::Representative);
    }

    #[test]
    fn fixed_distance_makes_one_a_member() {
        let mut classes = GroupMarkerClasses::new();
        let s1 = Marker::Start(g(1));
        let e1 = Marker::End(g(1));
        classes.add_fresh(s1);
        classes.add_fresh(e1);
        // group 1 always spans exactly 3 code units.
        classes.record_fixed_distance(s1, 3, e1).unwrap();
        let resolved = classes.fixed_classes(MatchMode::Full);
        match (resolved[&s1], resolved[&e1]) {
            (FixedClass::Representative, FixedClass::Member { representative, offset })
            | (FixedClass::Member { representative, offset }, FixedClass::Representative) => {
                assert_eq!(offset.abs(), 3);
                let _ = representative;
            }
            other => panic!("expected one representative, one member, got {other:?}"),
        }
    }

    #[test]
    fn conflicting_distance_is_an_error() {
        let mut classes = GroupMarkerClasses::new();
        let s1 = Marker::Start(g(1));
        let e1 = Marker::End(g(1));
        classes.add_fresh(s1);
        classes.add_fresh(e1);
        classes.record_fixed_distance(s1, 3, e1).unwrap();
        assert!(classes.record_fixed_distance(s1, 4, e1).is_err());
    }

    #[test]
    fn anchor_to_start_resolves_absolute_offset() {
        let mut classes = GroupMarkerClasses::new();
        let s1 = Marker::Start(g(1));
        classes.add_fresh(s1);
        classes.record_anchor(s1, 0, true).unwrap();
        let resolved = classes.fixed_classes(MatchMode::Full);
        assert_eq!(resolved[&s1], FixedClass::AnchoredStart { offset: 0 });
    }

    #[test]
    fn anchor_to_end_ignored_in_prefix_mode() {
        let mut classes = GroupMarkerClasses::new();
        let e1 = Marker::End(g(1));
        classes.add_fresh(e1);
        classes.record_anchor(e1, 0, false).unwrap();
        let full = classes.fixed_classes(MatchMode::Full);
        assert_eq!(full[&e1], FixedClass::AnchoredEnd { offset: 0 });
        let prefix = classes.fixed_classes(MatchMode::Prefix);
        assert_eq!(prefix[&e1], FixedClass::Representative);
    }

    #[test]
    fn transitive_distance_through_a_third_marker() {
        let mut classes = GroupMarkerClasses::new();
        let a = Marker::Start(g(1));
        let b = Marker::End(g(1));
        let c = Marker::Start(g(2));
        classes.add_fresh(a);
        classes.add_fresh(b);
        classes.add_fresh(c);
        classes.record_fixed_distance(a, 2, b).unwrap();
        classes.record_fixed_distance(b, 1, c).unwrap();
        // a -> c should be consistent at distance 3, detected as a non-conflict.
        classes.record_fixed_distance(a, 3, c).unwrap();
        assert!(classes.record_fixed_distance(a, 4, c).is_err());
    }
}
