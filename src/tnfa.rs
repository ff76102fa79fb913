//! Tagged NFA construction (spec §3 "TNFA transition" / "TNFA", §4.5).
//!
//! Grounded on `src/nfa.rs`'s `Nfa`/`NfaState` — a dense `Vec`-backed state
//! arena built bottom-up from an `(entry, exit)` state pair per sub-pattern,
//! the same shape `impl TryFrom<Ast> for Nfa` returns there — but generalized
//! from Thompson-construction epsilon edges to the three marker transition
//! kinds spec §3 names (code units, alternation priority, group boundary).
//! There is no generic epsilon edge here: where that construction would add
//! an `add_epsilon_transition` to splice two fragments together, this
//! builder instead *unifies* the two state ids (one becomes a forwarding
//! alias of the other) — the merge points where Thompson construction would
//! put a bare epsilon are exactly the spots with nothing to tag.

use regex_syntax::ast::{Ast, RepetitionKind, RepetitionRange};

use crate::ast::{self, BoundaryKind, Visitor};
use crate::code_unit::{self, Encoding, TrieNode};
use crate::error::{Error, Result};
use crate::group_marker::{GroupMarkerClasses, Marker};
use crate::ids::{GroupId, NfaStateId};
use crate::range_set::RangeSet;

/// One TNFA state's outgoing transitions (spec §3 "TNFA transition").
///
/// Invariant (spec §3): a state's outgoing transitions are all of one kind.
/// `Boundary` has no variant here — the Open Question of spec §9 is
/// resolved (see DESIGN.md) by rejecting `\b \B \A \Z \z` etc. at compile
/// time in [`ast::walk`], so the determinizer never needs to reason about
/// them.
#[derive(Debug, Clone)]
pub enum TnfaState {
    /// No outgoing transitions (the final state, ordinarily).
    None,
    /// Consumes one code unit in `ranges`, then proceeds to `target`.
    /// Pairwise disjoint per state after [`TnfaBuilder::finalize`].
    CodeUnits(Vec<(RangeSet, NfaStateId)>),
    /// Exactly two ε-transitions, `minus` stored before `plus` (spec §3/§4.5:
    /// "MINUS then PLUS in insertion order").
    Alt { minus: NfaStateId, plus: NfaStateId },
    /// A single ε-transition recording a capture-group boundary.
    Group(Marker, NfaStateId),
}

/// A frozen tagged NFA (spec §3 "TNFA").
#[derive(Debug)]
pub struct Tnfa {
    states: Vec<TnfaState>,
    initial: NfaStateId,
    final_state: NfaStateId,
    group_count: usize,
}

impl Tnfa {
    pub fn states(&self) -> &[TnfaState] {
        &self.states
    }

    pub fn state(&self, id: NfaStateId) -> &TnfaState {
        &self.states[id]
    }

    pub fn initial(&self) -> NfaStateId {
        self.initial
    }

    pub fn final_state(&self) -> NfaStateId {
        self.final_state
    }

    /// Number of capture groups, including group 0 (the whole match).
    pub fn group_count(&self) -> usize {
        self.group_count
    }
}

/// Result of compiling a pattern to a TNFA (spec §4.5) plus the
/// fixed-distance marker analysis that rides along with it (spec §4.3).
pub struct TnfaCompilation {
    pub tnfa: Tnfa,
    pub groups: GroupMarkerClasses,
}

/// Build a TNFA for `ast`, wrapping the whole pattern in capture group 0.
///
/// `include_wildcard_prefix` prepends a lazy `.*?`-equivalent so the
/// compiled TDFA can be driven in `find`-style scanning (spec §6).
pub fn compile(ast: &regex_syntax::ast::Ast, include_wildcard_prefix: bool) -> Result<TnfaCompilation> {
    let mut builder = TnfaBuilder::new();

    // Group 0 (the whole match) starts exactly at the scan region's start
    // and ends exactly at its own end only when nothing can be consumed
    // before it — i.e. when there's no wildcard prefix. With a wildcard
    // prefix (`find`-style scanning) the `.*?` ahead of the body can eat a
    // variable number of code units, so group 0's start is only known at
    // match time and must go through a tracked register instead of the
    // fixed-offset-from-scan-start shortcut. The end stays anchored to 0
    // unconditionally: `fixed_classes` already restricts `AnchoredEnd` to
    // FULL mode, where reaching an accepting state implies `pos == end`
    // regardless of any prefix consumed along the way.
    builder.groups.add_fresh(Marker::Start(GroupId::new(0)));
    builder.groups.add_fresh(Marker::End(GroupId::new(0)));
    let start_anchor = if include_wildcard_prefix { None } else { Some(0) };
    if let Some(s) = start_anchor {
        builder.groups.record_anchor(Marker::Start(GroupId::new(0)), s, true)?;
    }
    builder.groups.record_anchor(Marker::End(GroupId::new(0)), 0, false)?;
    if let Some(w) = ast::fixed_width(ast) {
        builder
            .groups
            .record_fixed_distance(Marker::Start(GroupId::new(0)), w as i64, Marker::End(GroupId::new(0)))?;
    }
    annotate_starts(ast, start_anchor, &mut builder.groups)?;
    annotate_ends(ast, Some(0), &mut builder.groups)?;

    let prefix = if include_wildcard_prefix {
        let any = builder.class(any_char())?;
        Some(builder.star(any, true)?)
    } else {
        None
    };

    let body = ast::walk(ast, &mut builder)?;
    let whole = builder.group(Some(GroupId::new(0)), body)?;

    let (entry, exit) = match prefix {
        Some(prefix) => builder.concat(prefix, whole)?,
        None => whole,
    };

    builder.finalize(entry, exit)
}

struct TnfaBuilder {
    states: Vec<TnfaState>,
    /// Union-find parent for states whose identity was merged into another
    /// (concatenation join points, alternation/loop convergence points).
    /// A state is its own root until aliased away.
    parent: Vec<NfaStateId>,
    groups: GroupMarkerClasses,
}

impl TnfaBuilder {
    fn new() -> Self {
        TnfaBuilder {
            states: Vec::new(),
            parent: Vec::new(),
            groups: GroupMarkerClasses::new(),
        }
    }

    fn new_state(&mut self) -> NfaStateId {
        let id = NfaStateId::new(self.states.len());
        self.states.push(TnfaState::None);
        self.parent.push(id);
        id
    }

    fn find(&mut self, id: NfaStateId) -> NfaStateId {
        let p = self.parent[id.as_usize()];
        if p == id {
            return id;
        }
        let root = self.find(p);
        self.parent[id.as_usize()] = root;
        root
    }

    /// Make `from` a forwarding alias of `to`. `from` must currently be an
    /// unassigned (`TnfaState::None`) placeholder — every caller here only
    /// aliases a sub-pattern's freshly returned exit state, which by
    /// construction has never had a kind assigned to it yet.
    fn alias(&mut self, from: NfaStateId, to: NfaStateId) {
        let from_root = self.find(from);
        let to_root = self.find(to);
        if from_root == to_root {
            return;
        }
        debug_assert!(
            matches!(self.states[from_root.as_usize()], TnfaState::None),
            "aliased state already has transitions assigned"
        );
        self.parent[from_root.as_usize()] = to_root;
    }

    fn set_kind(&mut self, id: NfaStateId, kind: TnfaState) {
        let root = self.find(id);
        debug_assert!(
            matches!(self.states[root.as_usize()], TnfaState::None),
            "state already has transitions assigned"
        );
        self.states[root.as_usize()] = kind;
    }

    fn finalize(mut self, entry: NfaStateId, exit: NfaStateId) -> Result<TnfaCompilation> {
        let initial = self.find(entry);
        let final_state = self.find(exit);

        // Resolve every transition target through the alias map, and
        // disjoint-partition each state's code-unit transitions (spec
        // §4.5 step 1). In practice every `CodeUnits` state built by
        // `class()` already holds exactly one range set, so partitioning
        // is a no-op here; it is still applied for robustness against
        // future multi-edge construction (e.g. a code-unit trie).
        let mut resolved = Vec::with_capacity(self.states.len());
        for state in self.states.iter() {
            resolved.push(match state {
                TnfaState::None => TnfaState::None,
                TnfaState::Group(m, t) => TnfaState::Group(*m, t.clone()),
                TnfaState::Alt { minus, plus } => TnfaState::Alt {
                    minus: *minus,
                    plus: *plus,
                },
                TnfaState::CodeUnits(edges) => TnfaState::CodeUnits(edges.clone()),
            });
        }
        for state in resolved.iter_mut() {
            match state {
                TnfaState::None => {}
                TnfaState::Group(_, t) => *t = self.find(*t),
                TnfaState::Alt { minus, plus } => {
                    *minus = self.find(*minus);
                    *plus = self.find(*plus);
                }
                TnfaState::CodeUnits(edges) => {
                    let sets: Vec<RangeSet> = edges.iter().map(|(r, _)| r.clone()).collect();
                    if sets.len() > 1 {
                        let targets: Vec<NfaStateId> = edges.iter().map(|(_, t)| self.find(*t)).collect();
                        let parts = RangeSet::disjoint_partition(&sets);
                        *edges = parts
                            .into_iter()
                            .flat_map(|(part, owners)| owners.into_iter().map(move |i| (part.clone(), targets[i])))
                            .collect();
                    } else if let Some((_, t)) = edges.first_mut() {
                        *t = self.find(*t);
                    }
                }
            }
        }

        let group_count = self.groups_seen_count();
        Ok(TnfaCompilation {
            tnfa: Tnfa {
                states: resolved,
                initial,
                final_state,
                group_count,
            },
            groups: self.groups,
        })
    }

    fn groups_seen_count(&self) -> usize {
        let mut max = 0usize;
        for m in self.groups.markers() {
            max = max.max(m.group().as_usize() + 1);
        }
        max
    }

    /// Materialize one level of a code-unit trie into `state`'s outgoing
    /// transitions, recursing into a fresh intermediate state per non-leaf
    /// child so a multi-code-unit path (e.g. a UTF-16 surrogate pair)
    /// becomes a real chain of single-code-unit `CodeUnits` states; every
    /// leaf converges onto the caller-supplied `exit`.
    fn emit_trie_node(&mut self, state: NfaStateId, node: &TrieNode, exit: NfaStateId) {
        let edges: Vec<(RangeSet, NfaStateId)> = node
            .children()
            .iter()
            .map(|(range, child)| {
                let target = if child.is_leaf() {
                    exit
                } else {
                    let mid = self.new_state();
                    self.emit_trie_node(mid, child, exit);
                    mid
                };
                (range.clone(), target)
            })
            .collect();
        self.set_kind(state, TnfaState::CodeUnits(edges));
    }
}

impl Visitor for TnfaBuilder {
    type Out = (NfaStateId, NfaStateId);

    fn epsilon(&mut self) -> Result<Self::Out> {
        let s = self.new_state();
        Ok((s, s))
    }

    fn class(&mut self, ranges: RangeSet) -> Result<Self::Out> {
        let entry = self.new_state();
        let exit = self.new_state();
        // Every class, including a single literal code point, goes through
        // the code-unit trie (spec §4.2) rather than emitting a raw
        // multi-code-point edge directly. Under `Encoding::Utf32` (this
        // crate's only exposed encoding, since the simulator scans `&str` by
        // `char`) the trie always degenerates to one edge per input range,
        // so this costs nothing today; it's the seam a future UTF-16 input
        // mode would hang off without touching the builder's structure.
        let trie = code_unit::build_trie(&ranges, Encoding::Utf32);
        self.emit_trie_node(entry, trie.root(), exit);
        Ok((entry, exit))
    }

    fn concat(&mut self, lhs: Self::Out, rhs: Self::Out) -> Result<Self::Out> {
        let (le, lx) = lhs;
        let (re, rx) = rhs;
        self.alias(lx, re);
        Ok((le, rx))
    }

    fn alternation(&mut self, lhs: Self::Out, rhs: Self::Out) -> Result<Self::Out> {
        let (le, lx) = lhs;
        let (re, rx) = rhs;
        let decision = self.new_state();
        self.set_kind(decision, TnfaState::Alt { minus: re, plus: le });
        let after = self.new_state();
        self.alias(lx, after);
        self.alias(rx, after);
        Ok((decision, after))
    }

    fn star(&mut self, body: Self::Out, lazy: bool) -> Result<Self::Out> {
        let (be, bx) = body;
        let decision = self.new_state();
        let after = self.new_state();
        let (minus, plus) = if lazy { (be, after) } else { (after, be) };
        self.set_kind(decision, TnfaState::Alt { minus, plus });
        self.alias(bx, decision);
        Ok((decision, after))
    }

    fn plus(&mut self, body: Self::Out, lazy: bool) -> Result<Self::Out> {
        let (be, bx) = body;
        let decision = self.new_state();
        let after = self.new_state();
        let (minus, plus) = if lazy { (be, after) } else { (after, be) };
        self.set_kind(decision, TnfaState::Alt { minus, plus });
        self.alias(bx, decision);
        Ok((be, after))
    }

    fn question(&mut self, body: Self::Out, lazy: bool) -> Result<Self::Out> {
        let (be, bx) = body;
        let decision = self.new_state();
        let after = self.new_state();
        let (minus, plus) = if lazy { (be, after) } else { (after, be) };
        self.set_kind(decision, TnfaState::Alt { minus, plus });
        self.alias(bx, after);
        Ok((decision, after))
    }

    fn group(&mut self, group: Option<GroupId>, body: Self::Out) -> Result<Self::Out> {
        let (be, bx) = body;
        let g = match group {
            None => return Ok((be, bx)),
            Some(g) => g,
        };
        self.groups.add_fresh(Marker::Start(g));
        self.groups.add_fresh(Marker::End(g));
        let start = self.new_state();
        self.set_kind(start, TnfaState::Group(Marker::Start(g), be));
        let after = self.new_state();
        self.set_kind(bx, TnfaState::Group(Marker::End(g), after));
        Ok((start, after))
    }

    fn boundary(&mut self, kind: BoundaryKind) -> Result<Self::Out> {
        Err(Error::unsupported(format!("zero-width assertion {kind}")))
    }
}

fn any_char() -> RangeSet {
    RangeSet::from_range(0, 0x10FFFF)
}

/// Only a body repeated exactly once carries its surrounding offset through
/// unchanged; any other repetition count makes the body's own position
/// vary between iterations, so callers pass `None` into it instead.
fn repeats_exactly_once(kind: &RepetitionKind) -> bool {
    matches!(kind, RepetitionKind::Range(RepetitionRange::Exactly(1)))
}

/// Walk `ast`, recording every nested group's start-anchor (when its
/// position relative to the match start is statically known) and its
/// start-to-end fixed distance (when its body has a statically known
/// width), per spec §4.3. `from_start` is the offset from the match's own
/// start at which `ast` begins, or `None` once that position depends on
/// something runtime (an unbounded or variable-count repetition upstream).
fn annotate_starts(ast: &Ast, from_start: Option<i64>, groups: &mut GroupMarkerClasses) -> Result<()> {
    match ast {
        Ast::Concat(c) => {
            let mut offset = from_start;
            for sub in &c.asts {
                annotate_starts(sub, offset, groups)?;
                offset = offset.and_then(|o| ast::fixed_width(sub).map(|w| o + w as i64));
            }
        }
        Ast::Alternation(alt) => {
            // Only one arm is ever taken, so a group nested inside an arm is
            // not guaranteed to participate in a successful match at all —
            // anchoring it here would force a fixed (non -1) position even
            // when a different arm fired and the group never matched. Drop
            // the offset rather than propagate it, same as the
            // conditionally-skipped-body case below.
            for arm in &alt.asts {
                annotate_starts(arm, None, groups)?;
            }
        }
        Ast::Repetition(r) => {
            let inner = if repeats_exactly_once(&r.op.kind) { from_start } else { None };
            annotate_starts(&r.ast, inner, groups)?;
        }
        Ast::Group(g) => {
            if let Some(gid) = ast::group_id(g) {
                groups.add_fresh(Marker::Start(gid));
                groups.add_fresh(Marker::End(gid));
                if let Some(off) = from_start {
                    groups.record_anchor(Marker::Start(gid), off, true)?;
                }
                if let Some(w) = ast::fixed_width(&g.ast) {
                    groups.record_fixed_distance(Marker::Start(gid), w as i64, Marker::End(gid))?;
                }
            }
            annotate_starts(&g.ast, from_start, groups)?;
        }
        _ => {}
    }
    Ok(())
}

/// The symmetric backward pass: records every nested group's end-anchor
/// (its position relative to the match's own end, when statically known).
/// `to_end` is the offset from the match's own end at which `ast` ends, or
/// `None` once that is runtime-dependent.
fn annotate_ends(ast: &Ast, to_end: Option<i64>, groups: &mut GroupMarkerClasses) -> Result<()> {
    match ast {
        Ast::Concat(c) => {
            let mut offset = to_end;
            for sub in c.asts.iter().rev() {
                annotate_ends(sub, offset, groups)?;
                offset = offset.and_then(|o| ast::fixed_width(sub).map(|w| o + w as i64));
            }
        }
        Ast::Alternation(alt) => {
            // Same reasoning as `annotate_starts`: a group inside one arm of
            // an alternation may simply not occur in a given match, so its
            // end cannot be unconditionally anchored to the whole match's end.
            for arm in &alt.asts {
                annotate_ends(arm, None, groups)?;
            }
        }
        Ast::Repetition(r) => {
            let inner = if repeats_exactly_once(&r.op.kind) { to_end } else { None };
            annotate_ends(&r.ast, inner, groups)?;
        }
        Ast::Group(g) => {
            if let Some(gid) = ast::group_id(g) {
                if let Some(off) = to_end {
                    groups.record_anchor(Marker::End(gid), off, false)?;
                }
            }
            annotate_ends(&g.ast, to_end, groups)?;
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex_syntax::ast::parse::Parser;

    fn compile_str(pattern: &str) -> TnfaCompilation {
        let ast = Parser::new().parse(pattern).unwrap();
        compile(&ast, false).unwrap()
    }

    #[test]
    fn literal_has_single_code_unit_state() {
        let c = compile_str("a");
        let entry = c.tnfa.state(c.tnfa.initial());
        // group 0's Start marker wraps the literal.
        match entry {
            TnfaState::Group(Marker::Start(g), _) => assert_eq!(g.as_usize(), 0),
            other => panic!("expected group 0 start, got {other:?}"),
        }
    }

    #[test]
    fn boundary_is_rejected() {
        let ast = Parser::new().parse("^a$").unwrap();
        assert!(compile(&ast, false).is_err());
    }

    #[test]
    fn alternation_preserves_insertion_order() {
        let c = compile_str("a|b");
        // Find the lone Alt state and check minus/plus both resolve.
        let has_alt = c.tnfa.states().iter().any(|s| matches!(s, TnfaState::Alt { .. }));
        assert!(has_alt);
    }

    #[test]
    fn nested_group_markers_are_registered() {
        let c = compile_str("(a(b))");
        assert!(c.groups.markers().any(|m| m == Marker::Start(GroupId::new(1))));
        assert!(c.groups.markers().any(|m| m == Marker::Start(GroupId::new(2))));
    }

    #[test]
    fn leading_group_start_is_anchored_to_match_start() {
        use crate::group_marker::FixedClass;
        use crate::tdfa::MatchMode;

        let mut c = compile_str("(a)bc");
        let classes = c.groups.fixed_classes(MatchMode::Full);
        assert_eq!(
            classes[&Marker::Start(GroupId::new(1))],
            FixedClass::AnchoredStart { offset: 0 }
        );
    }

    #[test]
    fn fixed_width_group_has_no_register_class() {
        use crate::group_marker::FixedClass;
        use crate::tdfa::MatchMode;

        let mut c = compile_str("a(bc)d");
        let classes = c.groups.fixed_classes(MatchMode::Full);
        // group 1 starts 1 unit after match start and is 2 units wide, so
        // both its markers resolve to fixed offsets rather than registers.
        assert_eq!(
            classes[&Marker::Start(GroupId::new(1))],
            FixedClass::AnchoredStart { offset: 1 }
        );
        assert_eq!(
            classes[&Marker::End(GroupId::new(1))],
            FixedClass::AnchoredStart { offset: 3 }
        );
    }

    #[test]
    fn variable_width_prefix_leaves_group_start_unanchored() {
        use crate::group_marker::FixedClass;
        use crate::tdfa::MatchMode;

        let mut c = compile_str("a*(b)");
        let classes = c.groups.fixed_classes(MatchMode::Full);
        assert_eq!(classes[&Marker::Start(GroupId::new(1))], FixedClass::Representative);
    }

    #[test]
    fn group_nested_in_alternation_arm_is_not_anchored() {
        // Group 1 only participates when the left arm fires; anchoring it
        // to the whole match's start/end unconditionally would materialize
        // a bogus position when the right arm matches instead (spec §8
        // boundary behaviour: `(a)|b` against `"b"` must leave group 1 at
        // -1/-1, not at the whole match's span). Its start/end are still
        // linked to each other by the arm's own fixed width, so one member
        // of the pair is the tracked `Representative` and the other a
        // `Member` offset from it — neither is `AnchoredStart`/`AnchoredEnd`.
        use crate::group_marker::FixedClass;
        use crate::tdfa::MatchMode;

        let mut c = compile_str("(a)|b");
        let classes = c.groups.fixed_classes(MatchMode::Full);
        for class in [
            classes[&Marker::Start(GroupId::new(1))],
            classes[&Marker::End(GroupId::new(1))],
        ] {
            assert!(
                matches!(class, FixedClass::Representative | FixedClass::Member { .. }),
                "expected a runtime-tracked class, got {class:?}"
            );
        }
    }

    #[test]
    fn wildcard_prefix_leaves_whole_match_start_unanchored() {
        // With a `.*?` prefix ahead of the body (the `find`-style TDFA), the
        // whole match (group 0) can begin anywhere the prefix stops
        // consuming, not at the scan region's start — so unlike the
        // no-prefix case, group 0's start must be a tracked register, not a
        // fixed offset from 0.
        use crate::group_marker::FixedClass;
        use crate::tdfa::MatchMode;

        let ast = Parser::new().parse("abc").unwrap();
        let mut c = compile(&ast, true).unwrap();
        let classes = c.groups.fixed_classes(MatchMode::Prefix);
        assert!(matches!(
            classes[&Marker::Start(GroupId::new(0))],
            FixedClass::Representative
        ));
    }

    #[test]
    fn no_prefix_whole_match_start_is_anchored() {
        use crate::group_marker::FixedClass;
        use crate::tdfa::MatchMode;

        let mut c = compile_str("abc");
        let classes = c.groups.fixed_classes(MatchMode::Full);
        assert_eq!(
            classes[&Marker::Start(GroupId::new(0))],
            FixedClass::AnchoredStart { offset: 0 }
        );
    }
}
