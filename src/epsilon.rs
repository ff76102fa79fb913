//! Priority-ordered ε-closure over a [`Tnfa`] (spec §4.6).
//!
//! Grounded on the subset-construction shape of `src/dfa.rs`'s
//! `Dfa::try_from_nfa` (a plain graph walk collecting boundary states) but
//! specialized to track priority: a depth-first search that always visits
//! the PLUS branch of an `Alt` before the MINUS branch, recording each
//! boundary state's path only the first time it is reached. Because DFS
//! prefers PLUS at every fork, the first visit to any state is necessarily
//! along its highest-priority path, so a single persistent `visited` set
//! both bounds the walk to O(states + transitions) and doubles as the
//! "don't overwrite an already-claimed boundary" rule spec §4.6 calls for.

use std::collections::HashSet;

use crate::group_marker::Marker;
use crate::ids::NfaStateId;
use crate::pathmarker::{AltMarker, PathEntry, PathMarkers};
use crate::tnfa::{Tnfa, TnfaState};

/// One boundary state reached by ε-transitions from some starting state,
/// together with the highest-priority path that reaches it. A "boundary"
/// state is one with outgoing code-unit transitions, or the TNFA's final
/// state (spec §4.6).
#[derive(Debug, Clone)]
pub struct Boundary {
    pub state: NfaStateId,
    pub path: PathMarkers,
}

/// Enumerate every boundary state reachable from `start` by ε-transitions
/// alone, in priority order (highest-priority boundary first).
pub fn epsilon_reachable(tnfa: &Tnfa, start: NfaStateId) -> Vec<Boundary> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    walk(tnfa, start, PathMarkers::empty(), &mut order, &mut visited);
    order
}

fn walk(
    tnfa: &Tnfa,
    state: NfaStateId,
    path: PathMarkers,
    order: &mut Vec<Boundary>,
    visited: &mut HashSet<NfaStateId>,
) {
    if !visited.insert(state) {
        return;
    }
    match tnfa.state(state) {
        TnfaState::None | TnfaState::CodeUnits(_) => {
            order.push(Boundary { state, path });
        }
        TnfaState::Alt { minus, plus } => {
            let (minus, plus) = (*minus, *plus);
            walk(tnfa, plus, path.snoc(PathEntry::Alt(AltMarker::Plus)), order, visited);
            walk(tnfa, minus, path.snoc(PathEntry::Alt(AltMarker::Minus)), order, visited);
        }
        TnfaState::Group(marker, target) => {
            let (marker, target): (Marker, NfaStateId) = (*marker, *target);
            walk(tnfa, target, path.snoc(PathEntry::Group(marker)), order, visited);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex_syntax::ast::parse::Parser;

    fn closure_of_initial(pattern: &str) -> (Tnfa, Vec<Boundary>) {
        let ast = Parser::new().parse(pattern).unwrap();
        let compiled = crate::tnfa::compile(&ast, false).unwrap();
        let start = compiled.tnfa.initial();
        let boundaries = epsilon_reachable(&compiled.tnfa, start);
        (compiled.tnfa, boundaries)
    }

    #[test]
    fn literal_closure_has_one_boundary() {
        let (_, boundaries) = closure_of_initial("a");
        assert_eq!(boundaries.len(), 1);
    }

    #[test]
    fn alternation_visits_left_branch_first() {
        let (tnfa, boundaries) = closure_of_initial("a|b");
        // Both arms are single code-unit states reachable by one ε-hop each;
        // the left (`a`) arm must be recorded before the right (`b`) arm.
        assert_eq!(boundaries.len(), 2);
        let first = &boundaries[0].state;
        match tnfa.state(*first) {
            TnfaState::CodeUnits(edges) => {
                assert!(edges[0].0.contains(b'a' as u32));
            }
            other => panic!("expected a code-unit boundary, got {other:?}"),
        }
    }

    #[test]
    fn star_loop_does_not_infinite_loop() {
        // `()*`: an empty group repeated any number of times is a pure
        // ε-cycle through the decision state; this must terminate.
        let (_, boundaries) = closure_of_initial("()*");
        assert!(!boundaries.is_empty());
    }

    #[test]
    fn group_boundaries_are_recorded_on_the_path() {
        let (_, boundaries) = closure_of_initial("(a)");
        let boundary = &boundaries[0];
        assert!(boundary.path.group_markers().any(|m| m.is_start()));
    }
}
