//! TDFA minimization: a Hopcroft-style partition refinement that
//! distinguishes states not only by their target partition but also by the
//! *commands* on the transitions leading there (spec §4.9).
//!
//! Grounded on `src/dfa.rs`'s `minimize`/`calculate_initial_partition`/
//! `calculate_new_partition`/`split_group`: a `while changed` fixpoint over
//! a `Partition = Vec<BTreeSet<DfaStateId>>`, each round splitting every
//! group by sorting its states on a per-state "transitions to group"
//! signature and running `itertools::Itertools::chunk_by` over the sorted
//! run, the same way `calculate_initial_partition` chunks states by
//! pattern id. The only generalization is what goes into that signature —
//! `TransitionsToPartitionGroups` there carries `(CharacterClass, group)`
//! pairs; this carries `(RangeSet, Vec<TagCommand>, group)` triples, since
//! two states reachable by the same code units but with different register
//! effects are not interchangeable for a tagged machine (spec §8 property 6:
//! "no two states have identical outgoing transition tables").
//!
//! A command-blind variant (`minimize_checking_only`) exists for a
//! check-only (no-capture) matcher, per spec §4.9's closing note.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use log::trace;

use crate::ids::DfaStateId;
use crate::range_set::RangeSet;
use crate::register::TagCommand;
use crate::tdfa::{Tdfa, TdfaTransition};

type StateGroup = BTreeSet<DfaStateId>;
type Partition = Vec<StateGroup>;

/// One state's outgoing signature relative to a partition: for each
/// transition, the code units consumed, the commands run, and which group
/// the target belongs to. Final-command lists participate too, via a
/// leading sentinel entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Signature(Vec<(RangeSet, Vec<TagCommand>, usize)>, Option<Vec<TagCommand>>);

/// Minimize `tdfa` in place, respecting transition commands (spec §4.9).
pub fn minimize(tdfa: &mut Tdfa) {
    let mut partition = initial_partition(tdfa);
    trace!("minimize: initial partition has {} groups", partition.len());
    loop {
        let refined = refine(tdfa, &partition);
        if refined.len() == partition.len() {
            break;
        }
        trace!("minimize: refined to {} groups", refined.len());
        partition = refined;
    }
    apply_partition(tdfa, &partition);
}

/// Command-blind minimization: groups states purely by reachable code-unit
/// partition, ignoring commands — suitable only for a matcher that reports
/// match/no-match without capture groups (spec §4.9's "check-only" note).
pub fn minimize_checking_only(tdfa: &mut Tdfa) {
    let mut partition = initial_partition_checking_only(tdfa);
    loop {
        let refined = refine_checking_only(tdfa, &partition);
        if refined.len() == partition.len() {
            break;
        }
        partition = refined;
    }
    apply_partition(tdfa, &partition);
}

fn initial_partition(tdfa: &Tdfa) -> Partition {
    let mut states: Vec<(Option<Vec<TagCommand>>, DfaStateId)> = (0..tdfa.state_count())
        .map(|s| {
            let sid = DfaStateId::new(s);
            (tdfa.final_commands(sid).map(|c| c.to_vec()), sid)
        })
        .collect();
    states.sort();
    states
        .into_iter()
        .chunk_by(|(key, _)| key.clone())
        .into_iter()
        .map(|(_, group)| group.map(|(_, sid)| sid).collect())
        .collect()
}

fn initial_partition_checking_only(tdfa: &Tdfa) -> Partition {
    let mut finals = StateGroup::new();
    let mut non_finals = StateGroup::new();
    for s in 0..tdfa.state_count() {
        let sid = DfaStateId::new(s);
        if tdfa.is_final(sid) {
            finals.insert(sid);
        } else {
            non_finals.insert(sid);
        }
    }
    [finals, non_finals].into_iter().filter(|g| !g.is_empty()).collect()
}

fn group_of(partition: &Partition, state: DfaStateId) -> usize {
    partition
        .iter()
        .position(|g| g.contains(&state))
        .expect("every state belongs to exactly one partition group")
}

fn signature(tdfa: &Tdfa, state: DfaStateId, partition: &Partition) -> Signature {
    let mut edges: Vec<(RangeSet, Vec<TagCommand>, usize)> = tdfa
        .transitions(state)
        .iter()
        .map(|t| (t.code_units.clone(), t.commands.clone(), group_of(partition, t.target)))
        .collect();
    edges.sort();
    Signature(edges, tdfa.final_commands(state).map(|c| c.to_vec()))
}

fn signature_checking_only(tdfa: &Tdfa, state: DfaStateId, partition: &Partition) -> Vec<(RangeSet, usize)> {
    let mut edges: Vec<(RangeSet, usize)> = tdfa
        .transitions(state)
        .iter()
        .map(|t| (t.code_units.clone(), group_of(partition, t.target)))
        .collect();
    edges.sort();
    edges
}

fn refine(tdfa: &Tdfa, partition: &Partition) -> Partition {
    let mut refined = Partition::new();
    for group in partition {
        if group.len() == 1 {
            refined.push(group.clone());
            continue;
        }
        let mut keyed: Vec<(Signature, DfaStateId)> =
            group.iter().map(|&state| (signature(tdfa, state, partition), state)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, chunk) in &keyed.into_iter().chunk_by(|(sig, _)| sig.clone()) {
            refined.push(chunk.map(|(_, state)| state).collect());
        }
    }
    refined
}

fn refine_checking_only(tdfa: &Tdfa, partition: &Partition) -> Partition {
    let mut refined = Partition::new();
    for group in partition {
        if group.len() == 1 {
            refined.push(group.clone());
            continue;
        }
        let mut keyed: Vec<(Vec<(RangeSet, usize)>, DfaStateId)> = group
            .iter()
            .map(|&state| (signature_checking_only(tdfa, state, partition), state))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, chunk) in &keyed.into_iter().chunk_by(|(sig, _)| sig.clone()) {
            refined.push(chunk.map(|(_, state)| state).collect());
        }
    }
    refined
}

/// Rebuild `tdfa`'s transitions/finals/initial state from a converged
/// partition: each group collapses to its smallest-id member.
fn apply_partition(tdfa: &mut Tdfa, partition: &[StateGroup]) {
    let representative: BTreeMap<DfaStateId, DfaStateId> = partition
        .iter()
        .flat_map(|g| {
            let rep = *g.iter().next().expect("partition groups are non-empty");
            g.iter().map(move |&s| (s, rep))
        })
        .collect();

    let mut kept: Vec<DfaStateId> = representative.values().copied().collect();
    kept.sort();
    kept.dedup();
    let renumber: BTreeMap<DfaStateId, DfaStateId> =
        kept.iter().enumerate().map(|(i, &s)| (s, DfaStateId::new(i))).collect();
    let remap = |s: DfaStateId| renumber[&representative[&s]];

    let mut new_transitions: Vec<Vec<TdfaTransition>> = vec![Vec::new(); kept.len()];
    let mut new_finals = std::collections::HashMap::new();
    for &old in &kept {
        let new_id = remap(old);
        let edges = tdfa
            .transitions(old)
            .iter()
            .map(|t| TdfaTransition {
                code_units: t.code_units.clone(),
                commands: t.commands.clone(),
                target: remap(t.target),
            })
            .collect();
        new_transitions[new_id.as_usize()] = edges;
        if let Some(cmds) = tdfa.final_commands(old) {
            new_finals.insert(new_id, cmds.to_vec());
        }
    }

    let new_initial = remap(tdfa.initial());
    tdfa.replace_transitions(new_transitions);
    tdfa.replace_finals(new_finals);
    tdfa.set_initial(new_initial);
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex_syntax::ast::parse::Parser;

    use crate::tdfa::MatchMode;

    // Initialize the logger for the tests
    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn build(pattern: &str) -> Tdfa {
        init();
        let ast = Parser::new().parse(pattern).unwrap();
        let mut compiled = crate::tnfa::compile(&ast, false).unwrap();
        let mut tdfa = crate::tdfa::determinize(&compiled.tnfa, &mut compiled.groups, MatchMode::Full).unwrap();
        crate::optimize::optimize(&mut tdfa);
        tdfa
    }

    #[test]
    fn minimize_is_idempotent_on_state_count() {
        let mut tdfa = build("(a|b)*abb");
        minimize(&mut tdfa);
        let once = tdfa.state_count();
        minimize(&mut tdfa);
        assert_eq!(tdfa.state_count(), once);
    }

    #[test]
    fn minimize_preserves_acceptance_of_a_simple_literal() {
        let mut tdfa = build("abc");
        minimize(&mut tdfa);
        let mut state = tdfa.initial();
        for _ in 0..3 {
            let edges = tdfa.transitions(state);
            assert_eq!(edges.len(), 1);
            state = edges[0].target;
        }
        assert!(tdfa.is_final(state));
    }

    #[test]
    fn no_two_minimized_states_share_a_transition_table() {
        let mut tdfa = build("a(b|c)*d");
        minimize(&mut tdfa);
        let partition = initial_partition(&tdfa);
        // After minimization every group in the converged partition (which
        // is now just "each state alone") must be a singleton; re-running
        // one refinement round from the trivial final/non-final partition
        // should not split further than state-count groups.
        let all_states: StateGroup = (0..tdfa.state_count()).map(DfaStateId::new).collect();
        let _ = all_states;
        let refined = refine(&tdfa, &partition);
        let signatures: Vec<Signature> = (0..tdfa.state_count())
            .map(|s| signature(&tdfa, DfaStateId::new(s), &refined))
            .collect();
        for i in 0..signatures.len() {
            for j in (i + 1)..signatures.len() {
                assert_ne!(signatures[i], signatures[j], "states {i} and {j} have identical tables");
            }
        }
    }
}
