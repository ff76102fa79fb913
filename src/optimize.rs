//! Tag-command optimizer: liveness, dead-store elimination, register
//! coalescing (spec §4.8).
//!
//! The CFG here is the TDFA itself: each state is an empty pass-through
//! node, and each outgoing transition (plus each state's final-command
//! list, if any) is a non-empty block whose `gen`/`kill` come from its
//! commands' read/written registers. No teacher file builds a CFG or does
//! dataflow — this module's shape follows `src/dfa.rs`'s minimizer instead
//! (`calculate_*` helper functions driving a `while changed` fixpoint loop)
//! applied to liveness rather than state partitions. Register coalescing
//! uses the same union-find-with-path-compression idiom as
//! `src/tnfa.rs`'s state aliasing, per the "equivalent in a union-find
//! structure" design note.

use std::collections::{HashMap, HashSet};

use log::trace;

use crate::ids::{DfaStateId, RegisterId};
use crate::register::TagCommand;
use crate::tdfa::{Tdfa, TdfaTransition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BlockId {
    Transition(DfaStateId, usize),
    Final(DfaStateId),
}

/// Run the liveness / dead-store / coalescing passes to a fixpoint (spec
/// §4.8: "Iterate the optimizer until fixpoint").
pub fn optimize(tdfa: &mut Tdfa) {
    let mut round = 0;
    loop {
        round += 1;
        let changed = optimize_pass(tdfa);
        trace!("optimize: pass {round} {}", if changed { "shrank" } else { "reached fixpoint" });
        if !changed {
            break;
        }
    }
}

fn optimize_pass(tdfa: &mut Tdfa) -> bool {
    let state_count = tdfa.state_count();
    let final_live_out: HashSet<RegisterId> = tdfa.dest_map().values().copied().collect();

    let mut live_in: HashMap<BlockId, HashSet<RegisterId>> = HashMap::new();
    for s in 0..state_count {
        let sid = DfaStateId::new(s);
        for i in 0..tdfa.transitions(sid).len() {
            live_in.insert(BlockId::Transition(sid, i), HashSet::new());
        }
    }

    loop {
        let mut changed = false;
        for s in 0..state_count {
            let sid = DfaStateId::new(s);
            for i in 0..tdfa.transitions(sid).len() {
                let target = tdfa.transitions(sid)[i].target;
                let live_out = successor_live_in(tdfa, &live_in, target, &final_live_out);
                let commands = tdfa.transitions(sid)[i].commands.clone();
                let new_in = backward_live_in(&commands, &live_out);
                let slot = live_in.get_mut(&BlockId::Transition(sid, i)).unwrap();
                if *slot != new_in {
                    *slot = new_in;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    // Dead-store elimination and interference-set collection, one block at
    // a time, using the converged live-out values.
    let mut interference: HashSet<(RegisterId, RegisterId)> = HashSet::new();
    let mut new_transitions: Vec<Vec<TdfaTransition>> = Vec::with_capacity(state_count);
    for s in 0..state_count {
        let sid = DfaStateId::new(s);
        let edges = tdfa.transitions(sid);
        let mut kept_edges = Vec::with_capacity(edges.len());
        for edge in edges {
            let live_out = successor_live_in(tdfa, &live_in, edge.target, &final_live_out);
            add_interference(&live_out, &mut interference);
            let (commands, _) = dead_store_eliminate(&edge.commands, &live_out);
            kept_edges.push(TdfaTransition {
                code_units: edge.code_units.clone(),
                commands,
                target: edge.target,
            });
        }
        new_transitions.push(kept_edges);
    }

    let mut new_finals: HashMap<DfaStateId, Vec<TagCommand>> = HashMap::new();
    add_interference(&final_live_out, &mut interference);
    for s in 0..state_count {
        let sid = DfaStateId::new(s);
        if let Some(cmds) = tdfa.final_commands(sid) {
            let (commands, _) = dead_store_eliminate(cmds, &final_live_out);
            new_finals.insert(sid, commands);
        }
    }

    // Register coalescing: union-find over every register, merging a
    // `Copy`'s source into its destination whenever they don't interfere.
    let register_count = tdfa.register_count();
    let mut parent: Vec<RegisterId> = (0..register_count).map(RegisterId::new).collect();
    let mut members: Vec<HashSet<RegisterId>> = (0..register_count)
        .map(|i| {
            let mut s = HashSet::new();
            s.insert(RegisterId::new(i));
            s
        })
        .collect();
    let mut coalesced = false;

    for edges in &new_transitions {
        for edge in edges {
            for cmd in &edge.commands {
                try_coalesce(cmd, &mut parent, &mut members, &interference, &mut coalesced);
            }
        }
    }
    for cmds in new_finals.values() {
        for cmd in cmds {
            try_coalesce(cmd, &mut parent, &mut members, &interference, &mut coalesced);
        }
    }

    if !coalesced {
        // Still apply the dead-store elimination results even if nothing
        // was coalesced this round; report whether anything shrank.
        let shrank = transitions_shrank(tdfa, &new_transitions) || finals_shrank(tdfa, &new_finals);
        tdfa.replace_transitions(new_transitions);
        tdfa.replace_finals(new_finals);
        return shrank;
    }

    let canon: Vec<RegisterId> = (0..register_count).map(|i| find(&mut parent, RegisterId::new(i))).collect();
    let rewrite = |cmd: &TagCommand| -> Option<TagCommand> {
        let rewritten = match *cmd {
            TagCommand::SetPos(r) => TagCommand::SetPos(canon[r.as_usize()]),
            TagCommand::Copy { dst, src } => TagCommand::Copy {
                dst: canon[dst.as_usize()],
                src: canon[src.as_usize()],
            },
        };
        match rewritten {
            TagCommand::Copy { dst, src } if dst == src => None,
            other => Some(other),
        }
    };

    let final_transitions: Vec<Vec<TdfaTransition>> = new_transitions
        .into_iter()
        .map(|edges| {
            edges
                .into_iter()
                .map(|edge| TdfaTransition {
                    code_units: edge.code_units,
                    commands: edge.commands.iter().filter_map(rewrite).collect(),
                    target: edge.target,
                })
                .collect()
        })
        .collect();
    let final_finals: HashMap<DfaStateId, Vec<TagCommand>> = new_finals
        .into_iter()
        .map(|(s, cmds)| (s, cmds.iter().filter_map(rewrite).collect()))
        .collect();
    let new_dest: HashMap<_, _> = tdfa
        .dest_map()
        .iter()
        .map(|(m, r)| (*m, canon[r.as_usize()]))
        .collect();

    tdfa.replace_transitions(final_transitions);
    tdfa.replace_finals(final_finals);
    tdfa.set_dest_map(new_dest);
    true
}

fn successor_live_in(
    tdfa: &Tdfa,
    live_in: &HashMap<BlockId, HashSet<RegisterId>>,
    target: DfaStateId,
    final_live_out: &HashSet<RegisterId>,
) -> HashSet<RegisterId> {
    let mut out = HashSet::new();
    if let Some(cmds) = tdfa.final_commands(target) {
        out.extend(backward_live_in(cmds, final_live_out));
    }
    for j in 0..tdfa.transitions(target).len() {
        if let Some(s) = live_in.get(&BlockId::Transition(target, j)) {
            out.extend(s.iter().copied());
        }
    }
    out
}

/// Run the commands backward from `live_out`, returning the resulting
/// live-in set (used both for the liveness fixpoint and, via
/// [`dead_store_eliminate`], to decide which commands survive).
fn backward_live_in(commands: &[TagCommand], live_out: &HashSet<RegisterId>) -> HashSet<RegisterId> {
    let mut live = live_out.clone();
    for cmd in commands.iter().rev() {
        live.remove(&cmd.dst());
        if let Some(src) = cmd.src() {
            live.insert(src);
        }
    }
    live
}

fn dead_store_eliminate(commands: &[TagCommand], live_out: &HashSet<RegisterId>) -> (Vec<TagCommand>, HashSet<RegisterId>) {
    let mut live = live_out.clone();
    let mut kept = Vec::with_capacity(commands.len());
    for cmd in commands.iter().rev() {
        if live.contains(&cmd.dst()) {
            live.remove(&cmd.dst());
            if let Some(src) = cmd.src() {
                live.insert(src);
            }
            kept.push(*cmd);
        }
    }
    kept.reverse();
    (kept, live)
}

fn add_interference(live: &HashSet<RegisterId>, out: &mut HashSet<(RegisterId, RegisterId)>) {
    let members: Vec<RegisterId> = live.iter().copied().collect();
    for i in 0..members.len() {
        for j in (i + 1)..members.len() {
            out.insert(ordered_pair(members[i], members[j]));
        }
    }
}

fn ordered_pair(a: RegisterId, b: RegisterId) -> (RegisterId, RegisterId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn find(parent: &mut [RegisterId], r: RegisterId) -> RegisterId {
    let p = parent[r.as_usize()];
    if p == r {
        return r;
    }
    let root = find(parent, p);
    parent[r.as_usize()] = root;
    root
}

fn interferes(
    interference: &HashSet<(RegisterId, RegisterId)>,
    members: &[HashSet<RegisterId>],
    a: RegisterId,
    b: RegisterId,
) -> bool {
    for &x in &members[a.as_usize()] {
        for &y in &members[b.as_usize()] {
            if interference.contains(&ordered_pair(x, y)) {
                return true;
            }
        }
    }
    false
}

fn try_coalesce(
    cmd: &TagCommand,
    parent: &mut [RegisterId],
    members: &mut [HashSet<RegisterId>],
    interference: &HashSet<(RegisterId, RegisterId)>,
    coalesced: &mut bool,
) {
    let (dst, src) = match *cmd {
        TagCommand::Copy { dst, src } => (dst, src),
        TagCommand::SetPos(_) => return,
    };
    let ra = find(parent, dst);
    let rb = find(parent, src);
    if ra == rb || interferes(interference, members, ra, rb) {
        return;
    }
    let absorbed: Vec<RegisterId> = members[rb.as_usize()].drain().collect();
    members[ra.as_usize()].extend(absorbed);
    parent[rb.as_usize()] = ra;
    *coalesced = true;
}

fn transitions_shrank(tdfa: &Tdfa, new_transitions: &[Vec<TdfaTransition>]) -> bool {
    (0..tdfa.state_count()).any(|s| {
        let sid = DfaStateId::new(s);
        let old_len: usize = tdfa.transitions(sid).iter().map(|e| e.commands.len()).sum();
        let new_len: usize = new_transitions[s].iter().map(|e| e.commands.len()).sum();
        new_len != old_len
    })
}

fn finals_shrank(tdfa: &Tdfa, new_finals: &HashMap<DfaStateId, Vec<TagCommand>>) -> bool {
    (0..tdfa.state_count()).any(|s| {
        let sid = DfaStateId::new(s);
        let old_len = tdfa.final_commands(sid).map_or(0, |c| c.len());
        let new_len = new_finals.get(&sid).map_or(0, |c| c.len());
        new_len != old_len
    })
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
        crate::tdfa::determinize(&compiled.tnfa, &mut compiled.groups, MatchMode::Full).unwrap()
    }

    #[test]
    fn optimize_does_not_break_a_simple_literal() {
        let mut tdfa = build("abc");
        optimize(&mut tdfa);
        let mut state = tdfa.initial();
        for _ in 0..3 {
            let edges = tdfa.transitions(state);
            assert_eq!(edges.len(), 1);
            state = edges[0].target;
        }
        assert!(tdfa.is_final(state));
    }

    #[test]
    fn optimize_drops_unreachable_group_bookkeeping() {
        // no capture groups besides the whole match: after optimization
        // there should be very little register traffic left.
        let mut tdfa = build("abc");
        optimize(&mut tdfa);
        let total_commands: usize = (0..tdfa.state_count())
            .map(|s| {
                tdfa.transitions(DfaStateId::new(s))
                    .iter()
                    .map(|e| e.commands.len())
                    .sum::<usize>()
            })
            .sum();
        // group 0 is anchored at both ends for a fixed-width literal, so no
        // transition commands should survive at all.
        assert_eq!(total_commands, 0);
    }
}
