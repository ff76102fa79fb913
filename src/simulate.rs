//! TDFA simulation and the fixed-tag finalizer (spec §4.10).
//!
//! The scan loop is grounded on `src/runtime/dfa.rs`'s `Dfa::advance` /
//! `MatchingState` shape — one state, one current position, one transition
//! lookup per input element — generalized from a plain accept/reject
//! automaton to one that executes [`TagCommand`]s on every step and
//! materializes capture-group offsets on acceptance. Positions are byte
//! offsets into the `&str` haystack; `src/code_unit.rs`'s default
//! [`crate::code_unit::Encoding::Utf32`] means one `char` is consumed per
//! step, so a capture boundary's recorded position is always a valid
//! `str` byte index, usable directly for slicing.

use crate::error::{Error, Result};
use crate::group_marker::FixedClass;
use crate::register::TagCommand;
use crate::tdfa::{MatchMode, Tdfa};

/// Run `tdfa` against `haystack[start..end]`, writing the even-length
/// `[s0, e0, s1, e1, ...]` capture-offset array into `out` (spec §3 "Match
/// result"). `out` must have length `2 * tdfa.group_count()` — a mismatch
/// is the "wrong-sized output group array" failure mode of spec §7,
/// reported as [`crate::error::ErrorKind::IllegalState`] rather than a
/// panic, since it indicates caller/compiler disagreement, not bad input.
///
/// Returns `Ok(true)` on a match (with `out` filled in), `Ok(false)` on no
/// match (`out` is reset to all `-1` either way).
pub fn run_into(tdfa: &Tdfa, haystack: &str, start: usize, end: usize, out: &mut [i64]) -> Result<bool> {
    if out.len() != 2 * tdfa.group_count() {
        return Err(Error::illegal_state(format!(
            "expected a {}-slot output array (2 * group count), got {}",
            2 * tdfa.group_count(),
            out.len()
        )));
    }
    out.fill(-1);
    debug_assert!(start <= end && end <= haystack.len());
    debug_assert!(haystack.is_char_boundary(start) && haystack.is_char_boundary(end));

    let mut registers = vec![-1i64; tdfa.register_count()];
    let mut state = tdfa.initial();
    let mut pos = start;

    loop {
        if pos >= end {
            break;
        }
        let c = haystack[pos..end]
            .chars()
            .next()
            .expect("pos < end implies at least one more char");
        match find_transition(tdfa, state, c) {
            Some(transition_idx) => {
                let transition = &tdfa.transitions(state)[transition_idx];
                execute(&mut registers, &transition.commands, pos);
                state = transition.target;
                pos += c.len_utf8();
            }
            None => {
                if tdfa.mode() == MatchMode::Prefix && tdfa.is_final(state) {
                    break;
                }
                return Ok(false);
            }
        }
    }

    if !tdfa.is_final(state) {
        return Ok(false);
    }
    if let Some(cmds) = tdfa.final_commands(state) {
        execute(&mut registers, cmds, pos);
    }

    materialize(tdfa, &registers, start, pos, out)?;
    Ok(true)
}

/// Same as [`run_into`] but allocates its own output array.
pub fn run(tdfa: &Tdfa, haystack: &str, start: usize, end: usize) -> Result<Option<Vec<i64>>> {
    let mut out = vec![-1i64; 2 * tdfa.group_count()];
    if run_into(tdfa, haystack, start, end, &mut out)? {
        Ok(Some(out))
    } else {
        Ok(None)
    }
}

#[inline]
fn find_transition(tdfa: &Tdfa, state: crate::ids::DfaStateId, c: char) -> Option<usize> {
    tdfa.transitions(state)
        .iter()
        .position(|t| t.code_units.contains(c as u32))
}

#[inline]
fn execute(registers: &mut [i64], commands: &[TagCommand], pos: usize) {
    for cmd in commands {
        match *cmd {
            TagCommand::SetPos(r) => registers[r.as_usize()] = pos as i64,
            TagCommand::Copy { dst, src } => registers[dst.as_usize()] = registers[src.as_usize()],
        }
    }
}

/// Reconstruct every marker's absolute offset — tracked markers from their
/// register, fixed-distance markers from their class's anchor or
/// representative (spec §4.10's closing paragraph).
fn materialize(tdfa: &Tdfa, registers: &[i64], start: usize, end: usize, out: &mut [i64]) -> Result<()> {
    for (&marker, &class) in tdfa.marker_classes() {
        let group = marker.group().as_usize();
        let slot = if marker.is_start() { 2 * group } else { 2 * group + 1 };
        let value = match class {
            FixedClass::AnchoredStart { offset } => start as i64 + offset,
            FixedClass::AnchoredEnd { offset } => end as i64 + offset,
            FixedClass::Representative => {
                let reg = tdfa
                    .dest(marker)
                    .ok_or_else(|| Error::illegal_state(format!("marker {marker} has no tracked register")))?;
                registers[reg.as_usize()]
            }
            FixedClass::Member { representative, offset } => {
                let reg = tdfa.dest(representative).ok_or_else(|| {
                    Error::illegal_state(format!("class representative {representative} has no tracked register"))
                })?;
                let rep_pos = registers[reg.as_usize()];
                if rep_pos == -1 {
                    -1
                } else {
                    rep_pos + offset
                }
            }
        };
        if let Some(slot_ref) = out.get_mut(slot) {
            *slot_ref = value;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex_syntax::ast::parse::Parser;

    use crate::optimize::optimize;
    use crate::tdfa::determinize;

    fn build(pattern: &str, mode: MatchMode) -> Tdfa {
        let ast = Parser::new().parse(pattern).unwrap();
        let mut compiled = crate::tnfa::compile(&ast, mode == MatchMode::Prefix).unwrap();
        let mut tdfa = determinize(&compiled.tnfa, &mut compiled.groups, mode).unwrap();
        optimize(&mut tdfa);
        crate::minimize::minimize(&mut tdfa);
        tdfa
    }

    #[test]
    fn full_match_with_variable_width_group() {
        let tdfa = build("a(b*)c", MatchMode::Full);
        let out = run(&tdfa, "abbbc", 0, 5).unwrap().unwrap();
        assert_eq!(out, vec![0, 5, 1, 4]);
    }

    #[test]
    fn full_match_with_empty_group() {
        let tdfa = build("a(b*)c", MatchMode::Full);
        let out = run(&tdfa, "ac", 0, 2).unwrap().unwrap();
        assert_eq!(out, vec![0, 2, 1, 1]);
    }

    #[test]
    fn left_priority_alternation() {
        let tdfa = build("(a|ab)(bc|c)", MatchMode::Full);
        let out = run(&tdfa, "abc", 0, 3).unwrap().unwrap();
        assert_eq!(out, vec![0, 3, 0, 1, 1, 3]);
    }

    #[test]
    fn unset_group_is_negative_one() {
        let tdfa = build("(a)|b", MatchMode::Full);
        let out = run(&tdfa, "b", 0, 1).unwrap().unwrap();
        assert_eq!(out, vec![0, 1, -1, -1]);
    }

    #[test]
    fn full_mode_rejects_partial_input() {
        let tdfa = build("ab", MatchMode::Full);
        assert!(run(&tdfa, "abc", 0, 3).unwrap().is_none());
    }

    #[test]
    fn prefix_mode_stops_at_last_accepting_position() {
        let tdfa = build("a+", MatchMode::Prefix);
        let out = run(&tdfa, "aaab", 0, 4).unwrap().unwrap();
        assert_eq!(out, vec![0, 3]);
    }

    #[test]
    fn prefix_mode_falls_back_to_an_earlier_match_when_a_longer_alternative_dies() {
        // "aab|a" against "aaX": the higher-priority "aab" arm shares its
        // first two code units with the lower-priority "a" arm, then dies
        // on the third. The match already completed at position 1 for the
        // "a" arm must still be reported, not lost.
        let tdfa = build("aab|a", MatchMode::Prefix);
        let out = run(&tdfa, "aaX", 0, 3).unwrap().unwrap();
        assert_eq!(out, vec![0, 1]);
    }

    #[test]
    fn wrong_sized_output_array_is_illegal_state() {
        let tdfa = build("a", MatchMode::Full);
        let mut out = vec![0i64; 1];
        assert!(run_into(&tdfa, "a", 0, 1, &mut out).is_err());
    }

    #[test]
    fn empty_input_matches_star() {
        let tdfa = build("a*", MatchMode::Full);
        let out = run(&tdfa, "", 0, 0).unwrap().unwrap();
        assert_eq!(out, vec![0, 0]);
    }
}
