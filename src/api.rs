//! Public surface: compile a pattern, run it, iterate matches, replace
//! (spec §6 "External interfaces").
//!
//! `Regex` plays the role of `src/runtime/regex.rs`'s `Regex` — a small
//! struct owning the compiled automata a caller drives — except where that
//! `Regex` advances several per-token DFAs in lock step over one haystack,
//! this one holds three TDFAs compiled from the *same* pattern under the
//! three modes spec §6 names (`match`, `lookingAt`, `find`).
//! `FindMatches` mirrors `src/runtime/find_matches.rs`'s char-boundary
//! advance-past-match logic, adapted to restart a single TDFA at the next
//! offset rather than resetting several DFAs in parallel.

use crate::error::Result;
use crate::tdfa::{MatchMode, Tdfa};
use crate::{minimize, optimize, parser, simulate, tnfa};

/// Parameters for compiling a pattern (spec §2 "Configuration"). Beyond the
/// three call-site parameters spec §6 names directly, `max_states` is a
/// size guard: a pathological pattern (deeply nested bounded repetition,
/// wide alternation) can blow up determinization, and a library embedded in
/// a service should fail fast rather than hang.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    pub mode: MatchMode,
    pub include_wildcard_prefix: bool,
    pub max_states: Option<usize>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            mode: MatchMode::Full,
            include_wildcard_prefix: false,
            max_states: None,
        }
    }
}

/// Compile `pattern` into a tagged DFA (spec §6 "Compile").
pub fn compile(pattern: &str, mode: MatchMode, include_wildcard_prefix: bool) -> Result<Tdfa> {
    compile_with_options(
        pattern,
        CompileOptions {
            mode,
            include_wildcard_prefix,
            ..CompileOptions::default()
        },
    )
}

/// Same as [`compile`], with the full [`CompileOptions`] knob set.
pub fn compile_with_options(pattern: &str, options: CompileOptions) -> Result<Tdfa> {
    let ast = parser::parse(pattern)?;
    let mut compiled = tnfa::compile(&ast, options.include_wildcard_prefix)?;
    let mut tdfa = crate::tdfa::determinize(&compiled.tnfa, &mut compiled.groups, options.mode)?;
    optimize::optimize(&mut tdfa);
    minimize::minimize(&mut tdfa);
    if let Some(max) = options.max_states {
        if tdfa.state_count() > max {
            return Err(crate::error::Error::illegal_state(format!(
                "compiled TDFA has {} states, exceeding the configured limit of {max}",
                tdfa.state_count()
            )));
        }
    }
    Ok(tdfa)
}

/// A compiled regular expression, ready to match, look-at, find, or
/// replace within haystacks (spec §6).
#[derive(Debug)]
pub struct Regex {
    full: Tdfa,
    looking_at: Tdfa,
    find: Tdfa,
}

impl Regex {
    /// Compile `pattern` with default options.
    pub fn new(pattern: &str) -> Result<Self> {
        Self::with_options(pattern, CompileOptions::default())
    }

    /// Compile `pattern`, applying `options.mode`/`include_wildcard_prefix`
    /// only to the size guard shared by all three internal TDFAs.
    pub fn with_options(pattern: &str, options: CompileOptions) -> Result<Self> {
        let full = compile_with_options(
            pattern,
            CompileOptions {
                mode: MatchMode::Full,
                include_wildcard_prefix: false,
                max_states: options.max_states,
            },
        )?;
        let looking_at = compile_with_options(
            pattern,
            CompileOptions {
                mode: MatchMode::Prefix,
                include_wildcard_prefix: false,
                max_states: options.max_states,
            },
        )?;
        let find = compile_with_options(
            pattern,
            CompileOptions {
                mode: MatchMode::Prefix,
                include_wildcard_prefix: true,
                max_states: options.max_states,
            },
        )?;
        Ok(Regex { full, looking_at, find })
    }

    /// Match the whole of `haystack`, with capture groups, or `None` if it
    /// does not match in full (spec §6 "match", FULL mode).
    pub fn matches<'h>(&self, haystack: &'h str) -> Result<Option<MatchResult<'h>>> {
        self.run_from(&self.full, haystack, 0)
    }

    /// Whether the whole of `haystack` matches (spec §6 "match", FULL mode).
    pub fn is_match(&self, haystack: &str) -> Result<bool> {
        Ok(self.matches(haystack)?.is_some())
    }

    /// Whether `haystack` starts with a match, without requiring it to
    /// consume the whole input (spec §6 "lookingAt", PREFIX mode).
    pub fn looking_at<'h>(&self, haystack: &'h str) -> Result<Option<MatchResult<'h>>> {
        self.run_from(&self.looking_at, haystack, 0)
    }

    /// The first match anywhere in `haystack` (spec §6 "find", PREFIX mode
    /// with the wildcard prefix baked into the TDFA).
    pub fn find<'h>(&self, haystack: &'h str) -> Result<Option<MatchResult<'h>>> {
        self.find_from(haystack, 0)
    }

    /// An iterator over all non-overlapping matches (spec §6 "Replace-all"'s
    /// underlying primitive).
    pub fn find_iter<'r, 'h>(&'r self, haystack: &'h str) -> FindMatches<'r, 'h> {
        FindMatches {
            regex: self,
            haystack,
            next_start: Some(0),
        }
    }

    /// Splice `replacement` literally in place of every match (spec §6
    /// "Replace-all"; no dollar-substitution in this core).
    pub fn replace_all(&self, haystack: &str, replacement: &str) -> Result<String> {
        let mut out = String::with_capacity(haystack.len());
        let mut last = 0usize;
        for found in self.find_iter(haystack) {
            let m = found?;
            out.push_str(&haystack[last..m.start() as usize]);
            out.push_str(replacement);
            last = m.end() as usize;
        }
        out.push_str(&haystack[last..]);
        Ok(out)
    }

    fn find_from<'h>(&self, haystack: &'h str, start: usize) -> Result<Option<MatchResult<'h>>> {
        self.run_from(&self.find, haystack, start)
    }

    fn run_from<'h>(&self, tdfa: &Tdfa, haystack: &'h str, start: usize) -> Result<Option<MatchResult<'h>>> {
        Ok(simulate::run(tdfa, haystack, start, haystack.len())?.map(|offsets| MatchResult { haystack, offsets }))
    }
}

/// One match: a haystack reference plus the `[s0, e0, s1, e1, ...]` offset
/// array the simulator produced (spec §3 "Match result").
#[derive(Debug, Clone)]
pub struct MatchResult<'h> {
    haystack: &'h str,
    offsets: Vec<i64>,
}

impl<'h> MatchResult<'h> {
    /// Number of capture groups, including group 0 (the whole match).
    pub fn group_count(&self) -> usize {
        self.offsets.len() / 2
    }

    /// Start offset of group `i`, or `-1` if the group did not participate
    /// in this match. Panics if `i >= group_count()` (spec §6:
    /// "indices out of range raise IndexOutOfBoundsError").
    pub fn group_start(&self, i: usize) -> i64 {
        self.offsets[self.bounds_checked(i) * 2]
    }

    /// End offset of group `i`, or `-1` if the group did not participate in
    /// this match. Panics if `i >= group_count()`.
    pub fn group_end(&self, i: usize) -> i64 {
        self.offsets[self.bounds_checked(i) * 2 + 1]
    }

    /// The slice of the haystack matched by group `i`, or `None` if the
    /// group did not participate in this match.
    pub fn group(&self, i: usize) -> Option<&'h str> {
        let (s, e) = (self.group_start(i), self.group_end(i));
        if s < 0 || e < 0 {
            None
        } else {
            Some(&self.haystack[s as usize..e as usize])
        }
    }

    /// Start offset of the whole match (group 0).
    pub fn start(&self) -> i64 {
        self.group_start(0)
    }

    /// End offset of the whole match (group 0).
    pub fn end(&self) -> i64 {
        self.group_end(0)
    }

    /// The slice of the haystack matched as a whole.
    pub fn as_str(&self) -> &'h str {
        self.group(0).expect("group 0 always participates in a successful match")
    }

    fn bounds_checked(&self, i: usize) -> usize {
        assert!(i < self.group_count(), "group index {i} out of range (0..{})", self.group_count());
        i
    }
}

/// An iterator over all non-overlapping matches of a [`Regex`] in a
/// haystack, grounded on `src/runtime/find_matches.rs`'s `FindMatches`: the
/// same char-boundary advance-past-match logic, but restarting a single
/// TDFA at the next start offset instead of resetting several DFAs that
/// were advanced one character at a time.
#[derive(Debug)]
pub struct FindMatches<'r, 'h> {
    regex: &'r Regex,
    haystack: &'h str,
    next_start: Option<usize>,
}

impl<'r, 'h> Iterator for FindMatches<'r, 'h> {
    type Item = Result<MatchResult<'h>>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        if start > self.haystack.len() {
            self.next_start = None;
            return None;
        }
        match self.regex.find_from(self.haystack, start) {
            Ok(Some(m)) => {
                let end = m.end() as usize;
                self.next_start = Some(if end > start {
                    end
                } else {
                    next_char_boundary(self.haystack, end)
                });
                Some(Ok(m))
            }
            Ok(None) => {
                self.next_start = None;
                None
            }
            Err(e) => {
                self.next_start = None;
                Some(Err(e))
            }
        }
    }
}

/// The first char boundary strictly after `from`, or `haystack.len() + 1`
/// (an out-of-range sentinel that stops the next [`FindMatches`] call) if
/// `from` is at or past the end. Used to step past an empty match without
/// looping forever on it.
fn next_char_boundary(haystack: &str, from: usize) -> usize {
    if from >= haystack.len() {
        return haystack.len() + 1;
    }
    let mut i = from + 1;
    while i < haystack.len() && !haystack.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_match_requires_full_consumption() {
        let re = Regex::new("ab+c").unwrap();
        assert!(re.is_match("abbbc").unwrap());
        assert!(!re.is_match("abbbcx").unwrap());
    }

    #[test]
    fn matches_reports_whole_match_groups() {
        let re = Regex::new("a(b*)c").unwrap();
        let m = re.matches("abbbc").unwrap().unwrap();
        assert_eq!(m.as_str(), "abbbc");
        assert_eq!(m.group(1), Some("bbb"));
        assert!(re.matches("abbbcx").unwrap().is_none());
    }

    #[test]
    fn looking_at_does_not_require_full_consumption() {
        let re = Regex::new("ab+").unwrap();
        assert!(re.looking_at("abbbcx").unwrap().is_some());
        assert!(re.looking_at("xabbb").unwrap().is_none());
    }

    #[test]
    fn looking_at_falls_back_past_a_dead_higher_priority_alternative() {
        // The "aab" arm is tried first (higher priority) and dies on the
        // third character, but "a" already matched at position 0 by then —
        // that earlier match must still win, not be discarded.
        let re = Regex::new("aab|a").unwrap();
        let m = re.looking_at("aaX").unwrap().unwrap();
        assert_eq!(m.as_str(), "a");
        assert_eq!((m.start(), m.end()), (0, 1));
    }

    #[test]
    fn find_locates_first_match_anywhere() {
        let re = Regex::new("[0-9]+").unwrap();
        let m = re.find("total: 42 items").unwrap().unwrap();
        assert_eq!(m.as_str(), "42");
        assert_eq!(m.start(), 7);
        assert_eq!(m.end(), 9);
    }

    #[test]
    fn find_reports_capture_groups() {
        let re = Regex::new(r"(\d+)-(\d+)").unwrap();
        let m = re.find("range 10-20 here").unwrap().unwrap();
        assert_eq!(m.group(1), Some("10"));
        assert_eq!(m.group(2), Some("20"));
    }

    #[test]
    fn unset_group_reports_none() {
        let re = Regex::new(r"(a)|b").unwrap();
        let m = re.find("b").unwrap().unwrap();
        assert_eq!(m.group(1), None);
        assert_eq!(m.group_start(1), -1);
    }

    #[test]
    fn find_iter_yields_all_non_overlapping_matches() {
        let re = Regex::new("[0-9]+").unwrap();
        let found: Vec<String> = re
            .find_iter("a1 b22 c333")
            .map(|m| m.unwrap().as_str().to_string())
            .collect();
        assert_eq!(found, vec!["1", "22", "333"]);
    }

    #[test]
    fn find_iter_makes_progress_on_empty_matches() {
        let re = Regex::new("a*").unwrap();
        let found: Vec<(i64, i64)> = re
            .find_iter("baab")
            .map(|m| {
                let m = m.unwrap();
                (m.start(), m.end())
            })
            .collect();
        assert!(found.len() > 1);
    }

    #[test]
    fn replace_all_splices_literally() {
        let re = Regex::new("[0-9]+").unwrap();
        let replaced = re.replace_all("a1 b22 c333", "#").unwrap();
        assert_eq!(replaced, "a# b# c#");
    }

    #[test]
    #[should_panic]
    fn out_of_range_group_panics() {
        let re = Regex::new("a").unwrap();
        let m = re.find("a").unwrap().unwrap();
        let _ = m.group_start(5);
    }

    #[test]
    fn compile_rejects_unsupported_boundary_assertions() {
        assert!(compile(r"^a$", MatchMode::Full, false).is_err());
    }

    #[test]
    fn compile_with_options_enforces_state_guard() {
        let options = CompileOptions {
            mode: MatchMode::Full,
            include_wildcard_prefix: false,
            max_states: Some(1),
        };
        assert!(compile_with_options("abc", options).is_err());
    }
}
