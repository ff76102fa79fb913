#![warn(missing_docs)]
//! # tagdfa
//!
//! A tagged-DFA regular expression engine: patterns compile to a
//! deterministic automaton with capture groups resolved at compile time
//! wherever possible, so matching runs in a single linear pass over the
//! input with no backtracking.
//!
//! The pipeline mirrors a conventional regex-to-DFA compiler's shape —
//! parse, build an NFA, determinize, minimize — generalized at each stage
//! to carry capture-group "tag commands" alongside the ordinary code-unit
//! transitions:
//!
//! 1. [`parser`] hands a pattern to `regex_syntax` and gets back its AST.
//! 2. [`ast`] bridges that AST to this crate's own [`ast::Visitor`]
//!    contract and does static fixed-width analysis.
//! 3. [`tnfa`] builds a tagged NFA: code-unit transitions, alternation
//!    priority edges, and capture-group boundary markers.
//! 4. [`epsilon`] computes priority-ordered epsilon-closures over it.
//! 5. [`tdfa`] determinizes the TNFA into a tagged DFA via a subset
//!    construction that also allocates and assigns registers.
//! 6. [`optimize`] runs liveness analysis to drop dead tag commands and
//!    coalesce registers.
//! 7. [`minimize`] runs a Hopcroft-style partition refinement that treats
//!    two states as distinguishable unless their transition tables —
//!    code units *and* commands — are identical.
//! 8. [`simulate`] walks the resulting automaton over a haystack and
//!    reconstructs every capture group's offsets, including the ones
//!    resolved statically rather than tracked at runtime
//!    ([`group_marker`]'s fixed-distance classes).
//!
//! [`api`] is the public surface built on top of this pipeline:
//! [`api::Regex`] compiles a pattern once and exposes `is_match`,
//! `looking_at`, `find`, `find_iter`, and `replace_all`.
//!
//! # Example
//!
//! ```rust
//! use tagdfa::Regex;
//!
//! let re = Regex::new(r"(\d+)-(\d+)").expect("valid pattern");
//! let m = re.find("range 10-20 here").expect("no internal error").expect("a match");
//! assert_eq!(m.as_str(), "10-20");
//! assert_eq!(m.group(1), Some("10"));
//! assert_eq!(m.group(2), Some("20"));
//! ```

/// Canonical code-unit range sets.
pub mod range_set;

/// Code-unit encodings and the UTF-16 surrogate-pair splitting trie.
pub mod code_unit;

/// Capture-group boundary markers and their fixed-distance classes.
pub mod group_marker;

/// Alternation priority and group-boundary path markers used for
/// epsilon-closure ordering.
pub mod pathmarker;

/// Dense newtype ids for NFA states, DFA states, groups, and registers.
pub mod ids;

/// Registers and tag commands.
pub mod register;

/// The crate's error taxonomy.
pub mod error;

/// The regex AST and the visitor contract TNFA construction implements.
pub mod ast;

/// Tagged NFA construction.
pub mod tnfa;

/// Priority-ordered epsilon-closures.
pub mod epsilon;

/// TNFA to TDFA determinization.
pub mod tdfa;

/// Tag-command liveness analysis and register coalescing.
pub mod optimize;

/// Command-aware TDFA minimization.
pub mod minimize;

/// The TDFA simulator and fixed-tag finalizer.
pub mod simulate;

/// The `regex_syntax` parsing bridge.
pub mod parser;

/// The public compile/match/find/replace surface.
pub mod api;

pub use api::{compile, compile_with_options, CompileOptions, FindMatches, MatchResult, Regex};
pub use error::{Error, ErrorKind, Result};
pub use tdfa::MatchMode;
