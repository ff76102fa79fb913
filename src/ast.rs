//! Regex AST visitor contract (spec §4.4) and the bridge from
//! `regex_syntax`'s AST into it.
//!
//! Per spec §1, the surface-syntax parser is out of scope for this core —
//! only the bottom-up visitor contract is. `regex_syntax` plays the role of
//! that external parser here, exactly as it does for `src/nfa.rs`'s
//! `impl TryFrom<Ast> for Nfa` above. What is in scope is the [`Visitor`]
//! trait below and [`walk`], which drives it bottom-up over a parsed
//! `regex_syntax::ast::Ast` the same way that `TryFrom` recursed over it,
//! generalized from "build an `Nfa` directly" to "call back into any
//! visitor".
//!
//! Character-class handling (`class_*`) is grounded in
//! `src/compiletime/match_function.rs`'s exhaustive match over
//! `ClassSet`/`ClassPerl`/`ClassUnicode`/`ClassAscii`, but produces a
//! [`RangeSet`] instead of a boxed closure — the determinizer needs
//! comparable, partitionable sets, which an opaque `Fn(char) -> bool`
//! cannot provide. This is a deliberate improvement over the closure-based
//! classes above, recorded in DESIGN.md.

use regex_syntax::ast::{
    Ast, ClassAscii, ClassAsciiKind, ClassBracketed, ClassPerl, ClassPerlKind, ClassSet,
    ClassSetBinaryOp, ClassSetBinaryOpKind, ClassSetItem, ClassSetRange, ClassSetUnion,
    ClassUnicode, ClassUnicodeKind, GroupKind, Literal, RepetitionKind, RepetitionRange,
};

use crate::error::{Error, Result};
use crate::ids::GroupId;
use crate::range_set::RangeSet;

/// Zero-width assertions recognized by the surface syntax but not
/// implemented by the determinizer (spec §9 Open Question, resolved in
/// DESIGN.md: rejected at compile time rather than silently dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    StartText,
    EndText,
    StartLine,
    EndLine,
    WordBoundary,
    NotWordBoundary,
}

impl std::fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BoundaryKind::StartText => "\\A",
            BoundaryKind::EndText => "\\z",
            BoundaryKind::StartLine => "^",
            BoundaryKind::EndLine => "$",
            BoundaryKind::WordBoundary => "\\b",
            BoundaryKind::NotWordBoundary => "\\B",
        };
        write!(f, "{s}")
    }
}

/// Bottom-up visitor over a regex AST (spec §4.4). Each method corresponds
/// to one primitive operation: epsilon, character class, concatenation,
/// alternation, the three unbounded quantifiers, capturing / non-capturing
/// groups, and zero-width boundaries. Bounded repetition
/// `{m,n}` has no primitive of its own — [`walk`] expresses it by replaying
/// the sub-pattern's visit and composing `concat`/`star`/`question`, the
/// same way the bounded-repetition arms above replayed a cloned `Nfa`.
pub trait Visitor {
    /// The value produced for one constructed sub-pattern (for the TNFA
    /// builder, a `(start, end)` state pair).
    type Out;

    fn epsilon(&mut self) -> Result<Self::Out>;
    fn class(&mut self, ranges: RangeSet) -> Result<Self::Out>;
    fn concat(&mut self, lhs: Self::Out, rhs: Self::Out) -> Result<Self::Out>;
    /// `lhs` is tried with higher priority than `rhs` (spec §4.5:
    /// `visitAlternation(lhs, rhs)` creates `MINUS -> rhs`, `PLUS -> lhs`).
    fn alternation(&mut self, lhs: Self::Out, rhs: Self::Out) -> Result<Self::Out>;
    fn star(&mut self, body: Self::Out, lazy: bool) -> Result<Self::Out>;
    fn plus(&mut self, body: Self::Out, lazy: bool) -> Result<Self::Out>;
    fn question(&mut self, body: Self::Out, lazy: bool) -> Result<Self::Out>;
    /// `group` is `None` for non-capturing `(?:...)`.
    fn group(&mut self, group: Option<GroupId>, body: Self::Out) -> Result<Self::Out>;
    fn boundary(&mut self, kind: BoundaryKind) -> Result<Self::Out>;
}

/// Drive `visitor` bottom-up over `ast`.
pub fn walk<V: Visitor>(ast: &Ast, visitor: &mut V) -> Result<V::Out> {
    match ast {
        Ast::Empty(_) => visitor.epsilon(),
        Ast::Flags(_) => Err(Error::unsupported("inline flag groups")),
        Ast::Literal(l) => visitor.class(RangeSet::single(l.c as u32)),
        Ast::Dot(_) => visitor.class(any_char_except_newline()),
        Ast::Assertion(a) => visitor.boundary(boundary_kind(&a.kind)?),
        Ast::ClassUnicode(c) => visitor.class(class_unicode(c)?),
        Ast::ClassPerl(c) => visitor.class(class_perl(c)?),
        Ast::ClassBracketed(c) => visitor.class(class_bracketed(c)?),
        Ast::Concat(c) => {
            let mut iter = c.asts.iter();
            let first = match iter.next() {
                Some(a) => walk(a, visitor)?,
                None => return visitor.epsilon(),
            };
            iter.try_fold(first, |acc, a| {
                let next = walk(a, visitor)?;
                visitor.concat(acc, next)
            })
        }
        Ast::Alternation(a) => {
            let mut asts = a.asts.iter().rev();
            let last = match asts.next() {
                Some(a) => walk(a, visitor)?,
                None => return visitor.epsilon(),
            };
            asts.try_fold(last, |acc, a| {
                let lhs = walk(a, visitor)?;
                visitor.alternation(lhs, acc)
            })
        }
        Ast::Repetition(r) => walk_repetition(r, visitor),
        Ast::Group(g) => walk_group(g, visitor),
    }
}

fn walk_repetition<V: Visitor>(
    r: &regex_syntax::ast::Repetition,
    visitor: &mut V,
) -> Result<V::Out> {
    let lazy = !r.greedy;
    match &r.op.kind {
        RepetitionKind::ZeroOrOne => {
            let body = walk(&r.ast, visitor)?;
            visitor.question(body, lazy)
        }
        RepetitionKind::ZeroOrMore => {
            let body = walk(&r.ast, visitor)?;
            visitor.star(body, lazy)
        }
        RepetitionKind::OneOrMore => {
            let body = walk(&r.ast, visitor)?;
            visitor.plus(body, lazy)
        }
        RepetitionKind::Range(range) => walk_bounded(&r.ast, range, lazy, visitor),
    }
}

fn walk_bounded<V: Visitor>(
    body_ast: &Ast,
    range: &RepetitionRange,
    lazy: bool,
    visitor: &mut V,
) -> Result<V::Out> {
    let (min, max) = match *range {
        RepetitionRange::Exactly(m) => (m, Some(m)),
        RepetitionRange::AtLeast(m) => (m, None),
        RepetitionRange::Bounded(m, n) => (m, Some(n)),
    };

    let mut acc: Option<V::Out> = None;
    for _ in 0..min {
        let copy = walk(body_ast, visitor)?;
        acc = Some(match acc {
            None => copy,
            Some(prev) => visitor.concat(prev, copy)?,
        });
    }

    match max {
        None => {
            // `{m,}`: the mandatory copies followed by a star of one more copy.
            let tail = walk(body_ast, visitor)?;
            let tail = visitor.star(tail, lazy)?;
            acc = Some(match acc {
                None => tail,
                Some(prev) => visitor.concat(prev, tail)?,
            });
        }
        Some(max) => {
            // `{m,n}`: `n - m` nested optional copies, innermost first, so
            // that declining an earlier optional copy also declines every
            // later one (the usual greedy bounded-repetition desugaring:
            // `a{2,4}` becomes `aa(a(a)?)?`).
            let extra = max.saturating_sub(min);
            let mut tail: Option<V::Out> = None;
            for _ in 0..extra {
                let copy = walk(body_ast, visitor)?;
                let combined = match tail {
                    None => copy,
                    Some(t) => visitor.concat(copy, t)?,
                };
                tail = Some(visitor.question(combined, lazy)?);
            }
            if let Some(tail) = tail {
                acc = Some(match acc {
                    None => tail,
                    Some(prev) => visitor.concat(prev, tail)?,
                });
            }
        }
    }

    match acc {
        Some(out) => Ok(out),
        None => visitor.epsilon(),
    }
}

fn walk_group<V: Visitor>(g: &regex_syntax::ast::Group, visitor: &mut V) -> Result<V::Out> {
    match &g.kind {
        GroupKind::CaptureIndex(_) | GroupKind::CaptureName { .. } => {
            let body = walk(&g.ast, visitor)?;
            visitor.group(group_id(g), body)
        }
        GroupKind::NonCapturing(flags) => {
            if !flags.items.is_empty() {
                return Err(Error::unsupported("inline flags on non-capturing groups"));
            }
            let body = walk(&g.ast, visitor)?;
            visitor.group(None, body)
        }
    }
}

/// The capture-group id a `(...)`/`(?<name>...)` group is assigned by the
/// parser, or `None` for `(?:...)`.
pub(crate) fn group_id(g: &regex_syntax::ast::Group) -> Option<GroupId> {
    match &g.kind {
        GroupKind::CaptureIndex(idx) => Some(GroupId::new(*idx as usize)),
        GroupKind::CaptureName { index, .. } => Some(GroupId::new(*index as usize)),
        GroupKind::NonCapturing(_) => None,
    }
}

fn boundary_kind(kind: &regex_syntax::ast::AssertionKind) -> Result<BoundaryKind> {
    use regex_syntax::ast::AssertionKind::*;
    match kind {
        StartLine => Ok(BoundaryKind::StartLine),
        EndLine => Ok(BoundaryKind::EndLine),
        StartText => Ok(BoundaryKind::StartText),
        EndText => Ok(BoundaryKind::EndText),
        WordBoundary => Ok(BoundaryKind::WordBoundary),
        WordBoundaryNegate => Ok(BoundaryKind::NotWordBoundary),
        #[allow(unreachable_patterns)]
        _ => Err(Error::unsupported("unrecognized zero-width assertion")),
    }
}

fn any_char_except_newline() -> RangeSet {
    RangeSet::from_range(0, 0x10FFFF).difference(&RangeSet::from_ranges([
        (b'\n' as u32, b'\n' as u32),
        (b'\r' as u32, b'\r' as u32),
    ]))
}

/// Compute the exact number of code units consumed by `ast` when it is
/// statically determinable (no unbounded or variable-width construct
/// anywhere inside it), used to register fixed inter-marker distances for
/// capture groups (spec §4.3/§4.5). This is an optimization, not a
/// correctness requirement: when it returns `None` the group's boundaries
/// are simply tracked at runtime instead.
pub(crate) fn fixed_width(ast: &Ast) -> Option<u32> {
    match ast {
        Ast::Empty(_) => Some(0),
        Ast::Literal(_)
        | Ast::Dot(_)
        | Ast::ClassUnicode(_)
        | Ast::ClassPerl(_)
        | Ast::ClassBracketed(_) => Some(1),
        Ast::Flags(_) | Ast::Assertion(_) => Some(0),
        Ast::Concat(c) => c
            .asts
            .iter()
            .try_fold(0u32, |acc, a| fixed_width(a).map(|w| acc + w)),
        Ast::Alternation(a) => {
            let mut widths = a.asts.iter().map(fixed_width);
            let first = widths.next()??;
            widths.try_fold(first, |acc, w| if w? == acc { Some(acc) } else { None })
        }
        Ast::Group(g) => fixed_width(&g.ast),
        Ast::Repetition(r) => {
            let body_width = fixed_width(&r.ast)?;
            match &r.op.kind {
                RepetitionKind::ZeroOrOne
                | RepetitionKind::ZeroOrMore
                | RepetitionKind::OneOrMore => None,
                RepetitionKind::Range(RepetitionRange::Exactly(c)) => Some(body_width * c),
                RepetitionKind::Range(RepetitionRange::Bounded(m, n)) if m == n => {
                    Some(body_width * m)
                }
                RepetitionKind::Range(_) => None,
            }
        }
    }
}

fn class_unicode(c: &ClassUnicode) -> Result<RangeSet> {
    let negated = c.is_negated();
    let set = match &c.kind {
        ClassUnicodeKind::OneLetter(ch) => match ch {
            'L' => letters(),
            'N' => digits(),
            'Z' => whitespace(),
            'P' => ascii_punct(),
            'C' => control(),
            _ => return Err(Error::unsupported(format!("unicode class \\p{{{ch}}}"))),
        },
        ClassUnicodeKind::Named(_) | ClassUnicodeKind::NamedValue { .. } => {
            return Err(Error::unsupported("named unicode property classes"));
        }
    };
    Ok(if negated {
        any_char().difference(&set)
    } else {
        set
    })
}

fn class_perl(c: &ClassPerl) -> Result<RangeSet> {
    let set = match c.kind {
        ClassPerlKind::Digit => digits(),
        ClassPerlKind::Space => whitespace(),
        ClassPerlKind::Word => word(),
    };
    Ok(if c.negated {
        any_char().difference(&set)
    } else {
        set
    })
}

fn class_bracketed(c: &ClassBracketed) -> Result<RangeSet> {
    let set = class_set(&c.kind)?;
    Ok(if c.negated {
        any_char().difference(&set)
    } else {
        set
    })
}

fn class_set(set: &ClassSet) -> Result<RangeSet> {
    match set {
        ClassSet::Item(item) => class_set_item(item),
        ClassSet::BinaryOp(op) => class_set_binary_op(op),
    }
}

fn class_set_binary_op(op: &ClassSetBinaryOp) -> Result<RangeSet> {
    let lhs = class_set(&op.lhs)?;
    let rhs = class_set(&op.rhs)?;
    Ok(match op.kind {
        ClassSetBinaryOpKind::Intersection => lhs.intersection(&rhs),
        ClassSetBinaryOpKind::Difference => lhs.difference(&rhs),
        ClassSetBinaryOpKind::SymmetricDifference => {
            lhs.difference(&rhs).union(&rhs.difference(&lhs))
        }
    })
}

fn class_set_item(item: &ClassSetItem) -> Result<RangeSet> {
    match item {
        ClassSetItem::Empty(_) => Ok(RangeSet::empty()),
        ClassSetItem::Literal(Literal { c, .. }) => Ok(RangeSet::single(*c as u32)),
        ClassSetItem::Range(ClassSetRange { start, end, .. }) => {
            Ok(RangeSet::from_range(start.c as u32, end.c as u32))
        }
        ClassSetItem::Ascii(a) => class_ascii(a),
        ClassSetItem::Unicode(c) => class_unicode(c),
        ClassSetItem::Perl(c) => class_perl(c),
        ClassSetItem::Bracketed(c) => class_bracketed(c),
        ClassSetItem::Union(u) => class_set_union(u),
    }
}

fn class_set_union(u: &ClassSetUnion) -> Result<RangeSet> {
    u.items.iter().try_fold(RangeSet::empty(), |acc, item| {
        Ok(acc.union(&class_set_item(item)?))
    })
}

fn class_ascii(a: &ClassAscii) -> Result<RangeSet> {
    let ClassAscii { kind, negated, .. } = a;
    let set = match kind {
        ClassAsciiKind::Alnum => ascii_alnum(),
        ClassAsciiKind::Alpha => ascii_alpha(),
        ClassAsciiKind::Ascii => RangeSet::from_range(0, 0x7F),
        ClassAsciiKind::Blank => {
            RangeSet::from_ranges([(b' ' as u32, b' ' as u32), (b'\t' as u32, b'\t' as u32)])
        }
        ClassAsciiKind::Cntrl => RangeSet::from_ranges([(0, 0x1F), (0x7F, 0x7F)]),
        ClassAsciiKind::Digit => RangeSet::from_range(b'0' as u32, b'9' as u32),
        ClassAsciiKind::Graph => RangeSet::from_range(0x21, 0x7E),
        ClassAsciiKind::Lower => RangeSet::from_range(b'a' as u32, b'z' as u32),
        ClassAsciiKind::Print => RangeSet::from_range(0x20, 0x7E),
        ClassAsciiKind::Punct => ascii_punct(),
        ClassAsciiKind::Space => RangeSet::from_ranges([
            (b' ' as u32, b' ' as u32),
            (b'\t' as u32, b'\t' as u32),
            (b'\n' as u32, b'\r' as u32),
        ]),
        ClassAsciiKind::Upper => RangeSet::from_range(b'A' as u32, b'Z' as u32),
        ClassAsciiKind::Word => word_ascii(),
        ClassAsciiKind::Xdigit => RangeSet::from_ranges([
            (b'0' as u32, b'9' as u32),
            (b'A' as u32, b'F' as u32),
            (b'a' as u32, b'f' as u32),
        ]),
    };
    Ok(if *negated {
        RangeSet::from_range(0, 0x7F).difference(&set)
    } else {
        set
    })
}

fn any_char() -> RangeSet {
    RangeSet::from_range(0, 0x10FFFF)
}

fn ascii_alpha() -> RangeSet {
    RangeSet::from_ranges([(b'A' as u32, b'Z' as u32), (b'a' as u32, b'z' as u32)])
}

fn ascii_alnum() -> RangeSet {
    ascii_alpha().union(&RangeSet::from_range(b'0' as u32, b'9' as u32))
}

fn ascii_punct() -> RangeSet {
    RangeSet::from_ranges([(0x21, 0x2F), (0x3A, 0x40), (0x5B, 0x60), (0x7B, 0x7E)])
}

fn word_ascii() -> RangeSet {
    ascii_alnum().union(&RangeSet::single(b'_' as u32))
}

/// Approximation of `\w`: ASCII-style word characters. Spec §1 Non-goals
/// exclude Unicode-property-class extensions beyond ASCII-style builtins.
fn word() -> RangeSet {
    word_ascii()
}

fn digits() -> RangeSet {
    RangeSet::from_range(b'0' as u32, b'9' as u32)
}

fn whitespace() -> RangeSet {
    RangeSet::from_ranges([(b'\t' as u32, b'\r' as u32), (b' ' as u32, b' ' as u32)])
}

fn letters() -> RangeSet {
    ascii_alpha()
}

fn control() -> RangeSet {
    RangeSet::from_ranges([(0, 0x1F), (0x7F, 0x7F)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex_syntax::ast::parse::Parser;

    fn parse(s: &str) -> Ast {
        Parser::new().parse(s).unwrap()
    }

    #[test]
    fn fixed_width_literal_concat() {
        let ast = parse("abc");
        assert_eq!(fixed_width(&ast), Some(3));
    }

    #[test]
    fn fixed_width_star_is_unknown() {
        let ast = parse("ab*c");
        assert_eq!(fixed_width(&ast), None);
    }

    #[test]
    fn fixed_width_exact_repetition() {
        let ast = parse("a{3}");
        assert_eq!(fixed_width(&ast), Some(3));
    }

    #[test]
    fn fixed_width_alternation_requires_equal_arms() {
        assert_eq!(fixed_width(&parse("ab|cd")), Some(2));
        assert_eq!(fixed_width(&parse("ab|cde")), None);
    }

    #[test]
    fn class_set_intersection_and_difference() {
        let ast = parse("[a-z&&[^aeiou]]");
        if let Ast::ClassBracketed(c) = ast {
            let set = class_bracketed(&c).unwrap();
            assert!(set.contains(b'b' as u32));
            assert!(!set.contains(b'a' as u32));
        } else {
            panic!("expected bracketed class");
        }
    }
}
