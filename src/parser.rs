//! Thin bridge from pattern text to a `regex_syntax` AST (spec §6 "Syntax").
//!
//! Per spec §1 the surface-syntax parser is an external collaborator — only
//! the visitor contract in `src/ast.rs` is in scope for this core.
//! `regex_syntax` plays that collaborator's role, the same way it does for
//! `src/compiletime/parser.rs::parse_regex_syntax`: this module is that
//! function, carried over unchanged in shape (timed with
//! `std::time::Instant`, traced with `log::trace!`) and adapted to this
//! crate's own `Error` type.

use std::time::Instant;

use log::trace;
use regex_syntax::ast::{parse::Parser, Ast};

use crate::error::Result;

/// Parse `pattern` into a `regex_syntax` AST. Fails with
/// [`crate::error::ErrorKind::Syntax`] if the pattern is ill-formed.
pub fn parse(pattern: &str) -> Result<Ast> {
    let now = Instant::now();
    let ast = Parser::new().parse(pattern)?;
    trace!(
        "parsed pattern {pattern:?} in {} microseconds",
        now.elapsed().as_micros()
    );
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_pattern() {
        assert!(parse(r"a(b|c)*\d").is_ok());
    }

    #[test]
    fn rejects_invalid_pattern() {
        assert!(parse(r"a(").is_err());
    }

    #[test]
    fn empty_pattern_is_valid() {
        assert!(parse("").is_ok());
    }
}
