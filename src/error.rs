//! Error taxonomy (spec §7).
//!
//! A thin outer struct wrapping a boxed enum, so that `Result<T, Error>`
//! stays a small, `Copy`-free but cheaply-movable type regardless of how
//! large an individual variant's payload grows.

use thiserror::Error;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error produced by the compiler or the simulator.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error {
    kind: Box<ErrorKind>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
        }
    }

    /// The specific kind of error that occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

/// The error kinds (spec §7's taxonomy).
#[derive(Error, Debug)]
pub enum ErrorKind {
    /// The pattern failed to parse.
    #[error("pattern syntax error: {0}")]
    Syntax(#[from] regex_syntax::ast::Error),

    /// A recognized but intentionally unimplemented construct (spec §1
    /// Non-goals, or an Open Question resolved as "reject").
    #[error("unsupported regex feature: {0}")]
    UnsupportedFeature(String),

    /// Recording a fixed distance between two group markers contradicted an
    /// already-established distance (spec §4.3).
    #[error("group marker classes {0} and {1} already have a conflicting fixed distance")]
    GroupClassConflict(String, String),

    /// An internal invariant was violated: wrong-sized output array, an
    /// "unavoidable" fixed-distance class resolving to -1, an isomorphism
    /// merge producing an inconsistent register map, and so on. These
    /// indicate a bug in the compiler or simulator, never a malformed
    /// pattern or input.
    #[error("illegal internal state: {0}")]
    IllegalState(String),
}

impl From<regex_syntax::ast::Error> for Error {
    fn from(e: regex_syntax::ast::Error) -> Self {
        Error::new(ErrorKind::Syntax(e))
    }
}

impl Error {
    pub(crate) fn unsupported(feature: impl Into<String>) -> Self {
        Error::new(ErrorKind::UnsupportedFeature(feature.into()))
    }

    pub(crate) fn group_conflict(a: impl Into<String>, b: impl Into<String>) -> Self {
        Error::new(ErrorKind::GroupClassConflict(a.into(), b.into()))
    }

    pub(crate) fn illegal_state(msg: impl Into<String>) -> Self {
        Error::new(ErrorKind::IllegalState(msg.into()))
    }
}
