//! Template Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. See `ERRORS.md` for design rationale.
//!
//! TODO: Definitely going to refactor this later once I've written a few
//!       more crates. Designing errors in Rust is **hard** and I don't want
//!       to resort to anyhow+thiserror just because I don't want to deal with it.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A template error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for template operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Template text could not be compiled (unbalanced braces, empty token,
    /// bad padding spec).
    #[display("invalid template syntax: {_0}")]
    Syntax(#[error(not(source))] String),
    /// A field required to render a path was not supplied.
    #[display("missing template field `{_0}`")]
    MissingField(#[error(not(source))] String),
    /// A concrete path does not match the template's shape.
    #[display("path does not match template: {}", _0.display())]
    Unmatched(#[error(not(source))] PathBuf),
    /// Underlying I/O error while enumerating paths on disk.
    #[display("I/O error: {_0}")]
    Io(IoError),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
