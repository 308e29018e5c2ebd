//! Error types for the [`naming`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.
//! See `ERRORS.md` for design rationale.
//!
//! TODO: Definitely going to refactor this later once I've written a few
//!       more crates. Designing errors in Rust is **hard** and I don't want
//!       to resort to anyhow+thiserror just because I don't want to deal with it.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A naming error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for naming operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies why a capture request was refused.
///
/// ### Validation errors (bad user input, nothing mutated)
/// - [`ErrorKind::InvalidRange`]
/// - [`ErrorKind::InvalidResolution`]
/// - [`ErrorKind::InvalidName`]
///
/// ### Operational errors (fatal to this attempt)
/// - [`ErrorKind::PathResolution`]
/// - [`ErrorKind::Io`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Frame range endpoints don't resolve to positive integers in order.
    #[display("invalid range: {_0}")]
    InvalidRange(#[error(not(source))] String),
    /// Explicit resolution below the minimum the capture tool accepts.
    #[display("invalid resolution: {_0}")]
    InvalidResolution(#[error(not(source))] String),
    /// Flipbook name is empty or contains reserved characters.
    #[display("invalid name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// The template engine could not produce an output path from the given
    /// fields (e.g. no working-file context).
    PathResolution,
    /// Reserving the output directory failed.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The version ledger in the sidecar store could not be read.
    Store,
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

    /// Returns `true` for bad user input, recoverable by correcting the
    /// request; `false` for operational failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidRange(_) | Self::InvalidResolution(_) | Self::InvalidName(_))
    }
}
