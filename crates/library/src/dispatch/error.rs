//! Error types for the [`dispatch`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.
//! See `ERRORS.md` for design rationale.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A dispatch error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies a collaborator dispatch failure.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No known tool location for this platform. A configuration problem:
    /// report once, abort the operation, don't crash.
    #[display("platform `{_0}` is not supported")]
    UnsupportedPlatform(#[error(not(source))] String),
    /// The detached process could not be started.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The publish registry refused the record.
    #[display("publish rejected: {_0}")]
    Rejected(#[error(not(source))] String),
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
