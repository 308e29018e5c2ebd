//! Error types for the [`discovery`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.
//! See `ERRORS.md` for design rationale.
//!
//! TODO: Definitely going to refactor this later once I've written a few
//!       more crates. Designing errors in Rust is **hard** and I don't want
//!       to resort to anyhow+thiserror just because I don't want to deal with it.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A discovery error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a discovery failure.
///
/// Per-path field-extraction failures are *not* errors: they are logged and
/// the path skipped, per the scan contract. These variants cover failures
/// that abort the whole operation.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Template enumeration over the library root failed.
    Template,
    /// The metadata sidecar store could not be read or written.
    Store,
    /// Artifact file deletion failed.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// One or more artifacts in a batch removal could not be deleted.
    #[display("failed to remove {_0} artifact(s)")]
    Incomplete(#[error(not(source))] usize),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Incomplete(_))
    }
}
