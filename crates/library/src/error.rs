//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. See `ERRORS.md` for design rationale.
//!
//! TODO: Definitely going to refactor this later once I've written a few
//!       more crates. Designing errors in Rust is **hard** and I don't want
//!       to resort to anyhow+thiserror just because I don't want to deal with it.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which stage of a session operation failed. The stage-specific cause hangs
/// off the error tree underneath.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not discover flipbooks on disk")]
    Discovery,
    #[display("capture request refused")]
    Naming,
    #[display("could not dispatch to an external tool")]
    Dispatch,
    #[display("could not update the metadata sidecar")]
    Store,
    #[display("could not remove the selected flipbooks")]
    Removal,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store | Self::Removal => true,
            Self::Discovery | Self::Naming | Self::Dispatch => false,
        }
    }
}
