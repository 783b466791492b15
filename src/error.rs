//! Errors reported by the token engine

use thiserror::Error;

/// Every way an engine operation can fail.
///
/// Each kind maps to its own status code so a caller on the other side of a
/// narrow boundary can tell a corrupt encoding apart from a failed check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A byte encoding is malformed, has the wrong length or is not canonical
    #[error("malformed {0} encoding")]
    Format(&'static str),

    /// Well formed input that does not pass the cryptographic check
    #[error("{0} does not verify")]
    Verification(&'static str),

    /// The handle is unknown, or its builder was already finished or discarded
    #[error("invalid proof builder handle {0}")]
    InvalidHandle(u64),

    /// A proof was finished before all required fields were set
    #[error("proof builder is missing its {0}")]
    IncompleteState(&'static str),

    /// Resource exhaustion or an unrecoverable internal state
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Result type used throughout the crate
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// The status code reported across the boundary, success being `0`
    pub fn status_code(&self) -> i32 {
        match self {
            Error::Format(_) => 1,
            Error::Verification(_) => 2,
            Error::InvalidHandle(_) => 3,
            Error::IncompleteState(_) => 4,
            Error::Fatal(_) => 5,
        }
    }
}
