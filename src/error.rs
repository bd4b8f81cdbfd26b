//! Error types for ttymirror

use std::io;
use thiserror::Error;

/// Main error type for ttymirror
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Shared memory or message queue allocation failed. Fatal to session
    /// start; retrying later may succeed once the stale object is gone.
    #[error("Resource error: {0}")]
    Resource(String),

    /// The named segment or channel does not exist. Readers should wait
    /// and retry, or give up.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A message could not be delivered. Never fatal; callers log and drop.
    #[error("Delivery failure: {0}")]
    Delivery(String),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("PTY error: {0}")]
    Pty(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for ttymirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

impl From<String> for MirrorError {
    fn from(s: String) -> Self {
        MirrorError::Other(s)
    }
}

impl From<&str> for MirrorError {
    fn from(s: &str) -> Self {
        MirrorError::Other(s.to_string())
    }
}

impl From<nix::errno::Errno> for MirrorError {
    fn from(e: nix::errno::Errno) -> Self {
        MirrorError::Io(io::Error::from_raw_os_error(e as i32))
    }
}
