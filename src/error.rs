//! Error types returned by magic lookups.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort a lookup.
///
/// A rule that simply does not apply is never an error; see
/// [`Outcome`](crate::Outcome).
#[derive(Debug, Error)]
pub enum MagicError {
    /// Seek or read failure on the target or on the magic file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A rule line was well formed but its numeric value was not.
    #[error("unrecognized numeric format: {0}")]
    NumberFormat(String),

    /// The file to open does not exist.
    #[error("file \"{}\" was not found", .0.display())]
    NotFound(PathBuf),

    /// The file exists but we are not allowed to read it.
    #[error("no read permission on \"{}\"", .0.display())]
    Unreadable(PathBuf),
}

impl MagicError {
    /// Attach a path to an error from opening that path.
    pub(crate) fn from_open(err: io::Error, path: PathBuf) -> MagicError {
        match err.kind() {
            io::ErrorKind::NotFound => MagicError::NotFound(path),
            io::ErrorKind::PermissionDenied => MagicError::Unreadable(path),
            _ => MagicError::Io(err),
        }
    }
}

/// Shorthand for results carrying a [`MagicError`].
pub type Result<T> = std::result::Result<T, MagicError>;
