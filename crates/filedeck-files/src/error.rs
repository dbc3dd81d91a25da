//! File service errors

use std::io;

/// Errors from the file service
///
/// The web layer maps `NotFound` to 404, `InvalidPath`/`InvalidName` to 400,
/// and `Io` to 500, each with the message as the `error` body field.
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    #[error("path does not exist: {0}")]
    NotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
