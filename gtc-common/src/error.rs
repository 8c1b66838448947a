//! Error type shared by the helper modules.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for helper operations that touch the filesystem.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors surfaced by `gtc-common`.
#[derive(Debug, Error)]
pub enum CommonError {
    /// Underlying filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A copy was requested from something that is not a file.
    #[error("source is not a file: {}", .0.display())]
    SourceNotFile(PathBuf),
}
