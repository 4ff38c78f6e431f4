//! The error taxonomy surfaced by every engine operation.

use std::io;

use thiserror::Error;

/// Result alias used across the engine
pub type FsResult<T> = Result<T, FsError>;

/// Everything that can go wrong inside the filesystem engine.
///
/// Operations surface exactly one of these to the caller and are never
/// retried internally; only the recursive `rm` recovers child failures, and
/// only when `force` is set.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path does not resolve to an existing entry
    #[error("no such file or directory")]
    NotFound,
    /// Target name already present in the parent directory
    #[error("file or directory already exists")]
    AlreadyExists,
    /// A directory was required but the inode is a regular file
    #[error("not a directory")]
    NotDirectory,
    /// A regular file was required but the inode is a directory
    #[error("is a directory")]
    IsDirectory,
    /// Directory still holds entries other than `.` and `..`
    #[error("directory not empty")]
    NotEmpty,
    /// Inode table or data area exhausted
    #[error("no space left on device")]
    NoSpace,
    /// Every direct pointer of the directory is in use and full
    #[error("directory is full")]
    DirFull,
    /// Empty path, empty component, oversized or malformed name
    #[error("invalid path")]
    InvalidPath,
    /// Descriptor is out of range or not open
    #[error("bad file descriptor")]
    BadFd,
    /// Flag word is malformed or forbids the attempted access
    #[error("bad open flags")]
    BadFlags,
    /// The backing file failed underneath the engine
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
