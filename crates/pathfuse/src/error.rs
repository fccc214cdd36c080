//! Error handling and errno mapping for the filesystem adapter.
//!
//! Every handler converts its failures into an [`FsError`] and answers the
//! request with [`FsError::to_errno`]. Nothing is allowed to escape a handler
//! any other way.

use std::io;
use thiserror::Error;

/// Failures a handler can run into while serving a request.
#[derive(Debug, Error)]
pub enum FsError {
    /// The inode is not bound in the inode table.
    #[error("No such inode: {0}")]
    NotFound(u64),

    /// A storage primitive failed.
    #[error("Storage operation failed: {0}")]
    Io(#[from] io::Error),

    /// A setattr change (mode, size, timestamps) was rejected by storage.
    #[error("Attribute change failed: {0}")]
    AttrChange(#[source] io::Error),

    /// Neither a read-write nor a read-only open succeeded.
    #[error("Open failed: {0}")]
    OpenFailed(#[source] io::Error),

    /// The file handle was never issued or has already been released.
    #[error("Invalid file handle: {0}")]
    InvalidHandle(u64),

    /// The handle was opened read-only and cannot be written.
    #[error("File handle {0} is not writable")]
    ReadOnlyHandle(u64),

    /// The name cannot be used as a single path component.
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// A negative or otherwise unusable offset.
    #[error("Invalid offset: {0}")]
    InvalidOffset(i64),
}

impl FsError {
    /// Converts this error to a libc error code.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::Io(e) => io_error_to_errno(e),
            FsError::AttrChange(_) | FsError::OpenFailed(_) | FsError::InvalidHandle(_) => {
                libc::EIO
            }
            FsError::ReadOnlyHandle(_) => libc::EBADF,
            FsError::InvalidName(_) | FsError::InvalidOffset(_) => libc::EINVAL,
        }
    }
}

/// Maps an I/O error to the nearest errno.
///
/// Raw OS codes pass through unchanged. Errors without one are classified by
/// kind: not-found becomes `ENOENT`, everything else `EIO`.
pub fn io_error_to_errno(e: &io::Error) -> i32 {
    if let Some(code) = e.raw_os_error() {
        return code;
    }
    match e.kind() {
        io::ErrorKind::NotFound => libc::ENOENT,
        _ => libc::EIO,
    }
}

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for io::Error {
    fn to_errno(&self) -> i32 {
        io_error_to_errno(self)
    }
}

impl ToErrno for FsError {
    fn to_errno(&self) -> i32 {
        FsError::to_errno(self)
    }
}
