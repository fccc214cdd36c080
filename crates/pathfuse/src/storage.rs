//! The path-addressed storage capability the dispatcher delegates to.
//!
//! Implementations provide POSIX-style primitives over absolute paths and
//! report failures as [`io::Error`]s. They know nothing about inodes; the
//! dispatcher owns that mapping.

use crate::attr::{FileKind, StatFs};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Backend descriptor for an open file.
pub type Fd = u64;

/// Access mode for [`Storage::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

impl OpenMode {
    /// Whether writes through a descriptor opened in this mode are allowed.
    pub fn is_writable(self) -> bool {
        matches!(self, OpenMode::ReadWrite)
    }
}

/// Backend metadata for a path, without an inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub kind: FileKind,
    pub size: u64,
    pub blocks: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub blksize: u32,
}

/// Path-addressed storage primitives.
///
/// Calls may block. The dispatcher never holds its own locks while one is in
/// flight, and may call any method from several threads at once.
pub trait Storage: Send + Sync + 'static {
    /// Absolute path of the directory exposed as the filesystem root.
    fn root(&self) -> &Path;

    /// Metadata of `path`, without following a final symlink.
    fn stat(&self, path: &Path) -> io::Result<Stat>;

    /// Changes permission bits, without following a final symlink.
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Changes the length of `path`, which must not be a symlink.
    fn truncate(&self, path: &Path, size: u64) -> io::Result<()>;

    /// Changes the length of an open descriptor.
    fn ftruncate(&self, fd: Fd, size: u64) -> io::Result<()>;

    /// Updates whichever timestamps are given, without following a final
    /// symlink.
    fn set_times(
        &self,
        path: &Path,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> io::Result<()>;

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Creates a regular file and opens it read-write.
    fn create(&self, path: &Path, mode: u32) -> io::Result<Fd>;

    fn unlink(&self, path: &Path) -> io::Result<()>;

    fn rmdir(&self, path: &Path) -> io::Result<()>;

    /// Creates a hard link `dst` pointing at `src`.
    fn link(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Creates a symlink at `dst` whose content is `target`.
    fn symlink(&self, target: &Path, dst: &Path) -> io::Result<()>;

    fn readlink(&self, path: &Path) -> io::Result<PathBuf>;

    fn rename(&self, src: &Path, dst: &Path) -> io::Result<()>;

    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Fd>;

    /// Reads up to `size` bytes at `offset`. A shorter result means EOF.
    fn read(&self, fd: Fd, offset: u64, size: u32) -> io::Result<Vec<u8>>;

    /// Writes `data` at `offset`, returning the number of bytes written.
    fn write(&self, fd: Fd, offset: u64, data: &[u8]) -> io::Result<usize>;

    fn close(&self, fd: Fd) -> io::Result<()>;

    /// Names of the entries in a directory, excluding `.` and `..`.
    ///
    /// The order must be stable between calls so readdir offsets stay valid.
    fn readdir(&self, path: &Path) -> io::Result<Vec<OsString>>;

    /// Capacity statistics of the volume holding `path`.
    fn statfs(&self, _path: &Path) -> io::Result<StatFs> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}
