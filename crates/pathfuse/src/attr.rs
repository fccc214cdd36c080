//! Attribute and statistics records returned to the kernel.

use crate::storage::Stat;
use std::time::SystemTime;

/// Block size for the fallback filesystem statistics.
pub const BLOCK_SIZE: u32 = 4096;

/// Maximum filename length reported by the fallback statistics.
pub const DEFAULT_NAME_MAX: u32 = 255;

/// Kind of filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Directory,
    RegularFile,
    Symlink,
    NamedPipe,
    CharDevice,
    BlockDevice,
    Socket,
}

/// Attributes of a filesystem object, addressed by its table inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    /// Inode from the inode table, never the backend's native inode.
    pub ino: u64,
    pub size: u64,
    pub blocks: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub kind: FileKind,
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub blksize: u32,
}

impl FileAttr {
    /// Builds the attributes of `ino` from a backend stat record.
    pub fn from_stat(ino: u64, stat: &Stat) -> Self {
        Self {
            ino,
            size: stat.size,
            blocks: stat.blocks,
            atime: stat.atime,
            mtime: stat.mtime,
            ctime: stat.ctime,
            kind: stat.kind,
            perm: stat.perm,
            nlink: stat.nlink,
            uid: stat.uid,
            gid: stat.gid,
            rdev: stat.rdev,
            blksize: stat.blksize,
        }
    }

    /// Reports every object as owned by `uid`/`gid`.
    #[must_use]
    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }
}

/// Filesystem statistics, as returned by statfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    /// Total blocks.
    pub blocks: u64,
    /// Free blocks.
    pub bfree: u64,
    /// Available blocks (non-root).
    pub bavail: u64,
    /// Total inodes.
    pub files: u64,
    /// Free inodes.
    pub ffree: u64,
    pub bsize: u32,
    pub namelen: u32,
    pub frsize: u32,
}

impl StatFs {
    /// Conservative constant model used when storage cannot report quotas.
    pub const fn fallback() -> Self {
        Self {
            blocks: 1_000_000,
            bfree: 500_000,
            bavail: 500_000,
            files: 1_000_000,
            ffree: 500_000,
            bsize: BLOCK_SIZE,
            namelen: DEFAULT_NAME_MAX,
            frsize: BLOCK_SIZE,
        }
    }
}

impl Default for StatFs {
    fn default() -> Self {
        Self::fallback()
    }
}
