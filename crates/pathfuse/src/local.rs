//! Host directory passthrough storage.
//!
//! [`LocalStorage`] serves a directory of the host filesystem through the
//! [`Storage`] capability. Open files live in a descriptor table keyed by
//! the [`Fd`] handed back to the dispatcher; reads and writes are positional
//! so concurrent requests on one descriptor never race on a shared cursor.

use crate::attr::{FileKind, StatFs};
use crate::handles::HandleTable;
use crate::storage::{Fd, OpenMode, Stat, Storage};
use filetime::FileTime;
use std::ffi::OsString;
use std::fs::{self, DirBuilder, File, Metadata, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, FileExt, FileTypeExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::trace;

/// Storage backed by a directory on the host.
#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
    files: HandleTable<Arc<File>>,
}

impl LocalStorage {
    /// Serves `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = fs::canonicalize(root.as_ref())?;
        if !fs::metadata(&root)?.is_dir() {
            return Err(io::Error::from_raw_os_error(libc::ENOTDIR));
        }
        Ok(Self {
            root,
            files: HandleTable::new(),
        })
    }

    /// Number of descriptors currently open.
    pub fn open_files(&self) -> usize {
        self.files.len()
    }

    fn file(&self, fd: Fd) -> io::Result<Arc<File>> {
        self.files
            .get(fd)
            .map(|file| Arc::clone(&file))
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }

    fn register(&self, file: File) -> Fd {
        self.files.insert(Arc::new(file))
    }
}

fn kind_of(meta: &Metadata) -> FileKind {
    let ft = meta.file_type();
    if ft.is_dir() {
        FileKind::Directory
    } else if ft.is_symlink() {
        FileKind::Symlink
    } else if ft.is_fifo() {
        FileKind::NamedPipe
    } else if ft.is_char_device() {
        FileKind::CharDevice
    } else if ft.is_block_device() {
        FileKind::BlockDevice
    } else if ft.is_socket() {
        FileKind::Socket
    } else {
        FileKind::RegularFile
    }
}

/// Converts a `(seconds, nanoseconds)` timestamp relative to the epoch.
fn unix_time(secs: i64, nsecs: i64) -> SystemTime {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let nanos = nsecs.clamp(0, 999_999_999) as u32;
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs.unsigned_abs(), nanos)
    } else {
        UNIX_EPOCH - Duration::new(secs.unsigned_abs(), 0) + Duration::from_nanos(u64::from(nanos))
    }
}

fn stat_of(meta: &Metadata) -> Stat {
    // Mode bits, device numbers and block sizes fit the reply's field widths.
    #[allow(clippy::cast_possible_truncation)]
    let stat = Stat {
        kind: kind_of(meta),
        size: meta.size(),
        blocks: meta.blocks(),
        atime: unix_time(meta.atime(), meta.atime_nsec()),
        mtime: unix_time(meta.mtime(), meta.mtime_nsec()),
        ctime: unix_time(meta.ctime(), meta.ctime_nsec()),
        perm: (meta.mode() & 0o7777) as u16,
        nlink: meta.nlink() as u32,
        uid: meta.uid(),
        gid: meta.gid(),
        rdev: meta.rdev() as u32,
        blksize: meta.blksize() as u32,
    };
    stat
}

impl Storage for LocalStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn stat(&self, path: &Path) -> io::Result<Stat> {
        fs::symlink_metadata(path).map(|meta| stat_of(&meta))
    }

    /// Symlinks carry no mode of their own, so they answer `EOPNOTSUPP`
    /// like `lchmod` rather than changing the target.
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        if fs::symlink_metadata(path)?.file_type().is_symlink() {
            return Err(io::Error::from_raw_os_error(libc::EOPNOTSUPP));
        }
        fs::set_permissions(path, Permissions::from_mode(mode & 0o7777))
    }

    fn truncate(&self, path: &Path, size: u64) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NOFOLLOW)
            .open(path)?
            .set_len(size)
    }

    fn ftruncate(&self, fd: Fd, size: u64) -> io::Result<()> {
        self.file(fd)?.set_len(size)
    }

    fn set_times(
        &self,
        path: &Path,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> io::Result<()> {
        // Both stamps are written at once; an absent one keeps its value.
        let meta = fs::symlink_metadata(path)?;
        let atime = atime.map_or_else(
            || FileTime::from_last_access_time(&meta),
            FileTime::from_system_time,
        );
        let mtime = mtime.map_or_else(
            || FileTime::from_last_modification_time(&meta),
            FileTime::from_system_time,
        );
        filetime::set_symlink_file_times(path, atime, mtime)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        DirBuilder::new().mode(mode).create(path)
    }

    fn create(&self, path: &Path, mode: u32) -> io::Result<Fd> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(mode)
            .open(path)?;
        let fd = self.register(file);
        trace!(path = %path.display(), fd, "created");
        Ok(fd)
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn link(&self, src: &Path, dst: &Path) -> io::Result<()> {
        fs::hard_link(src, dst)
    }

    fn symlink(&self, target: &Path, dst: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(target, dst)
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn rename(&self, src: &Path, dst: &Path) -> io::Result<()> {
        fs::rename(src, dst)
    }

    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Fd> {
        let file = OpenOptions::new()
            .read(true)
            .write(mode.is_writable())
            .open(path)?;
        let fd = self.register(file);
        trace!(path = %path.display(), fd, ?mode, "opened");
        Ok(fd)
    }

    fn read(&self, fd: Fd, offset: u64, size: u32) -> io::Result<Vec<u8>> {
        let file = self.file(fd)?;
        let mut buf = vec![0u8; size as usize];
        let mut filled = 0;
        while filled < buf.len() {
            match file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn write(&self, fd: Fd, offset: u64, data: &[u8]) -> io::Result<usize> {
        let file = self.file(fd)?;
        file.write_all_at(data, offset)?;
        Ok(data.len())
    }

    fn close(&self, fd: Fd) -> io::Result<()> {
        self.files
            .remove(fd)
            .map(drop)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }

    fn readdir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let mut names = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<io::Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }

    fn statfs(&self, path: &Path) -> io::Result<StatFs> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(io::Error::from)?;

        // Block sizes and name limits are small values that fit in u32.
        #[allow(clippy::cast_possible_truncation)]
        let fragment_size = stat.fragment_size() as u32;
        #[allow(clippy::cast_possible_truncation)]
        let name_max = stat.name_max() as u32;

        Ok(StatFs {
            blocks: u64::from(stat.blocks()),
            bfree: u64::from(stat.blocks_free()),
            bavail: u64::from(stat.blocks_available()),
            files: u64::from(stat.files()),
            ffree: u64::from(stat.files_free()),
            bsize: fragment_size,
            namelen: name_max,
            frsize: fragment_size,
        })
    }
}
