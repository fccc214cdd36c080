//! Storage wrapper that records every primitive call and can inject
//! failures.

// Not all tests use every knob
#![allow(dead_code)]

use parking_lot::Mutex;
use pathfuse::{Fd, OpenMode, Stat, StatFs, Storage};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

/// Wraps a [`Storage`] and logs the name of each primitive it serves.
pub struct RecordingStorage<S> {
    inner: S,
    calls: Mutex<Vec<&'static str>>,
    pub fail_rw_open: AtomicBool,
    pub fail_ro_open: AtomicBool,
    pub fail_chmod: AtomicBool,
    pub fail_statfs: AtomicBool,
    pub fail_stat: AtomicBool,
}

fn denied() -> io::Error {
    io::Error::from_raw_os_error(libc::EACCES)
}

impl<S: Storage> RecordingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            fail_rw_open: AtomicBool::new(false),
            fail_ro_open: AtomicBool::new(false),
            fail_chmod: AtomicBool::new(false),
            fail_statfs: AtomicBool::new(false),
            fail_stat: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn record(&self, op: &'static str) {
        self.calls.lock().push(op);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == op).count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

impl<S: Storage> Storage for RecordingStorage<S> {
    fn root(&self) -> &Path {
        self.inner.root()
    }

    fn stat(&self, path: &Path) -> io::Result<Stat> {
        self.record("stat");
        if self.fail_stat.load(Ordering::SeqCst) {
            return Err(denied());
        }
        self.inner.stat(path)
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.record("chmod");
        if self.fail_chmod.load(Ordering::SeqCst) {
            return Err(denied());
        }
        self.inner.chmod(path, mode)
    }

    fn truncate(&self, path: &Path, size: u64) -> io::Result<()> {
        self.record("truncate");
        self.inner.truncate(path, size)
    }

    fn ftruncate(&self, fd: Fd, size: u64) -> io::Result<()> {
        self.record("ftruncate");
        self.inner.ftruncate(fd, size)
    }

    fn set_times(
        &self,
        path: &Path,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> io::Result<()> {
        self.record("set_times");
        self.inner.set_times(path, atime, mtime)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.record("mkdir");
        self.inner.mkdir(path, mode)
    }

    fn create(&self, path: &Path, mode: u32) -> io::Result<Fd> {
        self.record("create");
        self.inner.create(path, mode)
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        self.record("unlink");
        self.inner.unlink(path)
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        self.record("rmdir");
        self.inner.rmdir(path)
    }

    fn link(&self, src: &Path, dst: &Path) -> io::Result<()> {
        self.record("link");
        self.inner.link(src, dst)
    }

    fn symlink(&self, target: &Path, dst: &Path) -> io::Result<()> {
        self.record("symlink");
        self.inner.symlink(target, dst)
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        self.record("readlink");
        self.inner.readlink(path)
    }

    fn rename(&self, src: &Path, dst: &Path) -> io::Result<()> {
        self.record("rename");
        self.inner.rename(src, dst)
    }

    fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Fd> {
        self.record("open");
        let fail = match mode {
            OpenMode::ReadWrite => &self.fail_rw_open,
            OpenMode::ReadOnly => &self.fail_ro_open,
        };
        if fail.load(Ordering::SeqCst) {
            return Err(denied());
        }
        self.inner.open(path, mode)
    }

    fn read(&self, fd: Fd, offset: u64, size: u32) -> io::Result<Vec<u8>> {
        self.record("read");
        self.inner.read(fd, offset, size)
    }

    fn write(&self, fd: Fd, offset: u64, data: &[u8]) -> io::Result<usize> {
        self.record("write");
        self.inner.write(fd, offset, data)
    }

    fn close(&self, fd: Fd) -> io::Result<()> {
        self.record("close");
        self.inner.close(fd)
    }

    fn readdir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        self.record("readdir");
        self.inner.readdir(path)
    }

    fn statfs(&self, path: &Path) -> io::Result<StatFs> {
        self.record("statfs");
        if self.fail_statfs.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::Unsupported));
        }
        self.inner.statfs(path)
    }
}
