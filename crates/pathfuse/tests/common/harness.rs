//! Test harness driving a [`PathFs`] over a temporary directory.
//!
//! Requests are issued directly against the dispatcher; every call goes
//! through a channel-backed [`Reply`] and the harness asserts that exactly
//! one outcome comes back.

// Not all tests use all TestFs methods
#![allow(dead_code)]

use super::recording::RecordingStorage;
use pathfuse::{
    DirBuffer, Entry, LocalStorage, MountConfig, Opened, Outcome, PathFs, Reply,
    RequestContext, ROOT_INODE,
};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// How long to wait for an asynchronous reply.
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub type TestStorage = RecordingStorage<LocalStorage>;

/// Issues one request and returns its single outcome.
pub fn call(request: impl FnOnce(Reply)) -> Outcome {
    let (reply, rx) = Reply::channel("test");
    request(reply);
    let outcome = rx
        .recv_timeout(REPLY_TIMEOUT)
        .expect("request was never answered");
    assert!(rx.try_recv().is_err(), "request answered more than once");
    outcome
}

pub fn ctx() -> RequestContext {
    RequestContext {
        uid: 1000,
        gid: 1000,
        pid: 42,
        unique: 1,
    }
}

pub fn expect_entry(outcome: Outcome) -> Entry {
    match outcome {
        Outcome::Entry(entry) => entry,
        other => panic!("expected entry, got {other:?}"),
    }
}

pub fn expect_open(outcome: Outcome) -> Opened {
    match outcome {
        Outcome::Open(opened) => opened,
        other => panic!("expected open, got {other:?}"),
    }
}

pub fn expect_data(outcome: Outcome) -> Vec<u8> {
    match outcome {
        Outcome::Data(data) => data,
        other => panic!("expected data, got {other:?}"),
    }
}

pub fn expect_directory(outcome: Outcome) -> DirBuffer {
    match outcome {
        Outcome::Directory(buffer) => buffer,
        other => panic!("expected directory, got {other:?}"),
    }
}

pub fn expect_errno(outcome: Outcome, errno: i32) {
    assert_eq!(outcome.errno(), Some(errno), "unexpected outcome {outcome:?}");
}

/// A dispatcher over a fresh temporary directory.
pub struct TestFs {
    pub fs: PathFs<TestStorage>,
    _dir: TempDir,
}

impl TestFs {
    /// Synchronous reads, so tests are deterministic by default.
    pub fn new() -> Self {
        Self::with_config(MountConfig::default().async_reads(false))
    }

    pub fn with_config(config: MountConfig) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let storage = LocalStorage::new(dir.path()).expect("failed to open storage");
        let fs = PathFs::with_config(RecordingStorage::new(storage), config)
            .expect("failed to create filesystem");
        Self { fs, _dir: dir }
    }

    pub fn storage(&self) -> &TestStorage {
        self.fs.storage()
    }

    /// Canonical backend root.
    pub fn root(&self) -> PathBuf {
        self.fs.inodes().root().to_path_buf()
    }

    /// Creates a file in the backend, bypassing the dispatcher.
    pub fn seed_file(&self, rel: impl AsRef<Path>, content: &[u8]) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("seed parent");
        }
        fs::write(path, content).expect("seed file");
    }

    pub fn lookup(&self, parent: u64, name: &str) -> Outcome {
        call(|r| self.fs.lookup(&ctx(), parent, OsStr::new(name), r))
    }

    pub fn lookup_ino(&self, parent: u64, name: &str) -> u64 {
        expect_entry(self.lookup(parent, name)).ino()
    }

    pub fn getattr(&self, ino: u64) -> Outcome {
        call(|r| self.fs.getattr(&ctx(), ino, r))
    }

    pub fn mkdir(&self, parent: u64, name: &str) -> Entry {
        expect_entry(call(|r| {
            self.fs.mkdir(&ctx(), parent, OsStr::new(name), 0o755, r);
        }))
    }

    pub fn create(&self, parent: u64, name: &str) -> (Entry, Opened) {
        match call(|r| self.fs.create(&ctx(), parent, OsStr::new(name), 0o644, 0, r)) {
            Outcome::Create(entry, opened) => (entry, opened),
            other => panic!("expected create, got {other:?}"),
        }
    }

    pub fn open(&self, ino: u64) -> Outcome {
        call(|r| self.fs.open(&ctx(), ino, libc::O_RDWR, r))
    }

    pub fn read(&self, ino: u64, fh: u64, offset: i64, size: u32) -> Outcome {
        call(|r| self.fs.read(&ctx(), ino, fh, offset, size, r))
    }

    pub fn write(&self, ino: u64, fh: u64, offset: i64, data: &[u8]) -> Outcome {
        call(|r| self.fs.write(&ctx(), ino, fh, offset, data, r))
    }

    pub fn release(&self, ino: u64, fh: u64) -> Outcome {
        call(|r| self.fs.release(&ctx(), ino, fh, r))
    }

    pub fn unlink(&self, parent: u64, name: &str) -> Outcome {
        call(|r| self.fs.unlink(&ctx(), parent, OsStr::new(name), r))
    }

    pub fn rmdir(&self, parent: u64, name: &str) -> Outcome {
        call(|r| self.fs.rmdir(&ctx(), parent, OsStr::new(name), r))
    }

    pub fn rename(&self, parent: u64, name: &str, newparent: u64, newname: &str) -> Outcome {
        call(|r| {
            self.fs.rename(
                &ctx(),
                parent,
                OsStr::new(name),
                newparent,
                OsStr::new(newname),
                r,
            );
        })
    }

    pub fn readdir(&self, ino: u64, offset: i64, budget: usize) -> DirBuffer {
        expect_directory(call(|r| self.fs.readdir(&ctx(), ino, 0, offset, budget, r)))
    }

    /// Reads a whole directory in calls of at most `budget` bytes, returning
    /// the entry names and the number of calls it took.
    pub fn read_all_entries(&self, ino: u64, budget: usize) -> (Vec<String>, usize) {
        let mut names = Vec::new();
        let mut offset = 0;
        let mut calls = 0;
        loop {
            calls += 1;
            let buffer = self.readdir(ino, offset, budget);
            if buffer.is_empty() {
                return (names, calls);
            }
            for entry in buffer.entries() {
                names.push(entry.name.to_string_lossy().into_owned());
                offset = entry.offset;
            }
            assert!(calls < 10_000, "readdir never terminated");
        }
    }

    pub fn root_ino(&self) -> u64 {
        ROOT_INODE
    }
}

impl Default for TestFs {
    fn default() -> Self {
        Self::new()
    }
}
