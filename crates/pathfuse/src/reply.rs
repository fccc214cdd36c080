//! The per-request reply contract.
//!
//! Every handler receives a [`Reply`] and must answer through exactly one of
//! its terminal methods. Each terminal method consumes the token, so
//! answering twice does not compile. A token dropped without an answer
//! delivers `EIO` so the caller is never left waiting.
//!
//! The answer reaches the channel as an [`Outcome`], a sum type over the
//! terminal variants.

use crate::attr::{FileAttr, FileKind, StatFs};
use crate::error::FsError;
use crossbeam_channel::Receiver;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Size of a directory record header in the kernel's readdir buffer.
const DIRENT_HEADER_SIZE: usize = 24;

/// Operations that are deliberately not implemented.
///
/// Kept distinct from ordinary errors so callers can tell "not implemented"
/// apart from "implemented, and it failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    Mknod,
    SetXattr,
    GetXattr,
    ListXattr,
    RemoveXattr,
    GetLock,
    SetLock,
}

impl Unsupported {
    /// The errno the kernel receives for this operation.
    ///
    /// mknod answers `ENOENT`; xattrs answer `ENOTSUP`; locks answer `ENOSYS`
    /// so the kernel falls back to local lock arbitration.
    pub fn errno(self) -> i32 {
        match self {
            Unsupported::Mknod => libc::ENOENT,
            Unsupported::SetXattr
            | Unsupported::GetXattr
            | Unsupported::ListXattr
            | Unsupported::RemoveXattr => libc::ENOTSUP,
            Unsupported::GetLock | Unsupported::SetLock => libc::ENOSYS,
        }
    }
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Unsupported::Mknod => "mknod",
            Unsupported::SetXattr => "setxattr",
            Unsupported::GetXattr => "getxattr",
            Unsupported::ListXattr => "listxattr",
            Unsupported::RemoveXattr => "removexattr",
            Unsupported::GetLock => "getlk",
            Unsupported::SetLock => "setlk",
        };
        f.write_str(name)
    }
}

/// An entry reply: an inode with its attributes and cache hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub attr: FileAttr,
    pub generation: u64,
    pub attr_ttl: Duration,
    pub entry_ttl: Duration,
}

impl Entry {
    pub fn ino(&self) -> u64 {
        self.attr.ino
    }
}

/// An open reply: the handle to thread through later calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opened {
    pub fh: u64,
    pub flags: u32,
}

/// One record of a readdir reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u64,
    /// Offset to resume from to get the entry after this one.
    pub offset: i64,
    pub kind: FileKind,
    pub name: OsString,
}

/// A readdir reply buffer bounded by the caller's byte budget.
///
/// Records are sized the way the kernel lays them out: a 24 byte header plus
/// the name, padded to 8 bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirBuffer {
    budget: usize,
    used: usize,
    entries: Vec<DirEntry>,
}

impl DirBuffer {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            used: 0,
            entries: Vec::new(),
        }
    }

    /// Adds an entry. Returns `true` if the buffer is full and the entry was
    /// not added.
    pub fn add(&mut self, entry: DirEntry) -> bool {
        let size = record_size(&entry.name);
        if self.used + size > self.budget {
            return true;
        }
        self.used += size;
        self.entries.push(entry);
        false
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<DirEntry> {
        self.entries
    }

    /// An empty buffer signals the end of the directory stream.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn record_size(name: &OsString) -> usize {
    (DIRENT_HEADER_SIZE + name.len()).next_multiple_of(8)
}

/// The answer to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Success without payload (errno 0).
    Ok,
    Error(i32),
    Entry(Entry),
    Attr { attr: FileAttr, ttl: Duration },
    Open(Opened),
    Create(Entry, Opened),
    Data(Vec<u8>),
    Directory(DirBuffer),
    Written(u32),
    Readlink(PathBuf),
    Statfs(StatFs),
    Xattr(u32),
    Bmap(u64),
    Unsupported(Unsupported),
}

impl Outcome {
    /// The errno this outcome carries, if it is a failure.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Outcome::Error(errno) => Some(*errno),
            Outcome::Unsupported(op) => Some(op.errno()),
            _ => None,
        }
    }

    /// The errno to send when the channel expected a different payload.
    pub fn into_errno(self) -> i32 {
        self.errno().unwrap_or(libc::EIO)
    }
}

type Sink = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Single-use completion token for one request.
#[must_use = "every request must be answered exactly once"]
pub struct Reply {
    op: &'static str,
    sink: Option<Sink>,
}

impl Reply {
    /// Creates a token that hands its outcome to `sink`.
    pub fn new<F>(op: &'static str, sink: F) -> Self
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        Self {
            op,
            sink: Some(Box::new(sink)),
        }
    }

    /// Creates a token whose outcome arrives on the returned channel.
    pub fn channel(op: &'static str) -> (Self, Receiver<Outcome>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let reply = Self::new(op, move |outcome| {
            // The receiver may be gone; the request is answered either way.
            let _ = tx.send(outcome);
        });
        (reply, rx)
    }

    /// Name of the operation this token answers.
    pub fn op(&self) -> &'static str {
        self.op
    }

    fn send(mut self, outcome: Outcome) {
        if let Some(sink) = self.sink.take() {
            sink(outcome);
        }
    }

    /// Answers with an errno.
    pub fn error(self, errno: i32) {
        self.send(Outcome::Error(errno));
    }

    /// Answers with the errno of `err`.
    pub fn fail(self, err: &FsError) {
        debug!(op = self.op, error = %err, "request failed");
        let errno = err.to_errno();
        self.error(errno);
    }

    /// Acknowledges success (errno 0).
    pub fn ok(self) {
        self.send(Outcome::Ok);
    }

    pub fn entry(self, entry: Entry) {
        self.send(Outcome::Entry(entry));
    }

    pub fn attr(self, attr: FileAttr, ttl: Duration) {
        self.send(Outcome::Attr { attr, ttl });
    }

    pub fn open(self, opened: Opened) {
        self.send(Outcome::Open(opened));
    }

    pub fn create(self, entry: Entry, opened: Opened) {
        self.send(Outcome::Create(entry, opened));
    }

    /// Answers a read with raw bytes.
    pub fn buffer(self, data: Vec<u8>) {
        self.send(Outcome::Data(data));
    }

    /// Answers a readdir; an empty buffer ends the stream.
    pub fn directory(self, buffer: DirBuffer) {
        self.send(Outcome::Directory(buffer));
    }

    pub fn written(self, count: u32) {
        self.send(Outcome::Written(count));
    }

    pub fn readlink(self, target: PathBuf) {
        self.send(Outcome::Readlink(target));
    }

    pub fn statfs(self, stats: StatFs) {
        self.send(Outcome::Statfs(stats));
    }

    pub fn xattr(self, size: u32) {
        self.send(Outcome::Xattr(size));
    }

    pub fn bmap(self, block: u64) {
        self.send(Outcome::Bmap(block));
    }

    /// Answers that the operation is deliberately not implemented.
    pub fn unsupported(self, op: Unsupported) {
        self.send(Outcome::Unsupported(op));
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("op", &self.op)
            .field("answered", &self.sink.is_none())
            .finish()
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            warn!(op = self.op, "request dropped without a reply, answering EIO");
            sink(Outcome::Error(libc::EIO));
        }
    }
}
