//! fuser session adapter.
//!
//! [`FuseAdapter`] implements [`fuser::Filesystem`] by forwarding every
//! callback to [`PathFs`]. Each fuser reply object is wrapped in a
//! [`Reply`] whose sink translates the [`Outcome`] into the matching fuser
//! call. An outcome that does not fit the reply type answers its errno, or
//! `EIO` if it carries none.

use crate::attr::{FileAttr, FileKind};
use crate::filesystem::{LockRequest, PathFs, RequestContext, SetAttr};
use crate::reply::{Outcome, Reply};
use crate::storage::Storage;
use fuser::{
    FileType, Filesystem, KernelConfig, ReplyAttr, ReplyBmap, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyLock, ReplyOpen, ReplyStatfs, ReplyWrite,
    ReplyXattr, Request, TimeOrNow,
};
use libc::c_int;
use std::ffi::OsStr;
use std::path::Path;
use std::time::SystemTime;
use tracing::warn;

/// Byte budget for one readdir reply, matching the kernel's page-sized
/// request buffer.
pub const READDIR_BUDGET: usize = 4096;

/// Mounts a [`PathFs`] through fuser.
pub struct FuseAdapter<S: Storage> {
    fs: PathFs<S>,
}

impl<S: Storage> FuseAdapter<S> {
    pub fn new(fs: PathFs<S>) -> Self {
        Self { fs }
    }

    pub fn inner(&self) -> &PathFs<S> {
        &self.fs
    }
}

fn context(req: &Request<'_>) -> RequestContext {
    RequestContext {
        uid: req.uid(),
        gid: req.gid(),
        pid: req.pid(),
        unique: req.unique(),
    }
}

fn file_type(kind: FileKind) -> FileType {
    match kind {
        FileKind::Directory => FileType::Directory,
        FileKind::RegularFile => FileType::RegularFile,
        FileKind::Symlink => FileType::Symlink,
        FileKind::NamedPipe => FileType::NamedPipe,
        FileKind::CharDevice => FileType::CharDevice,
        FileKind::BlockDevice => FileType::BlockDevice,
        FileKind::Socket => FileType::Socket,
    }
}

fn fuser_attr(attr: &FileAttr) -> fuser::FileAttr {
    fuser::FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.ctime,
        kind: file_type(attr.kind),
        perm: attr.perm,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: attr.rdev,
        blksize: attr.blksize,
        flags: 0,
    }
}

fn system_time(time: TimeOrNow) -> SystemTime {
    match time {
        TimeOrNow::Now => SystemTime::now(),
        TimeOrNow::SpecificTime(t) => t,
    }
}

// ===== reply bridges =====

fn empty_reply(op: &'static str, reply: ReplyEmpty) -> Reply {
    Reply::new(op, move |outcome| match outcome {
        Outcome::Ok => reply.ok(),
        other => reply.error(other.into_errno()),
    })
}

fn entry_reply(op: &'static str, reply: ReplyEntry) -> Reply {
    Reply::new(op, move |outcome| match outcome {
        Outcome::Entry(entry) => {
            reply.entry(&entry.entry_ttl, &fuser_attr(&entry.attr), entry.generation);
        }
        other => reply.error(other.into_errno()),
    })
}

fn attr_reply(op: &'static str, reply: ReplyAttr) -> Reply {
    Reply::new(op, move |outcome| match outcome {
        Outcome::Attr { attr, ttl } => reply.attr(&ttl, &fuser_attr(&attr)),
        other => reply.error(other.into_errno()),
    })
}

fn open_reply(op: &'static str, reply: ReplyOpen) -> Reply {
    Reply::new(op, move |outcome| match outcome {
        Outcome::Open(opened) => reply.opened(opened.fh, opened.flags),
        other => reply.error(other.into_errno()),
    })
}

fn data_reply(op: &'static str, reply: ReplyData) -> Reply {
    Reply::new(op, move |outcome| match outcome {
        Outcome::Data(data) => reply.data(&data),
        Outcome::Readlink(target) => reply.data(target.as_os_str().as_encoded_bytes()),
        other => reply.error(other.into_errno()),
    })
}

fn xattr_reply(op: &'static str, reply: ReplyXattr) -> Reply {
    Reply::new(op, move |outcome| match outcome {
        Outcome::Xattr(size) => reply.size(size),
        Outcome::Data(data) => reply.data(&data),
        other => reply.error(other.into_errno()),
    })
}

impl<S: Storage> Filesystem for FuseAdapter<S> {
    fn init(&mut self, req: &Request<'_>, config: &mut KernelConfig) -> Result<(), c_int> {
        // Reads may complete on a worker thread, out of order.
        config.add_capabilities(fuser::consts::FUSE_ASYNC_READ).ok();

        let (reply, rx) = Reply::channel("init");
        self.fs.init(&context(req), reply);
        match rx.try_recv() {
            Ok(Outcome::Ok) => Ok(()),
            Ok(other) => Err(other.into_errno()),
            Err(_) => Err(libc::EIO),
        }
    }

    fn destroy(&mut self) {
        self.fs.destroy();
    }

    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        self.fs.lookup(&context(req), parent, name, entry_reply("lookup", reply));
    }

    fn forget(&mut self, req: &Request<'_>, ino: u64, nlookup: u64) {
        self.fs.forget(&context(req), ino, nlookup);
    }

    fn batch_forget(&mut self, req: &Request<'_>, nodes: &[fuser::fuse_forget_one]) {
        let nodes: Vec<(u64, u64)> = nodes.iter().map(|n| (n.nodeid, n.nlookup)).collect();
        self.fs.batch_forget(&context(req), &nodes);
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        self.fs.getattr(&context(req), ino, attr_reply("getattr", reply));
    }

    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let changes = SetAttr {
            mode,
            uid,
            gid,
            size,
            atime: atime.map(system_time),
            mtime: mtime.map(system_time),
            fh,
        };
        self.fs.setattr(&context(req), ino, changes, attr_reply("setattr", reply));
    }

    fn readlink(&mut self, req: &Request<'_>, ino: u64, reply: ReplyData) {
        self.fs.readlink(&context(req), ino, data_reply("readlink", reply));
    }

    fn mknod(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        self.fs.mknod(&context(req), parent, name, mode & !umask, rdev, entry_reply("mknod", reply));
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: ReplyEntry,
    ) {
        self.fs.mkdir(&context(req), parent, name, mode & !umask, entry_reply("mkdir", reply));
    }

    fn unlink(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.fs.unlink(&context(req), parent, name, empty_reply("unlink", reply));
    }

    fn rmdir(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.fs.rmdir(&context(req), parent, name, empty_reply("rmdir", reply));
    }

    fn symlink(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        self.fs.symlink(&context(req), parent, link_name, target, entry_reply("symlink", reply));
    }

    fn rename(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        // RENAME_NOREPLACE / RENAME_EXCHANGE have no storage counterpart.
        if flags != 0 {
            warn!(flags, "rename flags are not supported");
            reply.error(libc::EINVAL);
            return;
        }
        self.fs.rename(
            &context(req),
            parent,
            name,
            newparent,
            newname,
            empty_reply("rename", reply),
        );
    }

    fn link(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        self.fs.link(&context(req), ino, newparent, newname, entry_reply("link", reply));
    }

    fn open(&mut self, req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        self.fs.open(&context(req), ino, flags, open_reply("open", reply));
    }

    fn read(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        self.fs.read(&context(req), ino, fh, offset, size, data_reply("read", reply));
    }

    fn write(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let reply = Reply::new("write", move |outcome| match outcome {
            Outcome::Written(count) => reply.written(count),
            other => reply.error(other.into_errno()),
        });
        self.fs.write(&context(req), ino, fh, offset, data, reply);
    }

    fn flush(&mut self, req: &Request<'_>, ino: u64, fh: u64, lock_owner: u64, reply: ReplyEmpty) {
        self.fs.flush(&context(req), ino, fh, lock_owner, empty_reply("flush", reply));
    }

    fn release(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.fs.release(&context(req), ino, fh, empty_reply("release", reply));
    }

    fn fsync(&mut self, req: &Request<'_>, ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        self.fs.fsync(&context(req), ino, fh, datasync, empty_reply("fsync", reply));
    }

    fn opendir(&mut self, req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        self.fs.opendir(&context(req), ino, flags, open_reply("opendir", reply));
    }

    fn readdir(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let bridge = Reply::new("readdir", move |outcome| match outcome {
            Outcome::Directory(buffer) => {
                for entry in buffer.into_entries() {
                    if reply.add(entry.ino, entry.offset, file_type(entry.kind), &entry.name) {
                        break;
                    }
                }
                reply.ok();
            }
            other => reply.error(other.into_errno()),
        });
        self.fs.readdir(&context(req), ino, fh, offset, READDIR_BUDGET, bridge);
    }

    fn releasedir(&mut self, req: &Request<'_>, ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        self.fs.releasedir(&context(req), ino, fh, empty_reply("releasedir", reply));
    }

    fn fsyncdir(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        datasync: bool,
        reply: ReplyEmpty,
    ) {
        self.fs.fsyncdir(&context(req), ino, fh, datasync, empty_reply("fsyncdir", reply));
    }

    fn statfs(&mut self, req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        let bridge = Reply::new("statfs", move |outcome| match outcome {
            Outcome::Statfs(st) => reply.statfs(
                st.blocks, st.bfree, st.bavail, st.files, st.ffree, st.bsize, st.namelen,
                st.frsize,
            ),
            other => reply.error(other.into_errno()),
        });
        self.fs.statfs(&context(req), ino, bridge);
    }

    fn setxattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        flags: i32,
        position: u32,
        reply: ReplyEmpty,
    ) {
        self.fs.setxattr(
            &context(req),
            ino,
            name,
            value,
            flags,
            position,
            empty_reply("setxattr", reply),
        );
    }

    fn getxattr(&mut self, req: &Request<'_>, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        self.fs.getxattr(&context(req), ino, name, size, xattr_reply("getxattr", reply));
    }

    fn listxattr(&mut self, req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
        self.fs.listxattr(&context(req), ino, size, xattr_reply("listxattr", reply));
    }

    fn removexattr(&mut self, req: &Request<'_>, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        self.fs.removexattr(&context(req), ino, name, empty_reply("removexattr", reply));
    }

    fn access(&mut self, req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        self.fs.access(&context(req), ino, mask, empty_reply("access", reply));
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let bridge = Reply::new("create", move |outcome| match outcome {
            Outcome::Create(entry, opened) => reply.created(
                &entry.entry_ttl,
                &fuser_attr(&entry.attr),
                entry.generation,
                opened.fh,
                opened.flags,
            ),
            other => reply.error(other.into_errno()),
        });
        self.fs.create(&context(req), parent, name, mode & !umask, flags, bridge);
    }

    fn getlk(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        lock_owner: u64,
        start: u64,
        end: u64,
        typ: i32,
        pid: u32,
        reply: ReplyLock,
    ) {
        let lock = LockRequest {
            owner: lock_owner,
            start,
            end,
            typ,
            pid,
        };
        // Locks are never held here, so the answer is always an errno.
        let bridge = Reply::new("getlk", move |outcome| reply.error(outcome.into_errno()));
        self.fs.getlk(&context(req), ino, fh, lock, bridge);
    }

    fn setlk(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        lock_owner: u64,
        start: u64,
        end: u64,
        typ: i32,
        pid: u32,
        sleep: bool,
        reply: ReplyEmpty,
    ) {
        let lock = LockRequest {
            owner: lock_owner,
            start,
            end,
            typ,
            pid,
        };
        self.fs.setlk(&context(req), ino, fh, lock, sleep, empty_reply("setlk", reply));
    }

    fn bmap(&mut self, req: &Request<'_>, ino: u64, blocksize: u32, idx: u64, reply: ReplyBmap) {
        let bridge = Reply::new("bmap", move |outcome| match outcome {
            Outcome::Bmap(block) => reply.bmap(block),
            other => reply.error(other.into_errno()),
        });
        self.fs.bmap(&context(req), ino, blocksize, idx, bridge);
    }
}
