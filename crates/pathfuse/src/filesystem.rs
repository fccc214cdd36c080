//! Operation dispatcher.
//!
//! [`PathFs`] serves numeric-inode filesystem requests on top of a
//! path-addressed [`Storage`]. Every handler resolves inodes through the
//! [`InodeTable`], performs the storage primitive, binds any path it
//! discovered or created, and answers through its [`Reply`] exactly once.
//!
//! Handlers take `&self` and may run concurrently. No handler holds the
//! inode table lock while storage I/O is in flight.

use crate::attr::{FileAttr, FileKind, StatFs};
use crate::config::{MountConfig, RenamePolicy};
use crate::error::{FsError, FsResult};
use crate::handles::{FileHandleTable, OpenHandle};
use crate::inode::{InodeTable, ROOT_INODE};
use crate::reply::{DirBuffer, DirEntry, Entry, Opened, Reply, Unsupported};
use crate::storage::{OpenMode, Stat, Storage};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info, trace};

/// Block index answered by `bmap`. Storage has no block layout to expose.
pub const BMAP_PLACEHOLDER: u64 = 0;

/// Caller identity attached to every request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
    /// Request id assigned by the channel, used for log correlation.
    pub unique: u64,
}

/// Attribute changes requested by `setattr`. Absent fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetAttr {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub size: Option<u64>,
    pub atime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
    pub fh: Option<u64>,
}

/// A byte-range lock as described by getlk/setlk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockRequest {
    pub owner: u64,
    pub start: u64,
    pub end: u64,
    pub typ: i32,
    pub pid: u32,
}

/// The filesystem dispatcher.
pub struct PathFs<S: Storage> {
    storage: Arc<S>,
    inodes: InodeTable,
    handles: FileHandleTable,
    config: MountConfig,
    /// Runtime reads are completed on, when async reads are enabled.
    handle: Option<Handle>,
    /// Owned tokio runtime (when we create our own). Declared after
    /// `handle` so it drops last.
    _owned_runtime: Option<Runtime>,
}

impl<S: Storage> PathFs<S> {
    /// Creates a dispatcher over `storage` with the default configuration.
    pub fn new(storage: S) -> FsResult<Self> {
        Self::with_config(storage, MountConfig::default())
    }

    /// Creates a dispatcher with custom configuration.
    ///
    /// When async reads are enabled this starts a small runtime of its own.
    pub fn with_config(storage: S, config: MountConfig) -> FsResult<Self> {
        if !config.async_reads {
            return Ok(Self::build(storage, config, None, None));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pathfuse-io")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self::build(storage, config, Some(handle), Some(runtime)))
    }

    /// Creates a dispatcher that completes reads on an existing runtime.
    pub fn with_runtime_handle(storage: S, handle: Handle, config: MountConfig) -> Self {
        let handle = config.async_reads.then_some(handle);
        Self::build(storage, config, handle, None)
    }

    fn build(
        storage: S,
        config: MountConfig,
        handle: Option<Handle>,
        owned_runtime: Option<Runtime>,
    ) -> Self {
        let inodes = InodeTable::new(storage.root().to_path_buf());
        Self {
            storage: Arc::new(storage),
            inodes,
            handles: FileHandleTable::new(),
            config,
            handle,
            _owned_runtime: owned_runtime,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    pub fn handles(&self) -> &FileHandleTable {
        &self.handles
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    // ===== helpers =====

    /// Joins a validated single-component `name` onto the path of `parent`.
    fn child_path(&self, parent: u64, name: &OsStr) -> FsResult<PathBuf> {
        validate_name(name)?;
        Ok(self.inodes.resolve(parent)?.join(name))
    }

    fn attr_from(&self, ino: u64, stat: &Stat) -> FileAttr {
        let attr = FileAttr::from_stat(ino, stat);
        match self.config.owner {
            Some((uid, gid)) => attr.with_owner(uid, gid),
            None => attr,
        }
    }

    fn make_attr(&self, ino: u64, path: &Path) -> FsResult<FileAttr> {
        let stat = self.storage.stat(path)?;
        Ok(self.attr_from(ino, &stat))
    }

    fn make_entry(&self, attr: FileAttr) -> Entry {
        Entry {
            attr,
            generation: self.config.generation,
            attr_ttl: self.config.attr_ttl,
            entry_ttl: self.config.entry_ttl,
        }
    }

    /// Stats a freshly created or discovered path, then binds it with a
    /// lookup reference. Nothing is bound if the stat fails.
    fn bind_entry(&self, path: &Path) -> FsResult<Entry> {
        let stat = self.storage.stat(path)?;
        let ino = self.inodes.bind_lookup(path);
        Ok(self.make_entry(self.attr_from(ino, &stat)))
    }

    /// Path of the directory above `path`, clamped to the root.
    fn parent_of(&self, path: &Path) -> PathBuf {
        let root = self.inodes.root();
        match path.parent() {
            Some(parent) if path != root && parent.starts_with(root) => parent.to_path_buf(),
            _ => root.to_path_buf(),
        }
    }

    fn open_handle(&self, fh: u64) -> FsResult<OpenHandle> {
        self.handles
            .get(fh)
            .map(|handle| *handle)
            .ok_or(FsError::InvalidHandle(fh))
    }

    /// The handle `fh` if it is live, writable and open on `ino`.
    fn writable_handle(&self, ino: u64, fh: u64) -> Option<OpenHandle> {
        self.open_handle(fh)
            .ok()
            .filter(|handle| handle.ino == ino && handle.mode.is_writable())
    }

    // ===== lifecycle =====

    pub fn init(&self, ctx: &RequestContext, reply: Reply) {
        info!(root = %self.inodes.root().display(), req = ctx.unique, "filesystem initialized");
        reply.ok();
    }

    /// Closes every handle the kernel left open.
    pub fn destroy(&self) {
        let open = self.handles.drain();
        for handle in &open {
            if let Err(e) = self.storage.close(handle.fd) {
                debug!(fd = handle.fd, error = %e, "close on destroy failed");
            }
        }
        info!(closed = open.len(), inodes = self.inodes.len(), "filesystem destroyed");
    }

    // ===== names and attributes =====

    /// Looks up `name` in `parent`.
    ///
    /// A missing child answers `ENOENT` and leaves the inode table as it
    /// was. `.` and `..` resolve to the directory itself and its parent.
    pub fn lookup(&self, ctx: &RequestContext, parent: u64, name: &OsStr, reply: Reply) {
        trace!(req = ctx.unique, parent, name = ?name, "lookup");
        match self.lookup_child(parent, name) {
            Ok(entry) => reply.entry(entry),
            Err(e) => reply.fail(&e),
        }
    }

    fn lookup_child(&self, parent: u64, name: &OsStr) -> FsResult<Entry> {
        let path = if name == "." {
            self.inodes.resolve(parent)?
        } else if name == ".." {
            self.parent_of(&self.inodes.resolve(parent)?)
        } else {
            self.child_path(parent, name)?
        };
        self.bind_entry(&path)
    }

    pub fn forget(&self, ctx: &RequestContext, ino: u64, nlookup: u64) {
        trace!(req = ctx.unique, ino, nlookup, "forget");
        if self.inodes.forget(ino, nlookup) {
            trace!(ino, "inode evicted");
        }
    }

    /// Same as calling [`forget`](Self::forget) for each `(ino, nlookup)`.
    pub fn batch_forget(&self, ctx: &RequestContext, nodes: &[(u64, u64)]) {
        trace!(req = ctx.unique, count = nodes.len(), "batch_forget");
        for &(ino, nlookup) in nodes {
            self.inodes.forget(ino, nlookup);
        }
    }

    pub fn getattr(&self, ctx: &RequestContext, ino: u64, reply: Reply) {
        trace!(req = ctx.unique, ino, "getattr");
        let result = self
            .inodes
            .resolve(ino)
            .and_then(|path| self.make_attr(ino, &path));
        match result {
            Ok(attr) => reply.attr(attr, self.config.attr_ttl),
            Err(e) => reply.fail(&e),
        }
    }

    /// Applies mode, size and timestamp changes, then answers the refreshed
    /// attributes. Any rejected change answers `EIO`.
    pub fn setattr(&self, ctx: &RequestContext, ino: u64, changes: SetAttr, reply: Reply) {
        trace!(req = ctx.unique, ino, ?changes, "setattr");
        match self.apply_setattr(ino, &changes) {
            Ok(attr) => reply.attr(attr, self.config.attr_ttl),
            Err(e) => reply.fail(&e),
        }
    }

    fn apply_setattr(&self, ino: u64, changes: &SetAttr) -> FsResult<FileAttr> {
        let path = self.inodes.resolve(ino)?;

        if let Some(mode) = changes.mode {
            self.storage.chmod(&path, mode).map_err(FsError::AttrChange)?;
        }
        if let Some(size) = changes.size {
            // ftruncate on an open file goes through its descriptor, which
            // still works after the file's mode stopped allowing writes.
            let truncated = match changes.fh.and_then(|fh| self.writable_handle(ino, fh)) {
                Some(handle) => self.storage.ftruncate(handle.fd, size),
                None => self.storage.truncate(&path, size),
            };
            truncated.map_err(FsError::AttrChange)?;
        }
        if changes.atime.is_some() || changes.mtime.is_some() {
            self.storage
                .set_times(&path, changes.atime, changes.mtime)
                .map_err(FsError::AttrChange)?;
        }
        if changes.uid.is_some() || changes.gid.is_some() {
            debug!(ino, uid = ?changes.uid, gid = ?changes.gid, "ownership changes are ignored");
        }

        self.make_attr(ino, &path)
    }

    pub fn readlink(&self, ctx: &RequestContext, ino: u64, reply: Reply) {
        trace!(req = ctx.unique, ino, "readlink");
        let result = self
            .inodes
            .resolve(ino)
            .and_then(|path| self.storage.readlink(&path).map_err(FsError::from));
        match result {
            Ok(target) => reply.readlink(target),
            Err(e) => reply.fail(&e),
        }
    }

    // ===== namespace changes =====

    /// Device and FIFO nodes cannot be created.
    pub fn mknod(
        &self,
        ctx: &RequestContext,
        parent: u64,
        name: &OsStr,
        mode: u32,
        rdev: u32,
        reply: Reply,
    ) {
        trace!(req = ctx.unique, parent, name = ?name, mode, rdev, "mknod");
        reply.unsupported(Unsupported::Mknod);
    }

    pub fn mkdir(&self, ctx: &RequestContext, parent: u64, name: &OsStr, mode: u32, reply: Reply) {
        trace!(req = ctx.unique, parent, name = ?name, mode, "mkdir");
        let result = self.child_path(parent, name).and_then(|path| {
            self.storage.mkdir(&path, mode)?;
            self.bind_entry(&path)
        });
        match result {
            Ok(entry) => reply.entry(entry),
            Err(e) => reply.fail(&e),
        }
    }

    /// Creates and opens a regular file, answering the entry and the handle
    /// together.
    pub fn create(
        &self,
        ctx: &RequestContext,
        parent: u64,
        name: &OsStr,
        mode: u32,
        flags: i32,
        reply: Reply,
    ) {
        trace!(req = ctx.unique, parent, name = ?name, mode, flags, "create");
        match self.create_file(parent, name, mode) {
            Ok((entry, opened)) => reply.create(entry, opened),
            Err(e) => reply.fail(&e),
        }
    }

    fn create_file(&self, parent: u64, name: &OsStr, mode: u32) -> FsResult<(Entry, Opened)> {
        let path = self.child_path(parent, name)?;
        let fd = self.storage.create(&path, mode)?;
        let entry = match self.bind_entry(&path) {
            Ok(entry) => entry,
            Err(e) => {
                if let Err(close_err) = self.storage.close(fd) {
                    debug!(fd, error = %close_err, "close after failed create failed");
                }
                return Err(e);
            }
        };
        let fh = self.handles.insert(OpenHandle {
            ino: entry.ino(),
            fd,
            mode: OpenMode::ReadWrite,
        });
        Ok((entry, Opened { fh, flags: 0 }))
    }

    pub fn unlink(&self, ctx: &RequestContext, parent: u64, name: &OsStr, reply: Reply) {
        trace!(req = ctx.unique, parent, name = ?name, "unlink");
        let result = self.child_path(parent, name).and_then(|path| {
            self.storage.unlink(&path)?;
            self.inodes.unbind_path(&path);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.fail(&e),
        }
    }

    /// Removes an empty directory. Inodes bound below it are left alone.
    pub fn rmdir(&self, ctx: &RequestContext, parent: u64, name: &OsStr, reply: Reply) {
        trace!(req = ctx.unique, parent, name = ?name, "rmdir");
        let result = self.child_path(parent, name).and_then(|path| {
            self.storage.rmdir(&path)?;
            self.inodes.unbind_path(&path);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.fail(&e),
        }
    }

    pub fn symlink(
        &self,
        ctx: &RequestContext,
        parent: u64,
        name: &OsStr,
        target: &Path,
        reply: Reply,
    ) {
        trace!(req = ctx.unique, parent, name = ?name, target = %target.display(), "symlink");
        let result = self.child_path(parent, name).and_then(|path| {
            self.storage.symlink(target, &path)?;
            self.bind_entry(&path)
        });
        match result {
            Ok(entry) => reply.entry(entry),
            Err(e) => reply.fail(&e),
        }
    }

    /// Renames `parent/name` to `newparent/newname`.
    ///
    /// How inodes follow the rename is decided by [`RenamePolicy`].
    pub fn rename(
        &self,
        ctx: &RequestContext,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        reply: Reply,
    ) {
        trace!(req = ctx.unique, parent, name = ?name, newparent, newname = ?newname, "rename");
        match self.rename_path(parent, name, newparent, newname) {
            Ok(()) => reply.ok(),
            Err(e) => reply.fail(&e),
        }
    }

    fn rename_path(
        &self,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
    ) -> FsResult<()> {
        let from = self.child_path(parent, name)?;
        let to = self.child_path(newparent, newname)?;
        self.storage.rename(&from, &to)?;

        match self.config.rename_policy {
            RenamePolicy::Move => {
                self.inodes.rename(&from, &to);
            }
            RenamePolicy::Rebind => {
                self.inodes.unbind_path(&to);
                self.inodes.bind(&to);
            }
        }
        Ok(())
    }

    /// Creates a hard link to `ino` at `newparent/newname`.
    pub fn link(
        &self,
        ctx: &RequestContext,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: Reply,
    ) {
        trace!(req = ctx.unique, ino, newparent, newname = ?newname, "link");
        let result = self.inodes.resolve(ino).and_then(|src| {
            let dst = self.child_path(newparent, newname)?;
            self.storage.link(&src, &dst)?;
            self.bind_entry(&dst)
        });
        match result {
            Ok(entry) => reply.entry(entry),
            Err(e) => reply.fail(&e),
        }
    }

    // ===== file I/O =====

    /// Opens `ino` read-write, falling back to read-only.
    ///
    /// Answers `EIO` only when both attempts fail.
    pub fn open(&self, ctx: &RequestContext, ino: u64, flags: i32, reply: Reply) {
        trace!(req = ctx.unique, ino, flags, "open");
        match self.open_file(ino) {
            Ok(opened) => reply.open(opened),
            Err(e) => reply.fail(&e),
        }
    }

    fn open_file(&self, ino: u64) -> FsResult<Opened> {
        let path = self.inodes.resolve(ino)?;
        let (fd, mode) = match self.storage.open(&path, OpenMode::ReadWrite) {
            Ok(fd) => (fd, OpenMode::ReadWrite),
            Err(e) => {
                debug!(ino, error = %e, "read-write open failed, retrying read-only");
                let fd = self
                    .storage
                    .open(&path, OpenMode::ReadOnly)
                    .map_err(FsError::OpenFailed)?;
                (fd, OpenMode::ReadOnly)
            }
        };
        let fh = self.handles.insert(OpenHandle { ino, fd, mode });
        Ok(Opened { fh, flags: 0 })
    }

    /// Reads up to `size` bytes at `offset`. A short buffer means EOF.
    ///
    /// With async reads enabled the storage call and the reply run on a
    /// worker thread; the token moves into the task.
    pub fn read(
        &self,
        ctx: &RequestContext,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        reply: Reply,
    ) {
        trace!(req = ctx.unique, ino, fh, offset, size, "read");
        let (fd, offset) = match self.read_target(fh, offset) {
            Ok(target) => target,
            Err(e) => return reply.fail(&e),
        };

        let storage = Arc::clone(&self.storage);
        let task = move || match storage.read(fd, offset, size) {
            Ok(data) => reply.buffer(data),
            Err(e) => reply.fail(&FsError::Io(e)),
        };
        match &self.handle {
            Some(handle) => {
                handle.spawn_blocking(task);
            }
            None => task(),
        }
    }

    fn read_target(&self, fh: u64, offset: i64) -> FsResult<(u64, u64)> {
        let offset = u64::try_from(offset).map_err(|_| FsError::InvalidOffset(offset))?;
        Ok((self.open_handle(fh)?.fd, offset))
    }

    pub fn write(
        &self,
        ctx: &RequestContext,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        reply: Reply,
    ) {
        trace!(req = ctx.unique, ino, fh, offset, len = data.len(), "write");
        match self.write_at(fh, offset, data) {
            Ok(written) => reply.written(written),
            Err(e) => reply.fail(&e),
        }
    }

    fn write_at(&self, fh: u64, offset: i64, data: &[u8]) -> FsResult<u32> {
        let offset = u64::try_from(offset).map_err(|_| FsError::InvalidOffset(offset))?;
        let handle = self.open_handle(fh)?;
        if !handle.mode.is_writable() {
            return Err(FsError::ReadOnlyHandle(fh));
        }
        let written = self.storage.write(handle.fd, offset, data)?;
        Ok(u32::try_from(written).unwrap_or(u32::MAX))
    }

    pub fn flush(&self, ctx: &RequestContext, ino: u64, fh: u64, lock_owner: u64, reply: Reply) {
        trace!(req = ctx.unique, ino, fh, lock_owner, "flush");
        match self.open_handle(fh) {
            Ok(_) => reply.ok(),
            Err(e) => reply.fail(&e),
        }
    }

    /// Drops the handle and closes its descriptor. Always acknowledged.
    pub fn release(&self, ctx: &RequestContext, ino: u64, fh: u64, reply: Reply) {
        trace!(req = ctx.unique, ino, fh, "release");
        if let Some(handle) = self.handles.remove(fh)
            && let Err(e) = self.storage.close(handle.fd)
        {
            debug!(fh, fd = handle.fd, error = %e, "close failed");
        }
        reply.ok();
    }

    pub fn fsync(&self, ctx: &RequestContext, ino: u64, fh: u64, datasync: bool, reply: Reply) {
        trace!(req = ctx.unique, ino, fh, datasync, "fsync");
        match self.open_handle(fh) {
            Ok(_) => reply.ok(),
            Err(e) => reply.fail(&e),
        }
    }

    // ===== directories =====

    /// Directories are not held open; every opendir answers handle 0.
    pub fn opendir(&self, ctx: &RequestContext, ino: u64, flags: i32, reply: Reply) {
        trace!(req = ctx.unique, ino, flags, "opendir");
        match self.inodes.resolve(ino) {
            Ok(_) => reply.open(Opened { fh: 0, flags: 0 }),
            Err(e) => reply.fail(&e),
        }
    }

    /// Lists `ino` starting at `offset`, filling at most `budget` bytes.
    ///
    /// The stream is `.`, `..`, then the storage entries in storage order.
    /// Entry `i` carries offset `i + 1`, so a caller resumes by passing the
    /// last offset it received. An empty buffer ends the stream. Children are
    /// bound without a lookup reference; children that vanish between
    /// listing and stat are skipped.
    pub fn readdir(
        &self,
        ctx: &RequestContext,
        ino: u64,
        fh: u64,
        offset: i64,
        budget: usize,
        reply: Reply,
    ) {
        trace!(req = ctx.unique, ino, fh, offset, budget, "readdir");
        match self.list_dir(ino, offset, budget) {
            Ok(buffer) => reply.directory(buffer),
            Err(e) => reply.fail(&e),
        }
    }

    fn list_dir(&self, ino: u64, offset: i64, budget: usize) -> FsResult<DirBuffer> {
        let start = usize::try_from(offset).map_err(|_| FsError::InvalidOffset(offset))?;
        let path = self.inodes.resolve(ino)?;
        let names = self.storage.readdir(&path)?;
        let mut buffer = DirBuffer::new(budget);

        let parent_ino = if ino == ROOT_INODE {
            ROOT_INODE
        } else {
            self.inodes.bind(&self.parent_of(&path))
        };
        let dots = [
            (ino, OsString::from(".")),
            (parent_ino, OsString::from("..")),
        ];
        let dot_count = dots.len();

        for (index, (entry_ino, name)) in dots.into_iter().enumerate().skip(start) {
            if buffer.add(dir_entry(entry_ino, index, FileKind::Directory, name)) {
                return Ok(buffer);
            }
        }

        let skip = start.saturating_sub(dot_count);
        for (position, name) in names.into_iter().enumerate().skip(skip) {
            let child = path.join(&name);
            let stat = match self.storage.stat(&child) {
                Ok(stat) => stat,
                Err(e) => {
                    trace!(path = %child.display(), error = %e, "entry vanished during readdir");
                    continue;
                }
            };
            let child_ino = self.inodes.bind(&child);
            let index = position + dot_count;
            if buffer.add(dir_entry(child_ino, index, stat.kind, name)) {
                break;
            }
        }
        Ok(buffer)
    }

    pub fn releasedir(&self, ctx: &RequestContext, ino: u64, fh: u64, reply: Reply) {
        trace!(req = ctx.unique, ino, fh, "releasedir");
        reply.ok();
    }

    pub fn fsyncdir(&self, ctx: &RequestContext, ino: u64, fh: u64, datasync: bool, reply: Reply) {
        trace!(req = ctx.unique, ino, fh, datasync, "fsyncdir");
        reply.ok();
    }

    // ===== filesystem-wide =====

    /// Reports storage capacity, or a constant model when storage has none.
    pub fn statfs(&self, ctx: &RequestContext, ino: u64, reply: Reply) {
        trace!(req = ctx.unique, ino, "statfs");
        let stats = match self.storage.statfs(self.inodes.root()) {
            Ok(stats) => stats,
            Err(e) => {
                debug!(error = %e, "storage statfs failed, using defaults");
                StatFs::fallback()
            }
        };
        reply.statfs(stats);
    }

    /// Every access check passes; storage enforces permissions.
    pub fn access(&self, ctx: &RequestContext, ino: u64, mask: i32, reply: Reply) {
        trace!(req = ctx.unique, ino, mask, "access");
        reply.ok();
    }

    #[allow(clippy::too_many_arguments)]
    pub fn setxattr(
        &self,
        ctx: &RequestContext,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        flags: i32,
        position: u32,
        reply: Reply,
    ) {
        trace!(req = ctx.unique, ino, name = ?name, len = value.len(), flags, position, "setxattr");
        reply.unsupported(Unsupported::SetXattr);
    }

    pub fn getxattr(&self, ctx: &RequestContext, ino: u64, name: &OsStr, size: u32, reply: Reply) {
        trace!(req = ctx.unique, ino, name = ?name, size, "getxattr");
        reply.unsupported(Unsupported::GetXattr);
    }

    pub fn listxattr(&self, ctx: &RequestContext, ino: u64, size: u32, reply: Reply) {
        trace!(req = ctx.unique, ino, size, "listxattr");
        reply.unsupported(Unsupported::ListXattr);
    }

    pub fn removexattr(&self, ctx: &RequestContext, ino: u64, name: &OsStr, reply: Reply) {
        trace!(req = ctx.unique, ino, name = ?name, "removexattr");
        reply.unsupported(Unsupported::RemoveXattr);
    }

    /// Locks are left to the kernel.
    pub fn getlk(&self, ctx: &RequestContext, ino: u64, fh: u64, lock: LockRequest, reply: Reply) {
        trace!(req = ctx.unique, ino, fh, ?lock, "getlk");
        reply.unsupported(Unsupported::GetLock);
    }

    pub fn setlk(
        &self,
        ctx: &RequestContext,
        ino: u64,
        fh: u64,
        lock: LockRequest,
        sleep: bool,
        reply: Reply,
    ) {
        trace!(req = ctx.unique, ino, fh, ?lock, sleep, "setlk");
        reply.unsupported(Unsupported::SetLock);
    }

    pub fn bmap(&self, ctx: &RequestContext, ino: u64, blocksize: u32, idx: u64, reply: Reply) {
        trace!(req = ctx.unique, ino, blocksize, idx, "bmap");
        reply.bmap(BMAP_PLACEHOLDER);
    }
}

/// Rejects names that are not a single path component.
fn validate_name(name: &OsStr) -> FsResult<()> {
    let bytes = name.as_encoded_bytes();
    if bytes.is_empty() || bytes.contains(&b'/') || name == "." || name == ".." {
        return Err(FsError::InvalidName(name.to_string_lossy().into_owned()));
    }
    Ok(())
}

fn dir_entry(ino: u64, index: usize, kind: FileKind, name: OsString) -> DirEntry {
    DirEntry {
        ino,
        offset: i64::try_from(index + 1).unwrap_or(i64::MAX),
        kind,
        name,
    }
}
