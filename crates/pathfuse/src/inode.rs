//! Inode management for the filesystem adapter.
//!
//! This module maps protocol inode numbers to absolute backend paths and
//! back. Identifiers are derived from the path with keyed BLAKE3, so the same
//! path gets the same inode across sessions unless it collides with an
//! identifier already held by another path. Collisions are resolved by
//! rehashing with an increasing salt until a free identifier turns up.
//!
//! Both directions live behind a single mutex. Callers never hold it across
//! storage I/O: every public method is one short critical section.

use crate::error::{FsError, FsResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The root inode number (FUSE convention).
pub const ROOT_INODE: u64 = 1;

/// Context string for deriving the inode hashing key.
const INODE_KEY_CONTEXT: &str = "pathfuse inode identifiers v1";

/// An entry in the inode table.
#[derive(Debug)]
struct InodeEntry {
    path: PathBuf,
    /// Lookup count for `forget()` handling.
    nlookup: u64,
}

#[derive(Debug, Default)]
struct Tables {
    by_inode: HashMap<u64, InodeEntry>,
    by_path: HashMap<PathBuf, u64>,
}

/// Thread-safe table mapping between inodes and backend paths.
pub struct InodeTable {
    key: [u8; 32],
    root: PathBuf,
    inner: Mutex<Tables>,
}

impl InodeTable {
    /// Creates a new inode table with `root` pre-bound to [`ROOT_INODE`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut tables = Tables::default();
        tables.by_inode.insert(
            ROOT_INODE,
            InodeEntry {
                path: root.clone(),
                nlookup: 1,
            },
        );
        tables.by_path.insert(root.clone(), ROOT_INODE);

        Self {
            key: blake3::derive_key(INODE_KEY_CONTEXT, root.as_os_str().as_encoded_bytes()),
            root,
            inner: Mutex::new(tables),
        }
    }

    /// The path bound to [`ROOT_INODE`].
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path bound to `inode`.
    pub fn resolve(&self, inode: u64) -> FsResult<PathBuf> {
        self.inner
            .lock()
            .by_inode
            .get(&inode)
            .map(|entry| entry.path.clone())
            .ok_or(FsError::NotFound(inode))
    }

    /// Binds `path` and returns its inode without touching the lookup count.
    ///
    /// Used for readdir enumeration, which must not affect nlookup.
    /// Idempotent: an already bound path returns its existing inode.
    pub fn bind(&self, path: &Path) -> u64 {
        self.insert(path, 0)
    }

    /// Binds `path` and increments its lookup count.
    ///
    /// Used by every operation that hands the kernel a new entry reference
    /// (lookup, mkdir, create, link, symlink).
    pub fn bind_lookup(&self, path: &Path) -> u64 {
        self.insert(path, 1)
    }

    fn insert(&self, path: &Path, lookups: u64) -> u64 {
        let mut tables = self.inner.lock();

        if let Some(&inode) = tables.by_path.get(path) {
            if let Some(entry) = tables.by_inode.get_mut(&inode) {
                entry.nlookup += lookups;
            }
            return inode;
        }

        let inode = self.free_inode(&tables, path);
        tables.by_inode.insert(
            inode,
            InodeEntry {
                path: path.to_path_buf(),
                nlookup: lookups,
            },
        );
        tables.by_path.insert(path.to_path_buf(), inode);
        inode
    }

    /// Derives the first identifier for `path` that is neither reserved nor
    /// held by another path.
    fn free_inode(&self, tables: &Tables, path: &Path) -> u64 {
        let mut salt = 0u64;
        loop {
            let candidate = self.derive(path, salt);
            if candidate > ROOT_INODE && !tables.by_inode.contains_key(&candidate) {
                if salt > 0 {
                    debug!(path = %path.display(), salt, inode = candidate, "inode hash collision resolved");
                }
                return candidate;
            }
            salt += 1;
        }
    }

    fn derive(&self, path: &Path, salt: u64) -> u64 {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(path.as_os_str().as_encoded_bytes());
        if salt > 0 {
            hasher.update(&salt.to_le_bytes());
        }
        let hash = hasher.finalize();
        let mut id = [0u8; 8];
        id.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(id)
    }

    /// Removes the mapping for `inode`. Absent inodes and the root are ignored.
    pub fn unbind(&self, inode: u64) {
        if inode == ROOT_INODE {
            return;
        }
        let mut tables = self.inner.lock();
        if let Some(entry) = tables.by_inode.remove(&inode)
            && tables.by_path.get(&entry.path) == Some(&inode)
        {
            tables.by_path.remove(&entry.path);
        }
    }

    /// Removes whatever inode is bound to `path`, returning it.
    pub fn unbind_path(&self, path: &Path) -> Option<u64> {
        let mut tables = self.inner.lock();
        let inode = *tables.by_path.get(path)?;
        if inode == ROOT_INODE {
            return None;
        }
        tables.by_path.remove(path);
        tables.by_inode.remove(&inode);
        Some(inode)
    }

    /// Looks up the inode bound to `path`.
    pub fn inode_of(&self, path: &Path) -> Option<u64> {
        self.inner.lock().by_path.get(path).copied()
    }

    /// Moves every inode at or below `from` so it lives below `to` instead.
    ///
    /// Whatever was bound at a destination path is displaced and unbound.
    /// Returns the inode now bound to `to`, if any.
    pub fn rename(&self, from: &Path, to: &Path) -> Option<u64> {
        let mut tables = self.inner.lock();
        if from == to {
            return tables.by_path.get(to).copied();
        }

        if let Some(&displaced) = tables.by_path.get(to)
            && displaced != ROOT_INODE
        {
            tables.by_path.remove(to);
            tables.by_inode.remove(&displaced);
        }

        let moved: Vec<(PathBuf, u64)> = tables
            .by_path
            .iter()
            .filter(|(path, _)| path.starts_with(from))
            .map(|(path, inode)| (path.clone(), *inode))
            .collect();

        for (old_path, inode) in moved {
            let Ok(suffix) = old_path.strip_prefix(from) else {
                continue;
            };
            let new_path = if suffix.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(suffix)
            };

            tables.by_path.remove(&old_path);
            if let Some(previous) = tables.by_path.insert(new_path.clone(), inode)
                && previous != inode
            {
                tables.by_inode.remove(&previous);
            }
            if let Some(entry) = tables.by_inode.get_mut(&inode) {
                entry.path = new_path;
            }
        }

        tables.by_path.get(to).copied()
    }

    /// Decrements the lookup count for an inode.
    ///
    /// When the count reaches zero the inode is evicted. Returns `true` if
    /// the inode was evicted. The root is never evicted.
    pub fn forget(&self, inode: u64, nlookup: u64) -> bool {
        if inode == ROOT_INODE {
            return false;
        }

        let mut tables = self.inner.lock();
        let Some(entry) = tables.by_inode.get_mut(&inode) else {
            return false;
        };
        entry.nlookup = entry.nlookup.saturating_sub(nlookup);
        if entry.nlookup > 0 {
            return false;
        }

        let path = entry.path.clone();
        tables.by_inode.remove(&inode);
        if tables.by_path.get(&path) == Some(&inode) {
            tables.by_path.remove(&path);
        }
        true
    }

    /// Returns the current lookup count of an inode.
    pub fn nlookup(&self, inode: u64) -> Option<u64> {
        self.inner.lock().by_inode.get(&inode).map(|e| e.nlookup)
    }

    /// Returns the number of inodes currently in the table.
    pub fn len(&self) -> usize {
        self.inner.lock().by_inode.len()
    }

    /// Returns true if the table only contains the root inode.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}
