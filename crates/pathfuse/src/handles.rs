//! File handle management.
//!
//! [`HandleTable`] hands out auto-incrementing `u64` handles over a
//! `DashMap`. The dispatcher uses it to track open files between `open` and
//! `release`, and [`LocalStorage`](crate::local::LocalStorage) uses it for
//! its own descriptor table.
//!
//! # Handle Lifecycle
//!
//! 1. **Insert**: a handle is issued on open/create
//! 2. **Get**: read/write/flush/fsync look it up; unknown handles are rejected
//! 3. **Remove**: release removes it, after which it is never valid again

use crate::storage::{Fd, OpenMode};
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::Ref;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe handle table with auto-incrementing IDs.
///
/// IDs start at 1; 0 is reserved (opendir replies with it).
#[derive(Debug)]
pub struct HandleTable<V> {
    handles: DashMap<u64, V>,
    next_id: AtomicU64,
}

impl<V> HandleTable<V> {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a value and return its freshly issued ID.
    pub fn insert(&self, value: V) -> u64 {
        let mut value = Some(value);
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id == 0 {
                continue;
            }
            if let Entry::Vacant(entry) = self.handles.entry(id)
                && let Some(value) = value.take()
            {
                entry.insert(value);
                return id;
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<Ref<'_, u64, V>> {
        self.handles.get(&id)
    }

    pub fn remove(&self, id: u64) -> Option<V> {
        self.handles.remove(&id).map(|(_, v)| v)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.handles.contains_key(&id)
    }

    /// Removes and returns every handle.
    pub fn drain(&self) -> Vec<V> {
        let ids: Vec<u64> = self.handles.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<V> Default for HandleTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// An open file, from `open`/`create` until `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenHandle {
    /// Inode the handle was opened on.
    pub ino: u64,
    /// Backend descriptor.
    pub fd: Fd,
    pub mode: OpenMode,
}

/// Table of open files, keyed by the handle given to the kernel.
pub type FileHandleTable = HandleTable<OpenHandle>;
