//! Path-backed virtual filesystem adapter.
//!
//! This crate serves the numeric-inode FUSE operation set on top of a
//! hierarchical, path-addressed storage backend. It keeps a bidirectional
//! mapping between stable inode numbers and backend paths for the lifetime
//! of a mount, and answers every request exactly once through a move-only
//! reply token.
//!
//! # Features
//!
//! - Deterministic inode identifiers (keyed BLAKE3) with collision probing
//! - Lookup counting and `forget` eviction
//! - Configurable rename semantics ([`RenamePolicy`])
//! - Reads completed on a worker runtime
//! - Host directory passthrough via [`LocalStorage`]
//!
//! # Usage
//!
//! ```ignore
//! use pathfuse::{FuseAdapter, LocalStorage, PathFs};
//!
//! let fs = PathFs::new(LocalStorage::new(source)?)?;
//! fuser::mount2(FuseAdapter::new(fs), mountpoint, &options)?;
//! ```

pub mod attr;
pub mod config;
pub mod error;
pub mod filesystem;
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub mod fuse;
pub mod handles;
pub mod inode;
#[cfg(unix)]
pub mod local;
pub mod reply;
pub mod storage;

pub use attr::{FileAttr, FileKind, StatFs};
pub use config::{MountConfig, RenamePolicy};
pub use error::{FsError, FsResult, ToErrno};
pub use filesystem::{LockRequest, PathFs, RequestContext, SetAttr};
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub use fuse::FuseAdapter;
pub use handles::{FileHandleTable, HandleTable, OpenHandle};
pub use inode::{InodeTable, ROOT_INODE};
#[cfg(unix)]
pub use local::LocalStorage;
pub use reply::{DirBuffer, DirEntry, Entry, Opened, Outcome, Reply, Unsupported};
pub use storage::{Fd, OpenMode, Stat, Storage};
