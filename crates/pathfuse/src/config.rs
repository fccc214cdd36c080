//! Mount configuration for the filesystem adapter.
//!
//! The defaults reproduce the plain passthrough behavior: nothing is cached
//! by the kernel, the generation is a constant, and renamed objects keep
//! their inode.

use std::time::Duration;

/// Generation reported in every entry reply.
pub const DEFAULT_GENERATION: u64 = 1;

/// How the inode table follows a successful rename.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenamePolicy {
    /// The source inode moves to the destination path, along with every
    /// inode below it. Whatever was bound at the destination is dropped.
    #[default]
    Move,
    /// The destination is bound under a fresh identifier and the source
    /// inode stays bound to the old path, where it no longer resolves in
    /// storage.
    Rebind,
}

/// Configuration options for the filesystem adapter.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Time-to-live for cached file attributes.
    ///
    /// Default: zero (no caching).
    pub attr_ttl: Duration,

    /// Time-to-live for cached name lookups.
    ///
    /// Default: zero (no caching).
    pub entry_ttl: Duration,

    /// Generation reported with every entry.
    pub generation: u64,

    pub rename_policy: RenamePolicy,

    /// Complete reads on a worker thread instead of the calling thread.
    pub async_reads: bool,

    /// Report every object as owned by this uid/gid instead of the owner
    /// recorded in storage.
    pub owner: Option<(u32, u32)>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            attr_ttl: Duration::ZERO,
            entry_ttl: Duration::ZERO,
            generation: DEFAULT_GENERATION,
            rename_policy: RenamePolicy::default(),
            async_reads: true,
            owner: None,
        }
    }
}

impl MountConfig {
    /// Creates a configuration with custom TTL values.
    pub fn with_ttl(attr_ttl: Duration, entry_ttl: Duration) -> Self {
        Self {
            attr_ttl,
            entry_ttl,
            ..Default::default()
        }
    }

    /// Sets the cache TTL for file attributes.
    #[must_use]
    pub fn attr_ttl(mut self, ttl: Duration) -> Self {
        self.attr_ttl = ttl;
        self
    }

    /// Sets the cache TTL for entries.
    #[must_use]
    pub fn entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    #[must_use]
    pub fn generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    #[must_use]
    pub fn rename_policy(mut self, policy: RenamePolicy) -> Self {
        self.rename_policy = policy;
        self
    }

    /// Enables or disables completing reads on a worker thread.
    #[must_use]
    pub fn async_reads(mut self, enabled: bool) -> Self {
        self.async_reads = enabled;
        self
    }

    /// Reports every object as owned by `uid`/`gid`.
    #[must_use]
    pub fn owner(mut self, uid: u32, gid: u32) -> Self {
        self.owner = Some((uid, gid));
        self
    }
}
