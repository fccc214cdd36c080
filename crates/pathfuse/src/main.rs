//! pathmount - Mount a host directory through the path-backed adapter.
//!
//! Usage: pathmount <SOURCE> <MOUNTPOINT>

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pathfuse::{FuseAdapter, LocalStorage, MountConfig, PathFs, RenamePolicy};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RenameArg {
    /// Renamed objects keep their inode
    Move,
    /// The destination gets a fresh inode; the source inode goes stale
    Rebind,
}

impl From<RenameArg> for RenamePolicy {
    fn from(arg: RenameArg) -> Self {
        match arg {
            RenameArg::Move => RenamePolicy::Move,
            RenameArg::Rebind => RenamePolicy::Rebind,
        }
    }
}

#[derive(Parser)]
#[command(name = "pathmount")]
#[command(about = "Mount a directory through a path-backed FUSE filesystem")]
#[command(version)]
struct Cli {
    /// Directory to expose
    source: PathBuf,

    /// Mountpoint for the filesystem
    mount: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Mount as read-only (default: read-write)
    #[arg(long)]
    read_only: bool,

    /// Kernel attribute cache TTL in milliseconds
    #[arg(long, default_value_t = 0)]
    attr_ttl_ms: u64,

    /// Kernel entry cache TTL in milliseconds
    #[arg(long, default_value_t = 0)]
    entry_ttl_ms: u64,

    /// How inodes follow a rename
    #[arg(long, value_enum, default_value_t = RenameArg::Move)]
    rename_policy: RenameArg,

    /// Complete reads on the calling thread
    #[arg(long)]
    sync_reads: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    if !cli.source.is_dir() {
        anyhow::bail!("Source is not a directory: {}", cli.source.display());
    }
    if !cli.mount.exists() {
        anyhow::bail!("Mountpoint does not exist: {}", cli.mount.display());
    }

    let config = MountConfig::with_ttl(
        Duration::from_millis(cli.attr_ttl_ms),
        Duration::from_millis(cli.entry_ttl_ms),
    )
    .rename_policy(cli.rename_policy.into())
    .async_reads(!cli.sync_reads);

    info!(source = %cli.source.display(), mount = %cli.mount.display(), "Mounting directory");

    let storage = LocalStorage::new(&cli.source)
        .with_context(|| format!("Failed to open source {}", cli.source.display()))?;
    let fs = PathFs::with_config(storage, config).context("Failed to initialize filesystem")?;

    mount_and_wait(&cli, fs)
}

/// Mount the filesystem and wait for Ctrl+C.
fn mount_and_wait(cli: &Cli, fs: PathFs<LocalStorage>) -> Result<()> {
    let source_name = cli
        .source
        .file_name()
        .map_or_else(|| "root".to_string(), |n| n.to_string_lossy().to_string());

    let mut options = vec![
        fuser::MountOption::FSName(format!("pathfuse:{source_name}")),
        fuser::MountOption::Subtype("pathfuse".to_string()),
        fuser::MountOption::AutoUnmount,
    ];

    #[cfg(target_os = "macos")]
    options.push(fuser::MountOption::CUSTOM(format!("volname={source_name}")));

    if cli.read_only {
        options.push(fuser::MountOption::RO);
    } else {
        options.push(fuser::MountOption::RW);
    }

    let (tx, rx) = mpsc::channel::<()>();

    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set signal handler")?;

    info!("Mounting filesystem (press Ctrl+C to unmount)");

    let session = fuser::spawn_mount2(FuseAdapter::new(fs), &cli.mount, &options).map_err(|e| {
        error!(error = %e, "Mount failed");
        anyhow::anyhow!("Failed to mount filesystem: {e}")
    })?;

    info!("Filesystem mounted at {}", cli.mount.display());

    match rx.recv() {
        Ok(()) => info!("Received interrupt signal, unmounting..."),
        Err(_) => warn!("Signal channel closed unexpectedly"),
    }

    drop(session);
    info!("Filesystem unmounted");
    Ok(())
}
