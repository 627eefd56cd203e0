//! `mountat mount` — Perform one mount relative to a directory.

use std::fs::File;
use std::os::fd::AsFd;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use mountat_common::constants::{OVERLAY_FSTYPE, OVERLAY_SOURCE};
use mountat_common::types::MountRequest;
use mountat_core::isolation::{WorkingContext, mount_in};

/// Isolated mechanism used by `mount`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    /// Forked child with an inherited directory handle.
    Fork,
    /// Fresh helper instance of this executable.
    Reexec,
}

/// Arguments for the `mount` command.
#[derive(Args, Debug)]
pub struct MountArgs {
    /// Mount point.
    pub target: String,

    /// Directory relative paths resolve against.
    #[arg(short, long)]
    pub dir: PathBuf,

    /// Isolation mechanism.
    #[arg(long, value_enum, default_value_t = Via::Fork)]
    pub via: Via,

    /// Mount source.
    #[arg(long, default_value = OVERLAY_SOURCE)]
    pub source: String,

    /// Filesystem type.
    #[arg(short = 't', long, default_value = OVERLAY_FSTYPE)]
    pub fs_type: String,

    /// Raw MS_* flag bitmask.
    #[arg(long, default_value_t = 0)]
    pub flags: u64,

    /// Filesystem options, e.g. `lowerdir=1:2,upperdir=/u,workdir=/w`.
    #[arg(short = 'o', long, default_value = "")]
    pub data: String,
}

/// Executes the `mount` command.
///
/// # Errors
///
/// Returns an error if the directory cannot be opened or the mount fails.
pub fn execute(args: MountArgs) -> anyhow::Result<()> {
    let request = MountRequest::new(args.source, args.target, args.fs_type, args.flags, args.data);
    tracing::info!(%request, dir = %args.dir.display(), via = ?args.via, "mounting");

    match args.via {
        Via::Fork => {
            let handle = File::open(&args.dir)
                .with_context(|| format!("opening {}", args.dir.display()))?;
            mount_in(WorkingContext::Handle(handle.as_fd()), &request)?;
        }
        Via::Reexec => mount_in(WorkingContext::Path(&args.dir), &request)?,
    }
    Ok(())
}
