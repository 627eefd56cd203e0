//! Thin wrappers around `mount(2)` and `umount2(2)`.

use std::path::Path;

use mountat_common::error::{MountatError, Result};
use mountat_common::types::MountRequest;
use nix::errno::Errno;
use nix::mount::{MntFlags, mount, umount2};

use crate::retry::{Classification, RetryError, RetryPolicy, Settlement};

/// Issues `mount(2)` with the request's fields, resolving relative paths
/// against the calling process's current working directory.
///
/// This is the unprotected baseline: any concurrent `chdir` elsewhere in the
/// process changes what the relative paths refer to.
///
/// # Errors
///
/// Returns [`MountatError::InvalidRequest`] for unrepresentable requests and
/// [`MountatError::Mount`] with the raw errno if the kernel rejects the call.
pub fn mount_request(request: &MountRequest) -> Result<()> {
    request.validate()?;
    let flags = request.ms_flags()?;
    mount(
        Some(request.source()),
        request.target(),
        Some(request.fs_type()),
        flags,
        Some(request.data()),
    )
    .map_err(|e| MountatError::Mount {
        target: request.target().to_owned(),
        source: e,
    })?;
    tracing::debug!(target = request.target(), "mounted directly");
    Ok(())
}

/// Lazily detaches the mount at `target` once.
///
/// # Errors
///
/// Returns the raw errno from `umount2(2)`.
pub fn detach(target: &Path) -> std::result::Result<(), Errno> {
    umount2(target, MntFlags::MNT_DETACH)
}

/// Classifies a detach-unmount failure.
///
/// `EINVAL` means the target is no longer a mount point, which is the state
/// the caller wants. `EBUSY` and every other error are retried.
#[must_use]
pub const fn classify_unmount_error(errno: &Errno) -> Classification {
    match errno {
        Errno::EINVAL => Classification::Settled,
        _ => Classification::Retry,
    }
}

/// Detach-unmounts `target`, retrying according to `policy`.
///
/// # Errors
///
/// Returns [`MountatError::UnmountExhausted`] if the target is still mounted
/// after `policy.max_attempts` attempts. A stuck mount blocks cleanup of the
/// fixture beneath it and needs operator attention.
pub fn unmount_with_retry(target: &Path, policy: &RetryPolicy) -> Result<Settlement> {
    let outcome = policy
        .run(|| detach(target), classify_unmount_error)
        .map_err(|e| {
            let (attempts, source) = match e {
                RetryError::Exhausted { attempts, last } => (attempts, last),
                RetryError::Fatal { attempt, error } => (attempt, error),
            };
            MountatError::UnmountExhausted {
                target: target.to_path_buf(),
                attempts,
                source,
            }
        })?;
    match outcome {
        Settlement::Succeeded(attempts) => {
            tracing::debug!(target = %target.display(), attempts, "unmounted");
        }
        Settlement::AlreadySettled(attempts) => {
            tracing::debug!(target = %target.display(), attempts, "not mounted");
        }
    }
    Ok(outcome)
}
