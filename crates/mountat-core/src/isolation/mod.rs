//! Directory-relative mounting without touching the caller's working
//! directory.
//!
//! Both mechanisms move the `chdir` into a process nobody else shares:
//! [`fork`] pins the directory with an inherited handle, [`reexec`] starts a
//! fresh single-purpose instance of the current executable. Neither takes a
//! lock, and both block until the spawned process has terminated.

pub mod fork;
pub mod reexec;

use std::os::fd::BorrowedFd;
use std::path::Path;

use mountat_common::error::Result;
use mountat_common::types::MountRequest;

/// Where the relative paths of a request resolve from.
#[derive(Debug, Clone, Copy)]
pub enum WorkingContext<'a> {
    /// An open directory handle, used by the fork mechanism.
    Handle(BorrowedFd<'a>),
    /// A directory path, used by the re-exec mechanism.
    Path(&'a Path),
}

/// Mounts `request` relative to `context` using the matching mechanism.
///
/// A path context re-executes the current executable, which must dispatch
/// [`mountat_common::constants::HELPER_MARKER`] to [`reexec::helper_entry`].
///
/// # Errors
///
/// Returns the error of the selected mechanism.
pub fn mount_in(context: WorkingContext<'_>, request: &MountRequest) -> Result<()> {
    match context {
        WorkingContext::Handle(fd) => fork::mount_at(fd, request),
        WorkingContext::Path(dir) => reexec::ReexecMounter::new()?.mount_at(dir, request),
    }
}
