//! Fork-isolated mount.
//!
//! The child inherits an open directory handle, `fchdir`s to it and issues
//! `mount(2)`. Only async-signal-safe calls run between `fork(2)` and
//! `_exit(2)`: every C string is built in the parent beforehand, and
//! failures are reported as a fixed-size `(stage, errno)` record over a
//! close-on-exec pipe.

use std::ffi::CString;
use std::io::Read;
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};

use mountat_common::error::{MountatError, Result};
use mountat_common::types::MountRequest;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::mount::{MsFlags, mount};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork, pipe2};

const REPORT_LEN: usize = 5;

/// Syscall inside the child that a failure report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Stage {
    Fchdir = 1,
    Mount = 2,
}

impl Stage {
    const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Fchdir),
            2 => Some(Self::Mount),
            _ => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Fchdir => "fchdir",
            Self::Mount => "mount",
        }
    }
}

/// Mount arguments converted before forking.
struct MountArgs {
    source: CString,
    target: CString,
    fs_type: CString,
    flags: MsFlags,
    data: CString,
}

impl MountArgs {
    fn new(request: &MountRequest) -> Result<Self> {
        request.validate()?;
        Ok(Self {
            source: c_string("source", request.source())?,
            target: c_string("target", request.target())?,
            fs_type: c_string("fsType", request.fs_type())?,
            flags: request.ms_flags()?,
            data: c_string("data", request.data())?,
        })
    }
}

fn c_string(field: &str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| MountatError::InvalidRequest {
        message: format!("{field} contains an interior NUL byte"),
    })
}

/// Mounts `request` from a forked child whose working directory is `dir`.
///
/// Relative paths in the request resolve against `dir`. The handle pins the
/// directory itself, so renames of its ancestors during the call do not
/// change what the request refers to. The caller's working directory is
/// never read or written.
///
/// # Errors
///
/// Returns [`MountatError::Process`] if `pipe`, `fork` or `waitpid` fail,
/// [`MountatError::ChildFailed`] with the stage and errno reported by the
/// child, or [`MountatError::ChildTerminated`] if the child died without a
/// report.
pub fn mount_at<Fd: AsFd>(dir: Fd, request: &MountRequest) -> Result<()> {
    let args = MountArgs::new(request)?;
    let dir_fd = dir.as_fd().as_raw_fd();

    let (reader, writer) = pipe2(OFlag::O_CLOEXEC).map_err(|e| MountatError::Process {
        stage: "pipe",
        source: e,
    })?;

    // SAFETY: the child only calls fchdir, mount, write and _exit on data
    // prepared before the fork, all of which are async-signal-safe.
    let forked = unsafe { fork() }.map_err(|e| MountatError::Process {
        stage: "fork",
        source: e,
    })?;

    match forked {
        ForkResult::Child => {
            drop(reader);
            run_child(dir_fd, &args, &writer)
        }
        ForkResult::Parent { child } => {
            drop(writer);
            tracing::debug!(pid = child.as_raw(), target = request.target(), "forked mount child");
            let report = read_report(reader);
            let status = wait_for(child)?;
            interpret(&report, status)
        }
    }
}

fn run_child(dir_fd: RawFd, args: &MountArgs, report: &OwnedFd) -> ! {
    // SAFETY: dir_fd was borrowed from a live handle in the parent and is
    // inherited open by the child.
    if unsafe { libc::fchdir(dir_fd) } != 0 {
        fail_child(report, Stage::Fchdir, Errno::last());
    }
    if let Err(e) = mount(
        Some(args.source.as_c_str()),
        args.target.as_c_str(),
        Some(args.fs_type.as_c_str()),
        args.flags,
        Some(args.data.as_c_str()),
    ) {
        fail_child(report, Stage::Mount, e);
    }
    // SAFETY: _exit skips atexit handlers and stdio flushing that belong to
    // the parent.
    unsafe { libc::_exit(0) }
}

fn fail_child(report: &OwnedFd, stage: Stage, errno: Errno) -> ! {
    let mut record = [0_u8; REPORT_LEN];
    record[0] = stage as u8;
    record[1..].copy_from_slice(&(errno as i32).to_ne_bytes());
    let _ = nix::unistd::write(report, &record);
    // SAFETY: see run_child.
    unsafe { libc::_exit(1) }
}

/// Reads whatever the child reported; an empty buffer means no report.
fn read_report(reader: OwnedFd) -> Vec<u8> {
    let mut report = Vec::with_capacity(REPORT_LEN);
    let mut file = std::fs::File::from(reader);
    if let Err(e) = file.read_to_end(&mut report) {
        tracing::warn!(error = %e, "reading fork child report failed");
    }
    report
}

fn wait_for(child: Pid) -> Result<WaitStatus> {
    loop {
        match waitpid(child, None) {
            Err(Errno::EINTR) => {}
            other => {
                return other.map_err(|e| MountatError::Process {
                    stage: "waitpid",
                    source: e,
                });
            }
        }
    }
}

fn interpret(report: &[u8], status: WaitStatus) -> Result<()> {
    if let Some((stage, errno)) = decode_report(report) {
        return Err(MountatError::ChildFailed {
            stage: stage.as_str(),
            source: errno,
        });
    }
    match status {
        WaitStatus::Exited(_, 0) => Ok(()),
        other => Err(MountatError::ChildTerminated {
            status: format!("{other:?}"),
        }),
    }
}

fn decode_report(report: &[u8]) -> Option<(Stage, Errno)> {
    let record: &[u8; REPORT_LEN] = report.try_into().ok()?;
    let stage = Stage::from_byte(record[0])?;
    let raw = i32::from_ne_bytes([record[1], record[2], record[3], record[4]]);
    Some((stage, Errno::from_raw(raw)))
}
