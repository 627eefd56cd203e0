//! Unified error types for the mountat workspace.
//!
//! Every variant names the stage that failed and carries the underlying
//! error, so a caller can tell a crashed helper apart from a rejected mount.

use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MountatError {
    /// An I/O operation on the filesystem failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A mount request cannot be handed to the kernel.
    #[error("invalid mount request: {message}")]
    InvalidRequest {
        /// Description of the offending field.
        message: String,
    },

    /// A direct `mount(2)` call was rejected by the kernel.
    #[error("mount on {target} failed: {source}")]
    Mount {
        /// Mount point that was requested.
        target: String,
        /// Raw kernel error.
        source: Errno,
    },

    /// Changing the working directory failed.
    #[error("chdir to {path} failed: {source}")]
    Chdir {
        /// Directory that could not be entered.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A process-level syscall in the fork path failed in the parent.
    #[error("{stage} failed: {source}")]
    Process {
        /// Syscall that failed (`pipe`, `fork`, `waitpid`).
        stage: &'static str,
        /// Raw kernel error.
        source: Errno,
    },

    /// The forked child reported a failing syscall.
    #[error("forked child failed at {stage}: {source}")]
    ChildFailed {
        /// Syscall that failed inside the child (`fchdir` or `mount`).
        stage: &'static str,
        /// Raw kernel error reported by the child.
        source: Errno,
    },

    /// The forked child terminated without a report and without success.
    #[error("forked child terminated abnormally: {status}")]
    ChildTerminated {
        /// Human-readable wait status.
        status: String,
    },

    /// A pipe or process operation in the re-exec client failed.
    #[error("helper {stage} failed: {source}")]
    Channel {
        /// Client stage that failed (`stdin pipe`, `spawn`, `write`, `wait`).
        stage: &'static str,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The mount request could not be serialized for the helper.
    #[error("encoding mount request failed: {source}")]
    Encode {
        /// Underlying serialization error.
        source: serde_json::Error,
    },

    /// The helper could not decode the mount request from its input.
    #[error("decoding mount request failed: {source}")]
    Decode {
        /// Underlying deserialization error.
        source: serde_json::Error,
    },

    /// The re-exec helper exited unsuccessfully.
    #[error("helper exited with {status}: output: {output}")]
    HelperFailed {
        /// Human-readable exit status.
        status: String,
        /// Combined stdout and stderr of the helper.
        output: String,
    },

    /// Detach-unmount did not converge within the retry bound.
    #[error("failed to unmount {target} after {attempts} attempts: {source}")]
    UnmountExhausted {
        /// Mount point that stayed mounted.
        target: PathBuf,
        /// Number of attempts made.
        attempts: u32,
        /// Last error returned by `umount2(2)`.
        source: Errno,
    },

    /// A mounted view did not match the fixture it was built from.
    #[error("verification failed at {path}: {message}")]
    Verification {
        /// Entry that failed verification.
        path: PathBuf,
        /// What was expected versus what was found.
        message: String,
    },

    /// Serialization or deserialization of configuration or reports failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MountatError>;
