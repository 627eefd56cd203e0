//! # mountat-core
//!
//! Mounting relative to a directory without ever changing the calling
//! process's working directory.
//!
//! `mount(2)` takes paths, not directory handles, and the working directory
//! is shared by every thread of a process. This crate scopes the required
//! `chdir` to a disposable process instead:
//! - **Fork isolation**: a forked child `fchdir`s to an inherited directory
//!   handle and mounts.
//! - **Re-exec isolation**: a fresh instance of the current executable,
//!   started in helper mode, receives the request over a pipe.
//! - **Filesystem**: the direct (unsafe baseline) mount, detach-unmount with
//!   bounded retry, and overlay option construction.
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! `// SAFETY:` documentation.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod filesystem;
pub mod isolation;
pub mod retry;
