//! `mountat __mountat-helper` — helper role of the re-exec mechanism.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use mountat_core::isolation::reexec::helper_entry;

/// Arguments for the helper.
#[derive(Args, Debug)]
pub struct HelperArgs {
    /// Directory to change into before mounting.
    #[arg(allow_hyphen_values = true)]
    pub dir: PathBuf,
}

/// Reads one mount record from stdin, changes into `dir` and mounts.
///
/// Exits 0 silently on success; on failure writes the error to stderr and
/// exits 1.
pub fn execute(args: &HelperArgs) -> ExitCode {
    helper_entry(&args.dir)
}
