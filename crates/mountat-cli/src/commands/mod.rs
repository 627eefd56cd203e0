//! CLI command definitions and dispatch.

pub mod bench;
pub mod helper;
pub mod mount;
pub mod verify;

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use mountat_bench::driver::Mechanism;
use mountat_common::constants::HELPER_MARKER;

/// mountat — mount relative to a directory without changing your own.
#[derive(Parser, Debug)]
#[command(name = "mountat", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Time mount/unmount cycles over overlay fixtures.
    Bench(bench::BenchArgs),
    /// Mount an overlay fixture and check every file of the merged view.
    Verify(verify::VerifyArgs),
    /// Perform one mount relative to a directory.
    Mount(mount::MountArgs),
    /// Internal: perform a single chdir-then-mount read from stdin.
    #[command(name = HELPER_MARKER, hide = true)]
    Helper(helper::HelperArgs),
}

impl Command {
    /// Whether this invocation is the re-exec helper.
    #[must_use]
    pub const fn is_helper(&self) -> bool {
        matches!(self, Self::Helper(_))
    }
}

/// Mount mechanism as accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismArg {
    /// chdir in this process, then mount (unsafe baseline).
    Direct,
    /// Forked child with an inherited directory handle.
    Fork,
    /// Fresh helper instance of this executable.
    Reexec,
}

impl From<MechanismArg> for Mechanism {
    fn from(arg: MechanismArg) -> Self {
        match arg {
            MechanismArg::Direct => Self::Direct,
            MechanismArg::Fork => Self::Fork,
            MechanismArg::Reexec => Self::Reexec,
        }
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Bench(args) => bench::execute(args).map(|()| ExitCode::SUCCESS),
        Command::Verify(args) => verify::execute(args).map(|()| ExitCode::SUCCESS),
        Command::Mount(args) => mount::execute(args).map(|()| ExitCode::SUCCESS),
        Command::Helper(args) => Ok(helper::execute(&args)),
    }
}
