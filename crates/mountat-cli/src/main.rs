//! # mountat — directory-relative mounts
//!
//! Mounts relative to a directory without touching the caller's working
//! directory, and benchmarks the mechanisms that make this possible.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Helper mode must stay silent on success.
    if !cli.command.is_helper() {
        init_tracing(cli.log_json);
    }

    commands::execute(cli)
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
