//! `mountat verify` — Mount an overlay fixture and check the merged view.

use clap::Args;
use mountat_bench::driver::{Driver, Mechanism, require_root};
use mountat_common::config::BenchConfig;

use super::MechanismArg;

/// Arguments for the `verify` command.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Mechanisms to verify (default: fork and reexec).
    #[arg(short, long = "mechanism", value_enum)]
    pub mechanisms: Vec<MechanismArg>,

    /// Number of lower layers in the fixture.
    #[arg(short, long, default_value_t = 10)]
    pub layers: usize,
}

/// Executes the `verify` command.
///
/// # Errors
///
/// Returns an error if the process is not root or any mechanism produces
/// a wrong merged view.
pub fn execute(args: VerifyArgs) -> anyhow::Result<()> {
    require_root()?;
    let driver = Driver::new(&BenchConfig::default())?;

    let mechanisms: Vec<Mechanism> = if args.mechanisms.is_empty() {
        vec![Mechanism::Fork, Mechanism::Reexec]
    } else {
        args.mechanisms.iter().copied().map(Mechanism::from).collect()
    };

    for mechanism in mechanisms {
        driver.verify(mechanism, args.layers)?;
        println!("{mechanism}: {} layers verified", args.layers);
    }
    Ok(())
}
