//! `mountat bench` — Time mount/unmount cycles over overlay fixtures.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use mountat_bench::driver::{Driver, Mechanism, require_root};
use mountat_common::config::BenchConfig;

use super::MechanismArg;
use crate::output;

/// Arguments for the `bench` command.
#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Mechanisms to measure (default: all).
    #[arg(short, long = "mechanism", value_enum)]
    pub mechanisms: Vec<MechanismArg>,

    /// Lower-layer counts, comma separated.
    #[arg(short, long, value_delimiter = ',')]
    pub layers: Vec<usize>,

    /// Mount/unmount cycles per case.
    #[arg(short = 'n', long)]
    pub iterations: Option<u32>,

    /// JSON configuration file; flags override its values.
    #[arg(short, long, env = "MOUNTAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verify the merged view on every cycle.
    #[arg(long)]
    pub verify: bool,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `bench` command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the process is not
/// root, or any case fails.
pub fn execute(args: BenchArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    require_root()?;

    let mechanisms = resolve_mechanisms(&args.mechanisms);
    let driver = Driver::new(&config)?;
    let report = driver.run_bench(&config, &mechanisms)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", output::format_report(&report));
    }
    Ok(())
}

fn resolve_config(args: &BenchArgs) -> anyhow::Result<BenchConfig> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BenchConfig::default(),
    };
    if !args.layers.is_empty() {
        config.layers.clone_from(&args.layers);
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    config.verify |= args.verify;
    config.validate()?;
    Ok(config)
}

fn resolve_mechanisms(args: &[MechanismArg]) -> Vec<Mechanism> {
    if args.is_empty() {
        Mechanism::ALL.to_vec()
    } else {
        args.iter().copied().map(Mechanism::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> BenchArgs {
        BenchArgs {
            mechanisms: Vec::new(),
            layers: Vec::new(),
            iterations: None,
            config: None,
            verify: false,
            json: false,
        }
    }

    #[test]
    fn defaults_measure_every_mechanism() {
        assert_eq!(resolve_mechanisms(&[]), Mechanism::ALL.to_vec());
        assert_eq!(resolve_mechanisms(&[MechanismArg::Fork]), vec![Mechanism::Fork]);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");
        std::fs::write(&path, r#"{"layers":[4,8],"iterations":3}"#).unwrap();

        let config = resolve_config(&BenchArgs {
            config: Some(path),
            layers: vec![2],
            ..args()
        })
        .unwrap();
        assert_eq!(config.layers, vec![2]);
        assert_eq!(config.iterations, 3);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let result = resolve_config(&BenchArgs {
            iterations: Some(0),
            ..args()
        });
        assert!(result.is_err());
    }
}
