//! Benchmark and verification driver.
//!
//! Each case builds a fresh fixture, runs mount/unmount cycles with one
//! mechanism, and tears the fixture down on every exit path. Cases run
//! sequentially; no two mounts are ever in flight against one fixture.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use mountat_common::config::BenchConfig;
use mountat_common::error::{MountatError, Result};
use mountat_common::types::MountRequest;
use mountat_core::filesystem::mount::{mount_request, unmount_with_retry};
use mountat_core::isolation::fork;
use mountat_core::isolation::reexec::ReexecMounter;
use mountat_core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::fixture::OverlayFixture;
use crate::verify::verify_mount;

/// How the directory-relative mount is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mechanism {
    /// `chdir` in the driver process itself, then `mount(2)`. Unsafe with
    /// concurrent threads; the baseline.
    Direct,
    /// Forked child with an inherited directory handle.
    Fork,
    /// Fresh helper instance of the current executable.
    Reexec,
}

impl Mechanism {
    /// Every mechanism, baseline first.
    pub const ALL: [Self; 3] = [Self::Direct, Self::Fork, Self::Reexec];

    /// Lowercase name used on the command line and in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Fork => "fork",
            Self::Reexec => "reexec",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Mechanism {
    type Err = MountatError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| MountatError::Config {
                message: format!("unknown mechanism {s:?}, expected direct, fork or reexec"),
            })
    }
}

/// Timing summary of one mechanism at one layer count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    /// Mechanism measured.
    pub mechanism: Mechanism,
    /// Number of lower layers.
    pub layers: usize,
    /// Completed mount/unmount cycles.
    pub iterations: u32,
    /// Mean mount duration in nanoseconds.
    pub mean_ns: u64,
    /// Fastest mount in nanoseconds.
    pub min_ns: u64,
    /// Slowest mount in nanoseconds.
    pub max_ns: u64,
}

impl CaseReport {
    fn from_samples(mechanism: Mechanism, layers: usize, samples: &[Duration]) -> Self {
        let nanos = |d: &Duration| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        let total: u64 = samples.iter().map(nanos).fold(0, u64::saturating_add);
        let count = u32::try_from(samples.len()).unwrap_or(u32::MAX);
        Self {
            mechanism,
            layers,
            iterations: count,
            mean_ns: total.checked_div(u64::from(count)).unwrap_or(0),
            min_ns: samples.iter().map(nanos).min().unwrap_or(0),
            max_ns: samples.iter().map(nanos).max().unwrap_or(0),
        }
    }

    /// Mean mount duration.
    #[must_use]
    pub const fn mean(&self) -> Duration {
        Duration::from_nanos(self.mean_ns)
    }
}

/// Results of a full benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    /// When the run started; serialized as RFC 3339.
    pub started_at: DateTime<Utc>,
    /// One entry per (mechanism, layer count), in execution order.
    pub cases: Vec<CaseReport>,
}

/// Fails unless the process runs with effective uid 0.
///
/// # Errors
///
/// Returns [`MountatError::Config`] when not running as root.
pub fn require_root() -> Result<()> {
    if nix::unistd::Uid::effective().is_root() {
        Ok(())
    } else {
        Err(MountatError::Config {
            message: "mounting overlay fixtures requires root".into(),
        })
    }
}

/// Runs `f` with the calling process's own working directory set to `dir`,
/// then restores the previous working directory.
///
/// Any other thread resolving relative paths meanwhile sees `dir`.
///
/// # Errors
///
/// Returns a chdir error, the error of `f`, or the restore error, in that
/// order of precedence.
pub fn with_working_dir<T>(dir: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let previous = std::env::current_dir().map_err(|e| MountatError::Io {
        path: ".".into(),
        source: e,
    })?;
    std::env::set_current_dir(dir).map_err(|e| MountatError::Chdir {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let outcome = f();
    let restored = std::env::set_current_dir(&previous).map_err(|e| MountatError::Chdir {
        path: previous,
        source: e,
    });
    let value = outcome?;
    restored.map(|()| value)
}

/// Mounts `request` after changing the calling process's own working
/// directory to `dir`, then restores the previous working directory.
///
/// This is the unsafe baseline the isolated mechanisms are measured against.
///
/// # Errors
///
/// Returns a chdir error, the mount error, or the restore error.
pub fn mount_with_chdir(dir: &Path, request: &MountRequest) -> Result<()> {
    with_working_dir(dir, || mount_request(request))
}

/// Runs benchmark cases and verification passes.
#[derive(Debug, Clone)]
pub struct Driver {
    unmount_policy: RetryPolicy,
    reexec: ReexecMounter,
    verify: bool,
}

impl Driver {
    /// Creates a driver from `config`, re-executing the current binary for
    /// the re-exec mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if the current executable cannot be located.
    pub fn new(config: &BenchConfig) -> Result<Self> {
        Ok(Self {
            unmount_policy: config.unmount.into(),
            reexec: ReexecMounter::new()?,
            verify: config.verify,
        })
    }

    /// Uses `reexec` as the helper launcher.
    #[must_use]
    pub fn with_reexec(mut self, reexec: ReexecMounter) -> Self {
        self.reexec = reexec;
        self
    }

    /// Mounts the fixture once with `mechanism`.
    ///
    /// `common` must be a handle on the fixture's common directory.
    ///
    /// # Errors
    ///
    /// Returns the mechanism's error.
    pub fn mount(&self, mechanism: Mechanism, fixture: &OverlayFixture, common: &File) -> Result<()> {
        self.with_context(mechanism, fixture, || {
            self.mount_in_context(mechanism, fixture, common)
        })
    }

    /// Runs `f` in the process state `mechanism` mounts from: the direct
    /// baseline gets the fixture's common directory as its working
    /// directory for the whole of `f`, the isolated mechanisms need nothing.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or a chdir error for the direct baseline.
    pub fn with_context<T>(
        &self,
        mechanism: Mechanism,
        fixture: &OverlayFixture,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        match mechanism {
            Mechanism::Direct => with_working_dir(&fixture.layout().common_dir, f),
            Mechanism::Fork | Mechanism::Reexec => f(),
        }
    }

    /// Issues one mount with `mechanism`, assuming it runs inside
    /// [`Driver::with_context`]. Only this call is timed by the driver.
    ///
    /// # Errors
    ///
    /// Returns the mechanism's error.
    pub fn mount_in_context(
        &self,
        mechanism: Mechanism,
        fixture: &OverlayFixture,
        common: &File,
    ) -> Result<()> {
        let request = fixture.request();
        match mechanism {
            Mechanism::Direct => mount_request(request),
            Mechanism::Fork => fork::mount_at(common, request),
            Mechanism::Reexec => self.reexec.mount_at(&fixture.layout().common_dir, request),
        }
    }

    /// Detach-unmounts the fixture's target with the configured policy.
    ///
    /// # Errors
    ///
    /// Returns [`MountatError::UnmountExhausted`] if the target stays mounted.
    pub fn unmount(&self, fixture: &OverlayFixture) -> Result<()> {
        let _ = unmount_with_retry(&fixture.layout().target_dir, &self.unmount_policy)?;
        Ok(())
    }

    /// Times `iterations` mount/unmount cycles over a fresh `layers`-layer
    /// fixture. Only the mount call is timed; the direct baseline enters the
    /// common directory once for the whole case.
    ///
    /// # Errors
    ///
    /// Returns the first fixture, mount, verification, unmount or cleanup
    /// error.
    pub fn run_case(&self, mechanism: Mechanism, layers: usize, iterations: u32) -> Result<CaseReport> {
        tracing::info!(%mechanism, layers, iterations, "running case");
        let mut fixture = OverlayFixture::build(layers)?;
        let outcome = self.with_context(mechanism, &fixture, || {
            self.cycles(mechanism, &fixture, iterations)
        });
        finish(outcome, &mut fixture).map(|samples| {
            let report = CaseReport::from_samples(mechanism, layers, &samples);
            tracing::info!(%mechanism, layers, mean_ns = report.mean_ns, "case finished");
            report
        })
    }

    /// Mounts a fresh `layers`-layer fixture once with `mechanism`, verifies
    /// the merged view, and tears everything down.
    ///
    /// # Errors
    ///
    /// Returns the first fixture, mount, verification, unmount or cleanup
    /// error.
    pub fn verify(&self, mechanism: Mechanism, layers: usize) -> Result<()> {
        tracing::info!(%mechanism, layers, "verifying");
        let mut fixture = OverlayFixture::build(layers)?;
        let outcome = self.with_context(mechanism, &fixture, || {
            self.open_and_cycle(mechanism, &fixture, true)
        });
        finish(outcome.map(|_| ()), &mut fixture)
    }

    /// Runs every `(mechanism, layers)` case of `config`.
    ///
    /// # Errors
    ///
    /// Stops at the first failing case.
    pub fn run_bench(&self, config: &BenchConfig, mechanisms: &[Mechanism]) -> Result<BenchReport> {
        config.validate()?;
        let started_at = Utc::now();
        let mut cases = Vec::with_capacity(mechanisms.len() * config.layers.len());
        for &mechanism in mechanisms {
            for &layers in &config.layers {
                cases.push(self.run_case(mechanism, layers, config.iterations)?);
            }
        }
        Ok(BenchReport { started_at, cases })
    }

    fn cycles(&self, mechanism: Mechanism, fixture: &OverlayFixture, iterations: u32) -> Result<Vec<Duration>> {
        (0..iterations)
            .map(|_| self.open_and_cycle(mechanism, fixture, self.verify))
            .collect()
    }

    fn open_and_cycle(&self, mechanism: Mechanism, fixture: &OverlayFixture, verify: bool) -> Result<Duration> {
        let common = fixture.open_common()?;
        let started = Instant::now();
        self.mount_in_context(mechanism, fixture, &common)?;
        let elapsed = started.elapsed();

        let verified = if verify {
            verify_mount(&fixture.layout().target_dir, fixture.layers())
        } else {
            Ok(())
        };
        self.unmount(fixture)?;
        verified.map(|()| elapsed)
    }
}

/// Removes the fixture and returns the case outcome; the outcome's error
/// takes precedence over a cleanup error.
fn finish<T>(outcome: Result<T>, fixture: &mut OverlayFixture) -> Result<T> {
    let cleaned = fixture.cleanup();
    match (outcome, cleaned) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), cleaned) => {
            if let Err(cleanup_err) = cleaned {
                tracing::warn!(error = %cleanup_err, "fixture cleanup failed after error");
            }
            Err(e)
        }
    }
}
