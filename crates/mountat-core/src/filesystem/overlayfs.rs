//! `OverlayFS` option construction.
//!
//! Stacks read-only lower layers under a single writable upper layer. Lower
//! layers are usually given relative to a common directory so the option
//! string stays short even with many layers; the mount must then be issued
//! from that directory.

use std::path::{Path, PathBuf};

use mountat_common::constants::{OVERLAY_FSTYPE, OVERLAY_SOURCE};
use mountat_common::error::{MountatError, Result};
use mountat_common::types::MountRequest;

/// Configuration for an `OverlayFS` mount.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Read-only lower layers, highest priority first.
    pub lower_dirs: Vec<PathBuf>,
    /// Writable upper layer directory.
    pub upper_dir: PathBuf,
    /// Work directory required by `OverlayFS` for copy-up.
    pub work_dir: PathBuf,
    /// Final merged mount point.
    pub merged_dir: PathBuf,
}

impl OverlayConfig {
    /// Builds the option string
    /// `workdir=<work>,upperdir=<upper>,lowerdir=<l1>:<l2>:...`.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no lower layers or a path contains a
    /// character that would break the option syntax.
    pub fn options(&self) -> Result<String> {
        if self.lower_dirs.is_empty() {
            return Err(MountatError::Config {
                message: "overlay requires at least one lower layer".into(),
            });
        }
        let work = option_path(&self.work_dir)?;
        let upper = option_path(&self.upper_dir)?;
        let lowers = self
            .lower_dirs
            .iter()
            .map(PathBuf::as_path)
            .map(option_path)
            .collect::<Result<Vec<_>>>()?
            .join(":");
        Ok(format!("workdir={work},upperdir={upper},lowerdir={lowers}"))
    }

    /// Builds the complete overlay mount request for `merged_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if [`OverlayConfig::options`] fails.
    pub fn to_request(&self) -> Result<MountRequest> {
        let data = self.options()?;
        Ok(MountRequest::new(
            OVERLAY_SOURCE,
            self.merged_dir.to_string_lossy(),
            OVERLAY_FSTYPE,
            0,
            data,
        ))
    }
}

fn option_path(path: &Path) -> Result<String> {
    let rendered = path.to_str().ok_or_else(|| MountatError::Config {
        message: format!("overlay path is not valid UTF-8: {}", path.display()),
    })?;
    if rendered.is_empty() || rendered.contains([',', ':']) {
        return Err(MountatError::Config {
            message: format!("overlay path cannot be used in mount options: {rendered:?}"),
        });
    }
    Ok(rendered.to_owned())
}
