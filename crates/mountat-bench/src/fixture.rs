//! Overlay test fixtures.
//!
//! A fixture root looks like:
//!
//! ```text
//! <root>/target          merged mount point
//! <root>/work            overlay work dir
//! <root>/upper           writable upper layer
//! <root>/common/<i>      lower layer i, holding only commit-<i>
//! ```
//!
//! Lower layers are referenced relative to `common`, so the mount request
//! is only valid when issued from that directory.

use std::fs::File;
use std::path::{Path, PathBuf};

use mountat_common::constants::{FIXTURE_PREFIX, layer_file_content, layer_file_name};
use mountat_common::error::{MountatError, Result};
use mountat_common::types::MountRequest;
use mountat_core::filesystem::overlayfs::OverlayConfig;
use tempfile::TempDir;

/// Paths making up a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureLayout {
    /// Temporary root holding everything else.
    pub root_dir: PathBuf,
    /// Mount point.
    pub target_dir: PathBuf,
    /// Overlay work directory.
    pub work_dir: PathBuf,
    /// Overlay upper layer.
    pub upper_dir: PathBuf,
    /// Directory the lower layers are relative to.
    pub common_dir: PathBuf,
    /// Lower layer names relative to `common_dir`, layer 1 first.
    pub lower_dirs: Vec<String>,
}

/// A fixture on disk together with the request that mounts it.
///
/// Dropping the fixture removes the tree on a best-effort basis; call
/// [`OverlayFixture::cleanup`] to observe removal errors. The target must be
/// unmounted first.
#[derive(Debug)]
pub struct OverlayFixture {
    root: Option<TempDir>,
    layout: FixtureLayout,
    request: MountRequest,
}

impl OverlayFixture {
    /// Builds a fixture with `layers` lower layers under the system
    /// temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `layers` is zero or any directory or file cannot
    /// be created. Partially created trees are removed.
    pub fn build(layers: usize) -> Result<Self> {
        let tmp = std::env::temp_dir();
        Self::build_in(&tmp, layers)
    }

    /// Builds a fixture with `layers` lower layers under `parent`.
    ///
    /// # Errors
    ///
    /// See [`OverlayFixture::build`].
    pub fn build_in(parent: &Path, layers: usize) -> Result<Self> {
        if layers == 0 {
            return Err(MountatError::Config {
                message: "a fixture needs at least one lower layer".into(),
            });
        }

        let root = tempfile::Builder::new()
            .prefix(FIXTURE_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| MountatError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        let root_dir = root.path().to_path_buf();

        let target_dir = create_dir(&root_dir, "target")?;
        let work_dir = create_dir(&root_dir, "work")?;
        let upper_dir = create_dir(&root_dir, "upper")?;
        let common_dir = create_dir(&root_dir, "common")?;
        let lower_dirs = create_lower_layers(&common_dir, layers)?;

        let request = OverlayConfig {
            lower_dirs: lower_dirs.iter().map(PathBuf::from).collect(),
            upper_dir: upper_dir.clone(),
            work_dir: work_dir.clone(),
            merged_dir: target_dir.clone(),
        }
        .to_request()?;

        tracing::debug!(root = %root_dir.display(), layers, "fixture built");
        Ok(Self {
            root: Some(root),
            layout: FixtureLayout {
                root_dir,
                target_dir,
                work_dir,
                upper_dir,
                common_dir,
                lower_dirs,
            },
            request,
        })
    }

    /// Paths of this fixture.
    #[must_use]
    pub const fn layout(&self) -> &FixtureLayout {
        &self.layout
    }

    /// Overlay request whose lower layers are relative to `common_dir`.
    #[must_use]
    pub const fn request(&self) -> &MountRequest {
        &self.request
    }

    /// Number of lower layers.
    #[must_use]
    pub fn layers(&self) -> usize {
        self.layout.lower_dirs.len()
    }

    /// Opens a handle on the common directory for the fork mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened.
    pub fn open_common(&self) -> Result<File> {
        File::open(&self.layout.common_dir).map_err(|e| MountatError::Io {
            path: self.layout.common_dir.clone(),
            source: e,
        })
    }

    /// Recursively removes the fixture root. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be removed, typically because
    /// the target is still mounted.
    pub fn cleanup(&mut self) -> Result<()> {
        let Some(root) = self.root.take() else {
            return Ok(());
        };
        root.close().map_err(|e| MountatError::Io {
            path: self.layout.root_dir.clone(),
            source: e,
        })?;
        tracing::debug!(root = %self.layout.root_dir.display(), "fixture removed");
        Ok(())
    }
}

fn create_dir(parent: &Path, name: &str) -> Result<PathBuf> {
    let path = parent.join(name);
    std::fs::create_dir_all(&path).map_err(|e| MountatError::Io {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}

/// Creates `1..=layers` under `common`, each holding its `commit-<i>` file.
fn create_lower_layers(common: &Path, layers: usize) -> Result<Vec<String>> {
    (1..=layers)
        .map(|i| {
            let name = i.to_string();
            let dir = create_dir(common, &name)?;
            let file = dir.join(layer_file_name(i));
            std::fs::write(&file, layer_file_content(i)).map_err(|e| MountatError::Io {
                path: file,
                source: e,
            })?;
            Ok(name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_has_numbered_layers_with_one_file_each() {
        let parent = tempfile::tempdir().expect("tempdir");
        let fixture = OverlayFixture::build_in(parent.path(), 3).expect("build");
        let layout = fixture.layout();

        assert_eq!(layout.lower_dirs, vec!["1", "2", "3"]);
        for i in 1..=3 {
            let dir = layout.common_dir.join(i.to_string());
            let entries: Vec<_> = std::fs::read_dir(&dir).expect("read_dir").collect();
            assert_eq!(entries.len(), 1);
            let content = std::fs::read_to_string(dir.join(format!("commit-{i}"))).expect("read");
            assert_eq!(content, format!("Hi, I'm No.{i} Layer!"));
        }
        assert!(layout.target_dir.is_dir());
        assert!(layout.work_dir.is_dir());
        assert!(layout.upper_dir.is_dir());
    }

    #[test]
    fn root_uses_fixture_prefix() {
        let parent = tempfile::tempdir().expect("tempdir");
        let fixture = OverlayFixture::build_in(parent.path(), 1).expect("build");
        let name = fixture.layout().root_dir.file_name().expect("name");
        assert!(name.to_string_lossy().starts_with("fmountat-test-"));
    }

    #[test]
    fn request_lists_relative_lowers_in_order() {
        let parent = tempfile::tempdir().expect("tempdir");
        let fixture = OverlayFixture::build_in(parent.path(), 4).expect("build");
        let layout = fixture.layout();
        let expected = format!(
            "workdir={},upperdir={},lowerdir=1:2:3:4",
            layout.work_dir.display(),
            layout.upper_dir.display()
        );
        assert_eq!(fixture.request().data(), expected);
        assert_eq!(fixture.request().target(), layout.target_dir.to_string_lossy());
        assert_eq!(fixture.request().fs_type(), "overlay");
        assert_eq!(fixture.request().flags(), 0);
    }

    #[test]
    fn zero_layers_is_rejected() {
        let parent = tempfile::tempdir().expect("tempdir");
        assert!(OverlayFixture::build_in(parent.path(), 0).is_err());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let parent = tempfile::tempdir().expect("tempdir");
        let mut fixture = OverlayFixture::build_in(parent.path(), 2).expect("build");
        let root = fixture.layout().root_dir.clone();

        fixture.cleanup().expect("first cleanup");
        assert!(!root.exists());
        fixture.cleanup().expect("second cleanup");
    }

    #[test]
    fn failed_build_leaves_nothing_behind() {
        let parent = tempfile::tempdir().expect("tempdir");
        let missing = parent.path().join("absent");
        assert!(OverlayFixture::build_in(&missing, 2).is_err());
        assert_eq!(std::fs::read_dir(parent.path()).expect("read_dir").count(), 0);
    }

    #[test]
    fn common_handle_opens() {
        let parent = tempfile::tempdir().expect("tempdir");
        let fixture = OverlayFixture::build_in(parent.path(), 1).expect("build");
        assert!(fixture.open_common().is_ok());
    }
}
