//! Verification of a mounted overlay fixture.

use std::collections::BTreeSet;
use std::path::Path;

use mountat_common::constants::{layer_file_content, parse_layer_file_name};
use mountat_common::error::{MountatError, Result};

/// Checks the merged view at `target` against a fixture of `layers` layers.
///
/// The view must be flat: exactly one `commit-<i>` file per layer, each
/// with the content written for layer `i`, and no directories. A mismatch
/// points at wrong layer ordering or a broken option string.
///
/// # Errors
///
/// Returns [`MountatError::Verification`] describing the first mismatch, or
/// [`MountatError::Io`] if the view cannot be read.
pub fn verify_mount(target: &Path, layers: usize) -> Result<()> {
    let io_err = |path: &Path, e| MountatError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    let mut seen = BTreeSet::new();
    for entry in std::fs::read_dir(target).map_err(|e| io_err(target, e))? {
        let entry = entry.map_err(|e| io_err(target, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            return Err(mismatch(&path, "unexpected directory in the mounted view".into()));
        }

        let name = entry.file_name();
        let index = name
            .to_str()
            .and_then(parse_layer_file_name)
            .ok_or_else(|| mismatch(&path, "expected a file named commit-<i>".into()))?;
        if index > layers {
            return Err(mismatch(
                &path,
                format!("layer {index} exceeds the {layers} layers of the fixture"),
            ));
        }

        let got = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let expected = layer_file_content(index);
        if got != expected {
            return Err(mismatch(
                &path,
                format!("expected content {expected:?}, got {got:?}"),
            ));
        }
        let _ = seen.insert(index);
    }

    if seen.len() != layers {
        return Err(mismatch(
            target,
            format!("expected {layers} files, found {}", seen.len()),
        ));
    }
    tracing::debug!(target = %target.display(), layers, "mounted view verified");
    Ok(())
}

fn mismatch(path: &Path, message: String) -> MountatError {
    MountatError::Verification {
        path: path.to_path_buf(),
        message,
    }
}
