//! Re-exec-isolated mount.
//!
//! The client launches `<exe> __mountat-helper -- <dir>`, streams the request as
//! one JSON record on the helper's stdin and closes it. The helper, a fresh
//! process with nothing else running, decodes the record, `chdir`s into
//! `<dir>` and issues `mount(2)`.
//!
//! The executable must route the marker to [`helper_entry`] before doing
//! anything else; the `mountat` CLI does so with a hidden subcommand.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode, Output, Stdio};

use mountat_common::constants::HELPER_MARKER;
use mountat_common::error::{MountatError, Result};
use mountat_common::types::MountRequest;

use crate::filesystem::mount::mount_request;

/// Client side of the re-exec mechanism.
#[derive(Debug, Clone)]
pub struct ReexecMounter {
    executable: PathBuf,
}

impl ReexecMounter {
    /// Creates a client that re-executes the running binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the path of the current executable is unknown.
    pub fn new() -> Result<Self> {
        let executable = std::env::current_exe().map_err(|e| MountatError::Channel {
            stage: "locate executable",
            source: e,
        })?;
        Ok(Self { executable })
    }

    /// Creates a client that launches `executable` as the helper.
    #[must_use]
    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Executable launched in helper mode.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Mounts `request` from a helper process whose working directory is
    /// `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MountatError::Encode`] if the request cannot be serialized,
    /// [`MountatError::Channel`] naming the failing client stage, or
    /// [`MountatError::HelperFailed`] with the helper's exit status and
    /// combined output.
    pub fn mount_at(&self, dir: &Path, request: &MountRequest) -> Result<()> {
        request.validate()?;
        let payload = serde_json::to_vec(request).map_err(|e| MountatError::Encode { source: e })?;
        self.send_record(dir, &payload)?;
        tracing::debug!(
            executable = %self.executable().display(),
            dir = %dir.display(),
            target = request.target(),
            "helper mounted"
        );
        Ok(())
    }

    /// Runs one helper with an already encoded record on its stdin.
    ///
    /// # Errors
    ///
    /// See [`ReexecMounter::mount_at`].
    pub fn send_record(&self, dir: &Path, payload: &[u8]) -> Result<()> {
        let mut child = Command::new(&self.executable)
            .arg(HELPER_MARKER)
            .arg("--")
            .arg(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MountatError::Channel {
                stage: "spawn",
                source: e,
            })?;

        let Some(mut stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MountatError::Channel {
                stage: "stdin pipe",
                source: std::io::Error::other("helper stdin was not captured"),
            });
        };

        let written = stdin.write_all(payload);
        drop(stdin);

        let output = child.wait_with_output().map_err(|e| MountatError::Channel {
            stage: "wait",
            source: e,
        })?;

        if !output.status.success() {
            return Err(MountatError::HelperFailed {
                status: output.status.to_string(),
                output: combined_output(&output),
            });
        }
        written.map_err(|e| MountatError::Channel {
            stage: "write",
            source: e,
        })
    }
}

fn combined_output(output: &Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

/// Decodes exactly one mount record from `input`, draining it to the end.
///
/// Anything but whitespace after the record is rejected.
///
/// # Errors
///
/// Returns [`MountatError::Decode`] for malformed or trailing input.
pub fn decode_request<R: Read>(input: R) -> Result<MountRequest> {
    serde_json::from_reader(input).map_err(|e| MountatError::Decode { source: e })
}

/// Helper role: decode the record, `chdir` into `dir`, mount.
///
/// Must only run in a process dedicated to this single call, because it
/// changes the process-wide working directory.
///
/// # Errors
///
/// Returns a decode, chdir or mount error. Nothing is mounted if decoding
/// fails.
pub fn run_helper<R: Read>(dir: &Path, input: R) -> Result<()> {
    let request = decode_request(input)?;
    std::env::set_current_dir(dir).map_err(|e| MountatError::Chdir {
        path: dir.to_path_buf(),
        source: e,
    })?;
    mount_request(&request)
}

/// Process entry point of helper mode.
///
/// Silent on success. On failure the error goes to stderr and the exit
/// status is 1.
#[allow(clippy::print_stderr)]
pub fn helper_entry(dir: &Path) -> ExitCode {
    match run_helper(dir, std::io::stdin().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprint!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns the helper directory if `args` (including `argv[0]`) select
/// helper mode, for entry points that do not parse arguments with clap.
///
/// An optional `--` between the marker and the directory is skipped, so a
/// directory starting with `-` is never taken for a flag.
#[must_use]
pub fn helper_dir_from_args<I>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter().skip(1);
    if args.next()? != HELPER_MARKER {
        return None;
    }
    let mut dir = args.next()?;
    if dir == "--" {
        dir = args.next()?;
    }
    if args.next().is_some() {
        return None;
    }
    Some(PathBuf::from(dir))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn decode_accepts_client_encoding() {
        let request = MountRequest::new("overlay", "/t", "overlay", 0, "lowerdir=1:2");
        let bytes = serde_json::to_vec(&request).unwrap();
        assert_eq!(decode_request(Cursor::new(bytes)).unwrap(), request);
    }

    #[test]
    fn decode_rejects_trailing_record() {
        let raw = r#"{"source":"s","target":"t","fsType":"f","flags":0,"data":""} {}"#;
        let err = decode_request(Cursor::new(raw)).unwrap_err();
        assert!(matches!(err, MountatError::Decode { .. }));
    }

    #[test]
    fn malformed_flags_fail_before_chdir() {
        let before = std::env::current_dir().unwrap();
        let raw = r#"{"source":"s","target":"t","fsType":"f","flags":"ro","data":""}"#;
        let err = run_helper(Path::new("/nonexistent-helper-dir"), Cursor::new(raw)).unwrap_err();
        assert!(matches!(err, MountatError::Decode { .. }));
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn marker_with_one_directory_selects_helper_mode() {
        assert_eq!(
            helper_dir_from_args(args(&["mountat", HELPER_MARKER, "/srv/common"])),
            Some(PathBuf::from("/srv/common"))
        );
    }

    #[test]
    fn separator_before_dash_directory_is_skipped() {
        assert_eq!(
            helper_dir_from_args(args(&["mountat", HELPER_MARKER, "--", "-layers"])),
            Some(PathBuf::from("-layers"))
        );
        assert_eq!(
            helper_dir_from_args(args(&["mountat", HELPER_MARKER, "--"])),
            None
        );
    }

    #[test]
    fn other_invocations_are_not_helper_mode() {
        assert_eq!(helper_dir_from_args(args(&["mountat", "bench"])), None);
        assert_eq!(helper_dir_from_args(args(&["mountat", HELPER_MARKER])), None);
        assert_eq!(
            helper_dir_from_args(args(&["mountat", HELPER_MARKER, "a", "b"])),
            None
        );
    }

    #[test]
    fn missing_executable_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let mounter = ReexecMounter::with_executable(dir.path().join("no-such-binary"));
        let request = MountRequest::new("overlay", "t", "overlay", 0, "");
        let err = mounter.mount_at(dir.path(), &request).unwrap_err();
        assert!(matches!(err, MountatError::Channel { stage: "spawn", .. }));
    }

    #[test]
    fn failing_helper_reports_status_and_output() {
        let dir = tempfile::tempdir().unwrap();
        // sh treats the marker as a script path it cannot open.
        let mounter = ReexecMounter::with_executable("/bin/sh");
        let request = MountRequest::new("overlay", "t", "overlay", 0, "");
        let err = mounter.mount_at(dir.path(), &request).unwrap_err();
        match err {
            MountatError::HelperFailed { status, output } => {
                assert!(!status.is_empty());
                assert!(output.contains(HELPER_MARKER));
            }
            other => unreachable!("unexpected error: {other}"),
        }
    }
}
