//! Domain primitive types used across the mountat workspace.

use std::fmt;

use nix::mount::MsFlags;
use serde::{Deserialize, Serialize};

use crate::error::{MountatError, Result};

/// The five arguments of a `mount(2)` call.
///
/// Relative paths inside `data` (and `source`/`target`) resolve against
/// whatever working directory is current when the call is issued, which is
/// exactly what the isolation mechanisms control.
///
/// The serialized form is the wire record streamed to the re-exec helper:
/// `{"source":..,"target":..,"fsType":..,"flags":<integer>,"data":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MountRequest {
    source: String,
    target: String,
    fs_type: String,
    flags: u64,
    data: String,
}

impl MountRequest {
    /// Creates a new mount request.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        fs_type: impl Into<String>,
        flags: u64,
        data: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            fs_type: fs_type.into(),
            flags,
            data: data.into(),
        }
    }

    /// Mount source identifier.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Mount point.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Filesystem type.
    #[must_use]
    pub fn fs_type(&self) -> &str {
        &self.fs_type
    }

    /// Raw `MS_*` flag bitmask.
    #[must_use]
    pub const fn flags(&self) -> u64 {
        self.flags
    }

    /// Free-form, comma-separated filesystem options.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Converts the raw bitmask into kernel mount flags.
    ///
    /// Unknown bits are retained; the kernel is the authority on them.
    ///
    /// # Errors
    ///
    /// Returns an error if the bitmask does not fit the platform's
    /// `unsigned long`.
    pub fn ms_flags(&self) -> Result<MsFlags> {
        let bits = libc_ulong(self.flags)?;
        Ok(MsFlags::from_bits_retain(bits))
    }

    /// Checks that every field can be passed to the kernel as a C string
    /// and that the flags fit the platform word.
    ///
    /// # Errors
    ///
    /// Returns [`MountatError::InvalidRequest`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("source", &self.source),
            ("target", &self.target),
            ("fsType", &self.fs_type),
            ("data", &self.data),
        ] {
            if value.as_bytes().contains(&0) {
                return Err(MountatError::InvalidRequest {
                    message: format!("{field} contains an interior NUL byte"),
                });
            }
        }
        if self.target.is_empty() {
            return Err(MountatError::InvalidRequest {
                message: "target is empty".into(),
            });
        }
        let _ = self.ms_flags()?;
        Ok(())
    }
}

impl fmt::Display for MountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} type {} (flags {:#x})",
            self.source, self.target, self.fs_type, self.flags
        )
    }
}

fn libc_ulong(flags: u64) -> Result<nix::libc::c_ulong> {
    nix::libc::c_ulong::try_from(flags).map_err(|_| MountatError::InvalidRequest {
        message: format!("flags {flags:#x} exceed the platform word size"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay() -> MountRequest {
        MountRequest::new("overlay", "/mnt/target", "overlay", 0, "lowerdir=1:2")
    }

    #[test]
    fn wire_record_uses_camel_case_names() {
        let json = serde_json::to_value(overlay()).unwrap();
        assert_eq!(json["fsType"], "overlay");
        assert_eq!(json["flags"], 0);
        assert_eq!(json["data"], "lowerdir=1:2");
    }

    #[test]
    fn wire_record_rejects_non_numeric_flags() {
        let raw = r#"{"source":"overlay","target":"/t","fsType":"overlay","flags":"ro","data":""}"#;
        assert!(serde_json::from_str::<MountRequest>(raw).is_err());
    }

    #[test]
    fn wire_record_tolerates_whitespace() {
        let raw = "\n { \"source\" : \"s\", \"target\":\"t\",\n\"fsType\":\"f\", \"flags\": 1, \"data\":\"d\" }\n";
        let req: MountRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req, MountRequest::new("s", "t", "f", 1, "d"));
    }

    #[test]
    fn ms_flags_retains_bits() {
        let req = MountRequest::new("s", "t", "f", nix::libc::MS_RDONLY, "");
        assert!(req.ms_flags().unwrap().contains(MsFlags::MS_RDONLY));
    }

    #[test]
    fn validate_rejects_interior_nul() {
        let req = MountRequest::new("s", "t", "f", 0, "a\0b");
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("data"));
    }

    #[test]
    fn validate_rejects_empty_target() {
        assert!(MountRequest::new("s", "", "f", 0, "").validate().is_err());
    }

    #[test]
    fn validate_accepts_overlay_request() {
        assert!(overlay().validate().is_ok());
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(
            overlay().to_string(),
            "overlay on /mnt/target type overlay (flags 0x0)"
        );
    }
}
