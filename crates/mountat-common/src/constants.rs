//! System-wide constants and naming contracts.

/// Internal subcommand that switches a freshly launched executable into
/// helper mode.
pub const HELPER_MARKER: &str = "__mountat-helper";

/// Filesystem type used by the overlay fixtures.
pub const OVERLAY_FSTYPE: &str = "overlay";

/// Mount source used by the overlay fixtures.
pub const OVERLAY_SOURCE: &str = "overlay";

/// Prefix of the temporary fixture root directory.
pub const FIXTURE_PREFIX: &str = "fmountat-test-";

/// Prefix of the single file stored in each lower layer.
pub const LAYER_FILE_PREFIX: &str = "commit-";

/// Layer counts exercised by a default benchmark run.
pub const DEFAULT_LAYER_COUNTS: [usize; 4] = [16, 32, 64, 128];

/// Mount/unmount cycles per benchmark case.
pub const DEFAULT_ITERATIONS: u32 = 10;

/// Upper bound on detach-unmount attempts.
pub const UNMOUNT_MAX_ATTEMPTS: u32 = 50;

/// Delay between detach-unmount attempts in milliseconds.
pub const UNMOUNT_INTERVAL_MS: u64 = 50;

/// Returns the file name stored in lower layer `index`.
#[must_use]
pub fn layer_file_name(index: usize) -> String {
    format!("{LAYER_FILE_PREFIX}{index}")
}

/// Returns the content of the file stored in lower layer `index`.
#[must_use]
pub fn layer_file_content(index: usize) -> String {
    format!("Hi, I'm No.{index} Layer!")
}

/// Parses the layer index out of a `commit-<i>` file name.
#[must_use]
pub fn parse_layer_file_name(name: &str) -> Option<usize> {
    name.strip_prefix(LAYER_FILE_PREFIX)?
        .parse()
        .ok()
        .filter(|i| *i > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_naming_contract() {
        assert_eq!(layer_file_name(7), "commit-7");
        assert_eq!(layer_file_content(7), "Hi, I'm No.7 Layer!");
    }

    #[test]
    fn parse_accepts_generated_names() {
        assert_eq!(parse_layer_file_name(&layer_file_name(42)), Some(42));
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert_eq!(parse_layer_file_name("commit-"), None);
        assert_eq!(parse_layer_file_name("commit-x"), None);
        assert_eq!(parse_layer_file_name("commit-0"), None);
        assert_eq!(parse_layer_file_name("layer-3"), None);
    }
}
