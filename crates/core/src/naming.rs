//! Output file naming convention.
//!
//! Artifacts land in the output directory as `{step}_{ordinal}_{name}`;
//! preserved originals as `-original_0_{name}`. Every character outside
//! `[A-Za-z0-9._-]` is replaced with `-`.
//!
//! ```
//! use hotfolder_core::naming::{artifact_file_name, original_file_name};
//!
//! assert_eq!(artifact_file_name("resize", 0, "a.jpg"), "resize_0_a.jpg");
//! assert_eq!(artifact_file_name("resize", 2, "my cat.jpg"), "resize_2_my-cat.jpg");
//! assert_eq!(original_file_name("a.jpg"), "-original_0_a.jpg");
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// Prefix given to a preserved original in the output directory.
pub const ORIGINAL_PREFIX: &str = "-original_0_";

static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\-_.]").expect("valid regex"));

/// Replace every character outside the allow-list with `-`.
pub fn sanitize(name: &str) -> String {
    DISALLOWED_RE.replace_all(name, "-").into_owned()
}

/// File name for the `ordinal`-th artifact of `step`.
pub fn artifact_file_name(step: &str, ordinal: usize, name: &str) -> String {
    sanitize(&format!("{step}_{ordinal}_{name}"))
}

/// File name a preserved original is renamed to.
///
/// `base_name` is the final path component of the input file.
pub fn original_file_name(base_name: &str) -> String {
    format!("{ORIGINAL_PREFIX}{}", sanitize(base_name))
}
