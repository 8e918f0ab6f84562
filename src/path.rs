//! Path manipulation utilities for subsync
//!
//! Manifest paths are always stored with `/` separators, relative to the
//! directory holding the manifest. Normalization never lets a path escape
//! that directory: `..` segments that would climb above the root are dropped.

/// Normalize a path to a clean, relative, `/`-separated form.
///
/// Leading slashes, `.` segments, empty segments and `..` segments that would
/// climb above the root are removed. The empty path normalizes to `"."`.
///
/// ```
/// use subsync::path::clean_relative_path;
///
/// assert_eq!(clean_relative_path("/a/./b/"), "a/b");
/// assert_eq!(clean_relative_path("../../a/../b"), "b");
/// assert_eq!(clean_relative_path(""), ".");
/// ```
pub fn clean_relative_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}

/// Split a normalized path into its segments.
///
/// The root path `"."` has no segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}
