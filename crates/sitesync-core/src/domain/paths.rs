//! `/`-delimited provider path helpers
//!
//! Provider paths are plain strings regardless of the host platform. A
//! target path may name a file (its last component has an extension) or a
//! folder, in which case the file name is taken from the source.

use std::path::{Path, PathBuf};

/// Strips trailing slashes, keeping a lone `/`
pub fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Last component of `path`
pub fn file_name_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Everything before the last component of `path`
///
/// `"/a/b"` → `"/a"`, `"/a"` → `"/"`, `"a"` → `""`.
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => {
            let head = &path[..=pos];
            trim_trailing_slash(head)
        }
        None => "",
    }
}

/// True when the last component of `path` has a file extension.
///
/// Leading dots do not count, so `.config` has no extension.
pub fn has_extension(path: &str) -> bool {
    let name = file_name_of(path).trim_start_matches('.');
    name.rfind('.').is_some()
}

/// Joins a folder and a name with exactly one separator
pub fn join(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else if folder.ends_with('/') {
        format!("{}{}", folder, name)
    } else {
        format!("{}/{}", folder, name)
    }
}

/// Splits a target path into `(folder, file name)`.
///
/// When `path` does not end with a file name, it is the folder and the name
/// is `fallback_name` (usually the source file name).
pub fn split_target(path: &str, fallback_name: &str) -> (String, String) {
    if has_extension(path) {
        (
            parent_of(path).to_string(),
            file_name_of(path).to_string(),
        )
    } else {
        (
            trim_trailing_slash(path).to_string(),
            fallback_name.to_string(),
        )
    }
}

/// Local counterpart of [`split_target`]: `local` itself when it names a
/// file, otherwise `local/fallback_name`
pub fn local_target(local: &Path, fallback_name: &str) -> PathBuf {
    if local.extension().is_some() {
        local.to_path_buf()
    } else {
        local.join(fallback_name)
    }
}
