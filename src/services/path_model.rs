//! Conversions between flat object keys and the hierarchical paths shown in
//! the manager tree.
//!
//! A key ending in [`DELIMITER`] is a directory marker; every other key is a
//! file. The root directory is the empty prefix; `/` and `.` are accepted as
//! aliases and normalized to it before any store query.

pub const DELIMITER: char = '/';

/// True iff `key` names a directory marker.
pub fn is_directory_key(key: &str) -> bool {
    key.ends_with(DELIMITER)
}

/// True iff `dir` denotes the root of the source.
pub fn is_root(dir: &str) -> bool {
    matches!(dir.trim(), "" | "/" | ".")
}

/// Normalize a directory path into the prefix used for store queries.
///
/// The root becomes `""`; any other path loses its leading delimiters and
/// gains exactly one trailing delimiter.
pub fn normalize_dir(dir: &str) -> String {
    if is_root(dir) {
        return String::new();
    }
    let trimmed = dir.trim().trim_start_matches(DELIMITER);
    let mut normalized = trimmed.trim_end_matches(DELIMITER).to_string();
    normalized.push(DELIMITER);
    normalized
}

/// Last non-empty segment of `key`.
pub fn basename(key: &str) -> &str {
    key.trim_end_matches(DELIMITER)
        .rsplit(DELIMITER)
        .next()
        .unwrap_or_default()
}

/// Parent directory of `key` as a normalized prefix (`""` for top-level keys).
pub fn parent_dir(key: &str) -> String {
    let trimmed = key.trim_end_matches(DELIMITER);
    match trimmed.rfind(DELIMITER) {
        Some(pos) => trimmed[..=pos].to_string(),
        None => String::new(),
    }
}

/// Lowercased extension of the last segment, or `""` when it has none.
///
/// `unicode_fold` selects full Unicode lowercasing; otherwise only ASCII
/// letters are folded.
pub fn extension(key: &str, unicode_fold: bool) -> String {
    let name = basename(key);
    let ext = match name.rfind('.') {
        Some(pos) => &name[pos + 1..],
        None => "",
    };
    if unicode_fold {
        ext.to_lowercase()
    } else {
        ext.to_ascii_lowercase()
    }
}

/// Number of delimiters left in `key` once the `base` prefix is stripped.
///
/// A direct child file has depth 0 and a direct child directory marker has
/// depth 1. Returns `None` when `key` does not live under `base`.
pub fn relative_depth(base: &str, key: &str) -> Option<usize> {
    let base = normalize_dir(base);
    key.strip_prefix(base.as_str())
        .map(|rest| rest.matches(DELIMITER).count())
}

/// Join `name` onto `parent_dir` with exactly one delimiter between them.
///
/// Directories get a trailing delimiter, files do not.
pub fn child_path(parent_dir: &str, name: &str, is_dir: bool) -> String {
    let mut path = normalize_dir(parent_dir);
    path.push_str(name.trim_matches(DELIMITER));
    if is_dir {
        path.push(DELIMITER);
    }
    path
}

/// Key of a file named `new_name` in the same directory as `key`.
pub fn sibling_path(key: &str, new_name: &str) -> String {
    child_path(&parent_dir(key), new_name, false)
}

/// Checks that `name` is usable as a single path segment.
pub fn is_valid_segment(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name != "." && name != ".." && !name.contains(DELIMITER)
}
