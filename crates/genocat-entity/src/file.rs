//! File path helpers.
//!
//! Catalog file paths are relative to the study root. Folders carry a
//! trailing `/`; the empty path is the study root itself.

/// All ancestor paths of a file, from the study root down to the file
/// itself.
///
/// `"a/b/c.txt"` yields `["", "a/", "a/b/", "a/b/c.txt"]`. The last element
/// is the path as given, so folder paths keep their trailing `/`.
pub fn parent_paths(file_path: &str) -> Vec<String> {
    if file_path.is_empty() {
        return vec![String::new()];
    }

    let mut split: Vec<&str> = file_path.split('/').collect();
    if split.last() == Some(&"") {
        split.pop();
    }

    let mut paths = Vec::with_capacity(split.len() + 1);
    paths.push(String::new());
    let mut path = String::new();
    // The last segment is the file or folder itself; it is appended below
    // with its original form.
    for segment in &split[..split.len() - 1] {
        path.push_str(segment);
        path.push('/');
        paths.push(path.clone());
    }
    if paths.last().map(String::as_str) != Some(file_path) {
        paths.push(file_path.to_string());
    }
    paths
}

/// Whether a path denotes a folder.
pub fn is_folder(path: &str) -> bool {
    path.is_empty() || path.ends_with('/')
}

/// The file name of a path (the last non-empty segment).
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}
