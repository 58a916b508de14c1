use std::path::{Component, Path, PathBuf};

/// Lexically resolves `.` and `..` without touching the disk.
pub fn normalize_path(source: &Path) -> PathBuf {
    let mut new_path = PathBuf::new();

    for component in source.components() {
        match component {
            // Skip the current-dir marker "."
            Component::CurDir => {}

            // For "..", pop the last component if possible
            Component::ParentDir => {
                new_path.pop();
            }

            // For normal components, push them
            other => new_path.push(other.as_os_str()),
        }
    }

    new_path
}

/// Joins an archive prefix and a local entry name with `/`, the separator every archive format
/// expects regardless of host platform.
pub fn combine_entry_name(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.replace('\\', "/");
    let name = name.trim_start_matches('/');

    if prefix.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Splits a file name into its stem and extension (`"a.tar.gz"` gives `("a.tar", ".gz")`).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(index) => name.split_at(index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_drops_dot_segments() {
        assert_eq!(
            normalize_path(Path::new("a/./b/../c")),
            PathBuf::from("a/c")
        );
    }

    #[test]
    fn test_combine_entry_name() {
        assert_eq!(combine_entry_name("", "a.txt"), "a.txt");
        assert_eq!(combine_entry_name("docs/", "a.txt"), "docs/a.txt");
        assert_eq!(combine_entry_name("docs", "/nested/a.txt"), "docs/nested/a.txt");
        assert_eq!(combine_entry_name("docs/inner", ""), "docs/inner");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("report.txt"), ("report", ".txt"));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("plain"), ("plain", ""));
    }
}
