//! Built-in checks for [`FileSystemAssertion`]. Each one is a single `validate` call.

use crate::{
    assertion::{AssertionMode, FileSystemAssertion},
    errors::{AssertionError, FileOperation, IoError, PredicateError},
    utils::split_extension,
};
use regex::Regex;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};
use walkdir::WalkDir;

/// How file content is compared in [`FileSystemAssertion::file_content_equals_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentComparison {
    Exact,
    IgnoreCase,
    /// All whitespace is removed before comparing.
    IgnoreWhitespace,
    /// `\r\n` and `\r` are treated as `\n`.
    IgnoreLineEndings,
}
impl ContentComparison {
    fn equals(self, actual: &str, expected: &str) -> bool {
        match self {
            Self::Exact => actual == expected,
            Self::IgnoreCase => actual.to_lowercase() == expected.to_lowercase(),
            Self::IgnoreWhitespace => {
                let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
                strip(actual) == strip(expected)
            }
            Self::IgnoreLineEndings => {
                let unify = |s: &str| s.replace("\r\n", "\n").replace('\r', "\n");
                unify(actual) == unify(expected)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingConvention {
    SnakeCase,
    KebabCase,
    CamelCase,
    PascalCase,
    LowerCase,
    UpperCase,
}
impl NamingConvention {
    /// Checks a name without its extension.
    pub fn matches(self, stem: &str) -> bool {
        lazy_static::lazy_static! {
            static ref SNAKE: Regex =
                Regex::new(r"^[a-z0-9]+(?:_[a-z0-9]+)*$").expect("a valid regex pattern");
            static ref KEBAB: Regex =
                Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("a valid regex pattern");
            static ref CAMEL: Regex =
                Regex::new(r"^[a-z][a-zA-Z0-9]*$").expect("a valid regex pattern");
            static ref PASCAL: Regex =
                Regex::new(r"^[A-Z][a-zA-Z0-9]*$").expect("a valid regex pattern");
        }

        match self {
            Self::SnakeCase => SNAKE.is_match(stem),
            Self::KebabCase => KEBAB.is_match(stem),
            Self::CamelCase => CAMEL.is_match(stem),
            Self::PascalCase => PASCAL.is_match(stem),
            Self::LowerCase => !stem.chars().any(char::is_uppercase),
            Self::UpperCase => !stem.chars().any(char::is_lowercase),
        }
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, PredicateError> {
    fs::read(path)
        .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error).into())
}

fn read_text(path: &Path) -> Result<String, PredicateError> {
    fs::read_to_string(path)
        .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error).into())
}

fn metadata(path: &Path) -> Result<fs::Metadata, PredicateError> {
    fs::metadata(path)
        .map_err(|error| IoError::new(FileOperation::Metadata, path.to_path_buf(), error).into())
}

fn modified(path: &Path) -> Result<SystemTime, PredicateError> {
    metadata(path)?
        .modified()
        .map_err(|error| IoError::new(FileOperation::Metadata, path.to_path_buf(), error).into())
}

/// Every entry below `dir` (not `dir` itself), depth first.
fn walk(dir: &Path) -> Result<Vec<walkdir::DirEntry>, PredicateError> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|error| {
            let path = error.path().unwrap_or(dir).to_path_buf();
            IoError::new(FileOperation::Read, path, error.into())
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

fn walk_files(dir: &Path) -> Result<Vec<walkdir::DirEntry>, PredicateError> {
    Ok(walk(dir)?
        .into_iter()
        .filter(|entry| entry.file_type().is_file())
        .collect())
}

fn count_children(dir: &Path, want_dirs: bool) -> Result<usize, PredicateError> {
    let read = fs::read_dir(dir)
        .map_err(|error| IoError::new(FileOperation::Read, dir.to_path_buf(), error))?;

    let mut count = 0;
    for entry in read {
        let entry =
            entry.map_err(|error| IoError::new(FileOperation::Read, dir.to_path_buf(), error))?;
        if entry.path().is_dir() == want_dirs {
            count += 1;
        }
    }

    Ok(count)
}

impl<'fs, M: AssertionMode> FileSystemAssertion<'fs, M> {
    pub fn exists(&self, relative: impl AsRef<Path>) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!("expected '{}' {}to exist", relative.display(), M::NOT),
            |path| Ok(path.exists()),
        )
    }

    pub fn file_exists(&self, relative: impl AsRef<Path>) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!("expected file '{}' {}to exist", relative.display(), M::NOT),
            |path| Ok(path.is_file()),
        )
    }

    pub fn directory_exists(&self, relative: impl AsRef<Path>) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!("expected directory '{}' {}to exist", relative.display(), M::NOT),
            |path| Ok(path.is_dir()),
        )
    }

    pub fn file_content_equals(
        &self,
        relative: impl AsRef<Path>,
        expected: impl AsRef<[u8]>,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        let expected = expected.as_ref();
        self.check(
            relative,
            format!(
                "expected content of '{}' {}to equal {:?}",
                relative.display(),
                M::NOT,
                String::from_utf8_lossy(expected)
            ),
            |path| Ok(read_bytes(path)? == expected),
        )
    }

    pub fn file_content_equals_with(
        &self,
        relative: impl AsRef<Path>,
        expected: &str,
        comparison: ContentComparison,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected content of '{}' {}to equal {expected:?} ({comparison:?})",
                relative.display(),
                M::NOT
            ),
            |path| Ok(comparison.equals(&read_text(path)?, expected)),
        )
    }

    pub fn empty_file(&self, relative: impl AsRef<Path>) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!("expected file '{}' {}to be empty", relative.display(), M::NOT),
            |path| Ok(metadata(path)?.len() == 0),
        )
    }

    pub fn empty_directory(&self, relative: impl AsRef<Path>) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected directory '{}' {}to be empty",
                relative.display(),
                M::NOT
            ),
            |path| {
                let mut read = fs::read_dir(path).map_err(|error| {
                    IoError::new(FileOperation::Read, path.to_path_buf(), error)
                })?;
                Ok(read.next().is_none())
            },
        )
    }

    pub fn file_size(
        &self,
        relative: impl AsRef<Path>,
        bytes: u64,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected '{}' {}to be {bytes} bytes",
                relative.display(),
                M::NOT
            ),
            |path| Ok(metadata(path)?.len() == bytes),
        )
    }

    /// Inclusive on both ends.
    pub fn file_size_between(
        &self,
        relative: impl AsRef<Path>,
        min: u64,
        max: u64,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected size of '{}' {}to be within {min}..={max} bytes",
                relative.display(),
                M::NOT
            ),
            |path| Ok((min..=max).contains(&metadata(path)?.len())),
        )
    }

    pub fn read_only(&self, relative: impl AsRef<Path>) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!("expected '{}' {}to be read-only", relative.display(), M::NOT),
            |path| Ok(metadata(path)?.permissions().readonly()),
        )
    }

    #[cfg(unix)]
    pub fn mode(&self, relative: impl AsRef<Path>, mode: u32) -> Result<&Self, AssertionError> {
        use std::os::unix::fs::PermissionsExt;

        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected permissions of '{}' {}to be {mode:o}",
                relative.display(),
                M::NOT
            ),
            |path| Ok(metadata(path)?.permissions().mode() & 0o7777 == mode),
        )
    }

    pub fn modified_after(
        &self,
        relative: impl AsRef<Path>,
        instant: SystemTime,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected '{}' {}to be modified after {instant:?}",
                relative.display(),
                M::NOT
            ),
            |path| Ok(modified(path)? > instant),
        )
    }

    pub fn modified_before(
        &self,
        relative: impl AsRef<Path>,
        instant: SystemTime,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected '{}' {}to be modified before {instant:?}",
                relative.display(),
                M::NOT
            ),
            |path| Ok(modified(path)? < instant),
        )
    }

    /// An invalid pattern is reported as an inner exception.
    pub fn content_matches(
        &self,
        relative: impl AsRef<Path>,
        pattern: &str,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected content of '{}' {}to match /{pattern}/",
                relative.display(),
                M::NOT
            ),
            |path| {
                let regex = Regex::new(pattern)?;
                Ok(regex.is_match(&read_text(path)?))
            },
        )
    }

    pub fn content_contains(
        &self,
        relative: impl AsRef<Path>,
        needle: &str,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected content of '{}' {}to contain {needle:?}",
                relative.display(),
                M::NOT
            ),
            |path| Ok(read_text(path)?.contains(needle)),
        )
    }

    pub fn content_starts_with(
        &self,
        relative: impl AsRef<Path>,
        prefix: &str,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected content of '{}' {}to start with {prefix:?}",
                relative.display(),
                M::NOT
            ),
            |path| Ok(read_text(path)?.starts_with(prefix)),
        )
    }

    pub fn content_ends_with(
        &self,
        relative: impl AsRef<Path>,
        suffix: &str,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected content of '{}' {}to end with {suffix:?}",
                relative.display(),
                M::NOT
            ),
            |path| Ok(read_text(path)?.ends_with(suffix)),
        )
    }

    /// Files directly inside `relative`.
    pub fn file_count(
        &self,
        relative: impl AsRef<Path>,
        count: usize,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected '{}' {}to hold {count} file(s)",
                relative.display(),
                M::NOT
            ),
            |path| Ok(count_children(path, false)? == count),
        )
    }

    /// Directories directly inside `relative`.
    pub fn directory_count(
        &self,
        relative: impl AsRef<Path>,
        count: usize,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected '{}' {}to hold {count} directory(ies)",
                relative.display(),
                M::NOT
            ),
            |path| Ok(count_children(path, true)? == count),
        )
    }

    /// Sum of all file sizes below `relative`, recursively.
    pub fn total_size(
        &self,
        relative: impl AsRef<Path>,
        bytes: u64,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected total size of '{}' {}to be {bytes} bytes",
                relative.display(),
                M::NOT
            ),
            |path| {
                let mut total = 0;
                for entry in walk_files(path)? {
                    total += metadata(entry.path())?.len();
                }
                Ok(total == bytes)
            },
        )
    }

    /// Number of files below `relative`, recursively.
    pub fn total_file_count(
        &self,
        relative: impl AsRef<Path>,
        count: usize,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected '{}' {}to hold {count} file(s) in total",
                relative.display(),
                M::NOT
            ),
            |path| Ok(walk_files(path)?.len() == count),
        )
    }

    /// No two files anywhere below `relative` share a file name.
    pub fn no_duplicate_names(&self, relative: impl AsRef<Path>) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected file names below '{}' {}to be unique",
                relative.display(),
                M::NOT
            ),
            |path| {
                let mut seen = HashSet::new();
                Ok(walk_files(path)?
                    .iter()
                    .all(|entry| seen.insert(entry.file_name().to_os_string())))
            },
        )
    }

    /// Every entry name below `relative` (extension stripped) follows `convention`.
    pub fn names_follow(
        &self,
        relative: impl AsRef<Path>,
        convention: NamingConvention,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected names below '{}' {}to follow {convention:?}",
                relative.display(),
                M::NOT
            ),
            |path| {
                Ok(walk(path)?.iter().all(|entry| {
                    let name = entry.file_name().to_string_lossy();
                    let stem = if entry.file_type().is_dir() {
                        &*name
                    } else {
                        split_extension(&name).0
                    };
                    convention.matches(stem)
                }))
            },
        )
    }

    /// No entry is nested deeper than `depth` levels below `relative` (direct children are 1).
    pub fn max_depth(
        &self,
        relative: impl AsRef<Path>,
        depth: usize,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected '{}' {}to be at most {depth} level(s) deep",
                relative.display(),
                M::NOT
            ),
            |path| Ok(walk(path)?.iter().all(|entry| entry.depth() <= depth)),
        )
    }

    /// Byte-level equality of two files.
    pub fn files_equal(
        &self,
        relative: impl AsRef<Path>,
        other: impl AsRef<Path>,
    ) -> Result<&Self, AssertionError> {
        let relative = relative.as_ref();
        let other = other.as_ref();
        self.validate(
            relative,
            format!(
                "expected '{}' {}to equal '{}'",
                relative.display(),
                M::NOT,
                other.display()
            ),
            |relative, fs| Ok(read_bytes(&fs.path(relative))? == read_bytes(&fs.path(other))?),
        )
    }

    /// Every file below `relative` satisfies `predicate`. Holds for an empty tree.
    pub fn all_files<F>(
        &self,
        relative: impl AsRef<Path>,
        predicate: F,
    ) -> Result<&Self, AssertionError>
    where
        F: Fn(&Path) -> bool,
    {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected {}every file below '{}' to satisfy the predicate",
                M::NOT,
                relative.display()
            ),
            |path| Ok(walk_files(path)?.iter().all(|entry| predicate(entry.path()))),
        )
    }

    /// At least one file below `relative` satisfies `predicate`.
    pub fn any_file<F>(
        &self,
        relative: impl AsRef<Path>,
        predicate: F,
    ) -> Result<&Self, AssertionError>
    where
        F: Fn(&Path) -> bool,
    {
        let relative = relative.as_ref();
        self.check(
            relative,
            format!(
                "expected {}any file below '{}' to satisfy the predicate",
                M::NOT,
                relative.display()
            ),
            |path| Ok(walk_files(path)?.iter().any(|entry| predicate(entry.path()))),
        )
    }

    /// Paths of every file below `relative`, relative to it. Handy for custom `validate` calls.
    pub fn list_files(&self, relative: impl AsRef<Path>) -> Result<Vec<PathBuf>, AssertionError> {
        let base = self.file_system().path(relative);
        let files = walk_files(&base).map_err(AssertionError::inner)?;

        Ok(files
            .iter()
            .filter_map(|entry| entry.path().strip_prefix(&base).ok())
            .map(Path::to_path_buf)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialized::MaterializedFileSystem;

    fn fixture() -> (tempfile::TempDir, MaterializedFileSystem) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/bin")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("readme.md"), "# Title\r\nbody\r\n").unwrap();
        fs::write(root.join("src/lib.rs"), "pub fn hello() {}").unwrap();
        fs::write(root.join("src/bin/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("copy.rs"), "fn main() {}").unwrap();
        fs::write(root.join("blank.txt"), "").unwrap();
        let fs = MaterializedFileSystem::view(root);
        (dir, fs)
    }

    #[test]
    fn test_existence_checks() {
        let (_dir, fs) = fixture();

        fs.should()
            .exists("src")
            .unwrap()
            .directory_exists("src/bin")
            .unwrap()
            .file_exists("src/lib.rs")
            .unwrap();
        fs.should().not().exists("target").unwrap();
        assert!(fs.should().file_exists("src").is_err());
    }

    #[test]
    fn test_reversed_message_mentions_negation() {
        let (_dir, fs) = fixture();

        let error = fs.should().not().exists("src").err().unwrap();

        assert_eq!(error.message, "expected 'src' not to exist");
    }

    #[test]
    fn test_content_checks() {
        let (_dir, fs) = fixture();

        fs.should()
            .file_content_equals("src/lib.rs", "pub fn hello() {}")
            .unwrap()
            .content_contains("src/lib.rs", "hello")
            .unwrap()
            .content_starts_with("src/lib.rs", "pub")
            .unwrap()
            .content_ends_with("src/lib.rs", "{}")
            .unwrap()
            .content_matches("src/lib.rs", r"fn \w+\(\)")
            .unwrap();
        assert!(fs.should().file_content_equals("src/lib.rs", "nope").is_err());
    }

    #[test]
    fn test_content_comparison_policies() {
        let (_dir, fs) = fixture();
        let should = fs.should();

        assert!(should.file_content_equals("readme.md", "# Title\nbody\n").is_err());
        should
            .file_content_equals_with(
                "readme.md",
                "# Title\nbody\n",
                ContentComparison::IgnoreLineEndings,
            )
            .unwrap()
            .file_content_equals_with(
                "readme.md",
                "# TITLE\r\nBODY\r\n",
                ContentComparison::IgnoreCase,
            )
            .unwrap()
            .file_content_equals_with(
                "readme.md",
                "#Titlebody",
                ContentComparison::IgnoreWhitespace,
            )
            .unwrap();
    }

    #[test]
    fn test_missing_file_content_is_inner_exception() {
        let (_dir, fs) = fixture();

        let error = fs.should().file_content_equals("missing.txt", "x").err().unwrap();

        assert_eq!(error.message, "inner exception");
        assert!(error.source.is_some());
    }

    #[test]
    fn test_invalid_regex_is_inner_exception() {
        let (_dir, fs) = fixture();

        let error = fs.should().content_matches("src/lib.rs", "(").err().unwrap();

        assert_eq!(error.message, "inner exception");
    }

    #[test]
    fn test_empty_and_size_checks() {
        let (_dir, fs) = fixture();

        fs.should()
            .empty_file("blank.txt")
            .unwrap()
            .empty_directory("empty")
            .unwrap()
            .file_size("src/lib.rs", 17)
            .unwrap()
            .file_size_between("src/lib.rs", 10, 20)
            .unwrap();
        fs.should().not().empty_directory("src").unwrap();
    }

    #[test]
    fn test_counts() {
        let (_dir, fs) = fixture();

        fs.should()
            .file_count("", 3)
            .unwrap()
            .directory_count("", 2)
            .unwrap()
            .total_file_count("", 5)
            .unwrap()
            .total_file_count("src", 2)
            .unwrap()
            .total_size("src", 17 + 12)
            .unwrap();
    }

    #[test]
    fn test_duplicates_naming_and_depth() {
        let (_dir, fs) = fixture();

        fs.should()
            .no_duplicate_names("src")
            .unwrap()
            .names_follow("src", NamingConvention::SnakeCase)
            .unwrap()
            .max_depth("", 3)
            .unwrap()
            .not()
            .max_depth("", 2)
            .unwrap();
        fs::write(fs.path("src/main.rs"), "").unwrap();
        fs.should().not().no_duplicate_names("src").unwrap();
    }

    #[test]
    fn test_files_equal_and_aggregates() {
        let (_dir, fs) = fixture();

        fs.should()
            .files_equal("copy.rs", "src/bin/main.rs")
            .unwrap()
            .all_files("src", |path| path.extension().is_some_and(|ext| ext == "rs"))
            .unwrap()
            .any_file("", |path| path.ends_with("readme.md"))
            .unwrap()
            .not()
            .files_equal("copy.rs", "src/lib.rs")
            .unwrap();
    }

    #[test]
    fn test_list_files_is_relative() {
        let (_dir, fs) = fixture();

        let files = fs.should().list_files("src").unwrap();

        assert_eq!(
            files,
            vec![PathBuf::from("bin/main.rs"), PathBuf::from("lib.rs")]
        );
    }

    #[test]
    fn test_modified_window_and_read_only() {
        let (_dir, fs) = fixture();
        let long_ago = SystemTime::UNIX_EPOCH;
        let later = SystemTime::now() + std::time::Duration::from_secs(3600);

        fs.should()
            .modified_after("src/lib.rs", long_ago)
            .unwrap()
            .modified_before("src/lib.rs", later)
            .unwrap()
            .not()
            .read_only("src/lib.rs")
            .unwrap();
    }

    #[test]
    fn test_naming_convention_matches() {
        assert!(NamingConvention::SnakeCase.matches("my_file_2"));
        assert!(!NamingConvention::SnakeCase.matches("myFile"));
        assert!(NamingConvention::KebabCase.matches("my-file"));
        assert!(NamingConvention::CamelCase.matches("myFile"));
        assert!(NamingConvention::PascalCase.matches("MyFile"));
        assert!(NamingConvention::UpperCase.matches("README"));
        assert!(NamingConvention::LowerCase.matches("readme"));
    }
}
