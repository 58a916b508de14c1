use crate::{
    archive::{extract_tar, extract_zip},
    assertion::FileSystemAssertion,
    errors::{AssertionError, FileOperation, IoError},
    tar_archive::TarCompression,
    utils::normalize_path,
};
use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// A directory tree that exists on disk.
///
/// Instances returned by [`TreeBuilder::build`](crate::TreeBuilder::build) own their root and
/// delete it on [`dispose`](Self::dispose) or when dropped. Views obtained through
/// [`within`](Self::within) never delete anything.
#[derive(Debug)]
pub struct MaterializedFileSystem {
    root: PathBuf,
    owned: bool,
    extractions: RefCell<Vec<TempDir>>,
}
impl MaterializedFileSystem {
    pub(crate) fn owned(root: PathBuf) -> Self {
        Self {
            root,
            owned: true,
            extractions: RefCell::new(Vec::new()),
        }
    }
    /// Wraps an existing directory without taking ownership of it.
    pub fn view(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            owned: false,
            extractions: RefCell::new(Vec::new()),
        }
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }
    /// Sub-view rooted at a descendant directory.
    pub fn within(&self, relative: impl AsRef<Path>) -> MaterializedFileSystem {
        Self::view(normalize_path(&self.path(relative)))
    }
    /// Immediate children (files and directories), sorted by path.
    pub fn entries(&self) -> Result<Vec<PathBuf>, IoError> {
        let read = fs::read_dir(&self.root)
            .map_err(|error| IoError::new(FileOperation::Read, self.root.clone(), error))?;

        let mut entries = Vec::new();
        for entry in read {
            let entry = entry
                .map_err(|error| IoError::new(FileOperation::Read, self.root.clone(), error))?;
            entries.push(entry.path());
        }
        entries.sort();

        Ok(entries)
    }
    pub fn files(&self) -> Result<Vec<PathBuf>, IoError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|path| path.is_file())
            .collect())
    }
    pub fn directories(&self) -> Result<Vec<PathBuf>, IoError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|path| path.is_dir())
            .collect())
    }
    pub fn should(&self) -> FileSystemAssertion<'_> {
        FileSystemAssertion::new(self)
    }
    /// Extracts the zip archive at `relative` into a temporary directory and asserts on that.
    ///
    /// The extraction directory lives as long as this file system.
    pub fn should_zip(
        &self,
        relative: impl AsRef<Path>,
    ) -> Result<FileSystemAssertion<'_>, AssertionError> {
        let archive = self.path(relative);
        let target = self.extraction_dir()?;

        extract_zip(&archive, &target).map_err(|error| AssertionError::inner(error.into()))?;

        Ok(FileSystemAssertion::over(self, target))
    }
    /// Same as [`should_zip`](Self::should_zip) for tar archives. Compression is detected
    /// from the file extension.
    pub fn should_tar(
        &self,
        relative: impl AsRef<Path>,
    ) -> Result<FileSystemAssertion<'_>, AssertionError> {
        let compression = TarCompression::from_path(&self.path(relative.as_ref()));

        self.should_tar_with(relative, compression)
    }
    pub fn should_tar_with(
        &self,
        relative: impl AsRef<Path>,
        compression: TarCompression,
    ) -> Result<FileSystemAssertion<'_>, AssertionError> {
        let archive = self.path(relative);
        let target = self.extraction_dir()?;

        extract_tar(&archive, compression, &target)
            .map_err(|error| AssertionError::inner(error.into()))?;

        Ok(FileSystemAssertion::over(self, target))
    }
    fn extraction_dir(&self) -> Result<PathBuf, AssertionError> {
        let dir = tempfile::Builder::new()
            .prefix("fstage-extract-")
            .tempdir()
            .map_err(|error| {
                AssertionError::inner(
                    IoError::new(FileOperation::Mkdir, std::env::temp_dir(), error).into(),
                )
            })?;
        let path = dir.path().to_path_buf();

        self.extractions.borrow_mut().push(dir);

        Ok(path)
    }
    /// Stops this file system from deleting its root and returns the root path.
    pub fn keep(mut self) -> PathBuf {
        self.owned = false;
        self.root.clone()
    }
    /// Deletes extraction directories and, for owned instances, the root.
    pub fn dispose(mut self) -> Result<(), IoError> {
        self.release()
    }
    fn release(&mut self) -> Result<(), IoError> {
        for dir in self.extractions.get_mut().drain(..) {
            let path = dir.path().to_path_buf();
            dir.close()
                .map_err(|error| IoError::new(FileOperation::Remove, path, error))?;
        }

        if self.owned {
            self.owned = false;
            log::debug!("disposing {}", self.root.display());
            match fs::remove_dir_all(&self.root) {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => {
                    return Err(IoError::new(FileOperation::Remove, self.root.clone(), error))
                }
            }
        }

        Ok(())
    }
}
impl Drop for MaterializedFileSystem {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            log::warn!("failed to dispose file system: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_tree() -> (TempDir, PathBuf) {
        let scratch = tempfile::tempdir().unwrap();
        let root = scratch.path().join("tree");
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("sub/c.txt"), "c").unwrap();
        (scratch, root)
    }

    #[test]
    fn test_entries_are_sorted_and_split() {
        let (_scratch, root) = scratch_tree();
        let fs = MaterializedFileSystem::view(&root);

        assert_eq!(
            fs.entries().unwrap(),
            vec![root.join("a.txt"), root.join("b.txt"), root.join("sub")]
        );
        assert_eq!(fs.files().unwrap().len(), 2);
        assert_eq!(fs.directories().unwrap(), vec![root.join("sub")]);
    }

    #[test]
    fn test_within_is_a_non_owning_view() {
        let (_scratch, root) = scratch_tree();
        let owner = MaterializedFileSystem::owned(root.clone());

        let sub = owner.within("sub");
        assert_eq!(sub.files().unwrap(), vec![root.join("sub/c.txt")]);
        drop(sub);

        assert!(root.join("sub").is_dir());
        owner.dispose().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_drop_deletes_owned_root() {
        let (_scratch, root) = scratch_tree();

        drop(MaterializedFileSystem::owned(root.clone()));

        assert!(!root.exists());
    }

    #[test]
    fn test_keep_leaves_root_on_disk() {
        let (_scratch, root) = scratch_tree();

        let kept = MaterializedFileSystem::owned(root.clone()).keep();

        assert_eq!(kept, root);
        assert!(root.exists());
    }

    #[test]
    fn test_entries_of_missing_root_is_io_error() {
        let scratch = tempfile::tempdir().unwrap();
        let fs = MaterializedFileSystem::view(scratch.path().join("missing"));

        let error = fs.entries().unwrap_err();

        assert!(matches!(error.operation, FileOperation::Read));
    }
}
