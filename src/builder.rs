use crate::{
    errors::{BuildError, ConfigError, FileOperation, IoError, LayoutError},
    layout::Layout,
    materialized::MaterializedFileSystem,
    naming::NamingConfiguration,
    preview::render_tree,
    tar_archive::{TarBuilder, TarCompression},
    transactions::{Active, RollbackOperation, Transaction},
    zip_archive::ZipBuilder,
};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// A deferred creation step. Receives the full path of its entry.
pub type Action = Box<dyn FnOnce(&Path) -> Result<(), BuildError>>;

struct PendingAction {
    relative: PathBuf,
    action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Archive,
    /// Queued through [`TreeBuilder::add`], content unknown until built.
    Custom,
}

/// One entry a builder is going to create, relative to its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Queues file-system entries under a root directory and creates them all at once.
///
/// Nothing touches the disk until [`build`](Self::build). Entries are created in the order they
/// were added; if any of them fails, the whole root is removed again and the original error is
/// returned.
///
/// ```rust,ignore
/// let fs = TreeBuilder::at(scratch.path().join("project"))?
///     .text_file("Cargo.toml", "[package]")
///     .directory_with("src", |src| {
///         src.text_file("lib.rs", "");
///     })
///     .build()?;
/// ```
pub struct TreeBuilder {
    root: Option<PathBuf>,
    pending: Vec<PendingAction>,
    plan: Vec<PlannedEntry>,
    naming: Option<NamingConfiguration>,
    built: bool,
}
impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            root: None,
            pending: Vec::new(),
            plan: Vec::new(),
            naming: None,
            built: false,
        }
    }
    /// Shorthand for [`TreeBuilder::new`] followed by [`add_root`](Self::add_root).
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = Self::new();
        builder.add_root(root)?;
        Ok(builder)
    }
    /// Sets the directory everything is created under. Can only be called once.
    pub fn add_root(&mut self, root: impl Into<PathBuf>) -> Result<&mut Self, ConfigError> {
        let root = root.into();

        if let Some(existing) = &self.root {
            return Err(ConfigError::RootAlreadySet {
                root: existing.clone(),
            });
        }
        if root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRoot);
        }

        self.root = Some(root);
        Ok(self)
    }
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
    /// Full path of `relative` under the root, without touching the disk.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
        self.root
            .as_ref()
            .map(|root| root.join(relative))
            .ok_or(ConfigError::RootNotSet)
    }
    /// Entries queued so far, in creation order.
    pub fn planned(&self) -> &[PlannedEntry] {
        &self.plan
    }
    /// The planned tree, drawn the way `tree` would.
    pub fn preview(&self) -> String {
        let label = self
            .root
            .as_ref()
            .map(|root| root.display().to_string())
            .unwrap_or_else(|| ".".to_string());

        render_tree(&self.plan, &label)
    }

    /// Queues `action(root/relative)` to run at build time.
    pub fn add<F>(&mut self, relative: impl AsRef<Path>, action: F) -> &mut Self
    where
        F: FnOnce(&Path) -> Result<(), BuildError> + 'static,
    {
        self.queue(relative.as_ref(), EntryKind::Custom, Box::new(action))
    }
    fn queue(&mut self, relative: &Path, kind: EntryKind, action: Action) -> &mut Self {
        self.plan.push(PlannedEntry {
            path: relative.to_path_buf(),
            kind,
        });
        self.pending.push(PendingAction {
            relative: relative.to_path_buf(),
            action,
        });
        self
    }

    pub fn file(&mut self, relative: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> &mut Self {
        let content = content.into();

        self.queue(
            relative.as_ref(),
            EntryKind::File,
            Box::new(move |path: &Path| write_file(path, &content)),
        )
    }
    /// Writes `text` as UTF-8, without a byte order mark.
    pub fn text_file(&mut self, relative: impl AsRef<Path>, text: &str) -> &mut Self {
        self.file(relative, text.as_bytes())
    }
    pub fn empty_file(&mut self, relative: impl AsRef<Path>) -> &mut Self {
        self.file(relative, Vec::new())
    }
    pub fn read_only_file(
        &mut self,
        relative: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
    ) -> &mut Self {
        let content = content.into();

        self.queue(
            relative.as_ref(),
            EntryKind::File,
            Box::new(move |path: &Path| {
                write_file(path, &content)?;
                let mut permissions = fs::metadata(path)
                    .map_err(|error| IoError::new(FileOperation::Metadata, path.into(), error))?
                    .permissions();
                permissions.set_readonly(true);
                fs::set_permissions(path, permissions)
                    .map_err(|error| IoError::new(FileOperation::Write, path.into(), error))?;
                Ok(())
            }),
        )
    }
    pub fn directory(&mut self, relative: impl AsRef<Path>) -> &mut Self {
        self.queue(
            relative.as_ref(),
            EntryKind::Directory,
            Box::new(|path: &Path| create_directory(path)),
        )
    }
    /// Creates `relative` and fills it through a builder scoped to that directory.
    ///
    /// `fill` runs immediately, so generated names and resolved paths are known before
    /// [`build`](Self::build). The nested entries are created as part of this builder's build and
    /// rolled back with it.
    pub fn directory_with<F>(&mut self, relative: impl AsRef<Path>, fill: F) -> &mut Self
    where
        F: FnOnce(&mut TreeBuilder),
    {
        let relative = relative.as_ref();

        let mut nested = TreeBuilder::new();
        nested.root = self.root.as_ref().map(|root| root.join(relative));
        nested.naming = self.naming.take();
        fill(&mut nested);
        self.naming = nested.naming.take();

        let nested_plan = std::mem::take(&mut nested.plan);
        let pending = std::mem::take(&mut nested.pending);

        self.queue(
            relative,
            EntryKind::Directory,
            Box::new(move |path: &Path| {
                create_directory(path)?;
                replay(pending, path)
            }),
        );
        self.plan.extend(nested_plan.into_iter().map(|entry| PlannedEntry {
            path: relative.join(entry.path),
            kind: entry.kind,
        }));
        self
    }
    /// Writes a zip archive at `relative`, filled by `fill`. Shares this builder's naming.
    pub fn zip<F>(&mut self, relative: impl AsRef<Path>, fill: F) -> &mut Self
    where
        F: FnOnce(&mut ZipBuilder),
    {
        let mut zip = ZipBuilder::new();
        if let Some(naming) = self.naming.take() {
            zip.with_naming(naming);
        }
        fill(&mut zip);
        self.naming = zip.take_naming();

        self.queue(
            relative.as_ref(),
            EntryKind::Archive,
            Box::new(move |path: &Path| {
                zip.retarget(path.to_path_buf()).build()?;
                Ok(())
            }),
        )
    }
    /// Writes a tar archive at `relative`, filled by `fill`. Shares this builder's naming.
    pub fn tar<F>(
        &mut self,
        relative: impl AsRef<Path>,
        compression: TarCompression,
        fill: F,
    ) -> &mut Self
    where
        F: FnOnce(&mut TarBuilder),
    {
        let mut tar = TarBuilder::create(PathBuf::new(), compression);
        if let Some(naming) = self.naming.take() {
            tar.with_naming(naming);
        }
        fill(&mut tar);
        self.naming = tar.take_naming();

        self.queue(
            relative.as_ref(),
            EntryKind::Archive,
            Box::new(move |path: &Path| {
                tar.retarget(path.to_path_buf()).build()?;
                Ok(())
            }),
        )
    }

    /// Queues every entry described by `layout`.
    pub fn apply_layout(&mut self, layout: &Layout) -> Result<&mut Self, LayoutError> {
        layout.apply(self)?;
        Ok(self)
    }

    /// Queues an empty file for each name.
    pub fn add_files<I>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        for name in names {
            self.empty_file(name);
        }
        self
    }
    pub fn add_directories<I>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        for name in names {
            self.directory(name);
        }
        self
    }
    /// Like [`add_files`](Self::add_files), returning the full path of every queued file.
    pub fn add_files_resolved<I>(&mut self, names: I) -> Result<Vec<PathBuf>, ConfigError>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        let names: Vec<I::Item> = names.into_iter().collect();
        let paths = self.resolve_all(&names)?;
        self.add_files(names);
        Ok(paths)
    }
    /// Like [`add_directories`](Self::add_directories), returning the full paths.
    pub fn add_directories_resolved<I>(&mut self, names: I) -> Result<Vec<PathBuf>, ConfigError>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        let names: Vec<I::Item> = names.into_iter().collect();
        let paths = self.resolve_all(&names)?;
        self.add_directories(names);
        Ok(paths)
    }
    fn resolve_all<P: AsRef<Path>>(&self, names: &[P]) -> Result<Vec<PathBuf>, ConfigError> {
        names.iter().map(|name| self.resolve(name)).collect()
    }

    pub fn with_naming(&mut self, naming: NamingConfiguration) -> &mut Self {
        self.naming = Some(naming);
        self
    }
    pub fn naming(&self) -> Option<&NamingConfiguration> {
        self.naming.as_ref()
    }
    pub fn naming_mut(&mut self) -> Option<&mut NamingConfiguration> {
        self.naming.as_mut()
    }
    fn generate_name(&mut self, extension: &str) -> Result<String, ConfigError> {
        let naming = self
            .naming
            .as_mut()
            .ok_or(ConfigError::NameGeneratorMissing)?;

        Ok(naming.next_name(extension))
    }
    pub fn file_with_generated_name(
        &mut self,
        extension: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<&mut Self, ConfigError> {
        let name = self.generate_name(extension)?;
        Ok(self.file(name, content))
    }
    pub fn empty_file_with_generated_name(
        &mut self,
        extension: &str,
    ) -> Result<&mut Self, ConfigError> {
        self.file_with_generated_name(extension, Vec::new())
    }
    pub fn directory_with_generated_name(&mut self) -> Result<&mut Self, ConfigError> {
        let name = self.generate_name("")?;
        Ok(self.directory(name))
    }

    /// Creates the root and every queued entry, in order.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::RootNotSet`] when no root was given.
    /// - [`ConfigError::AlreadyBuilt`] when called a second time.
    /// - The first error returned by a queued action, after the root has been removed. If the
    ///   removal fails too, [`BuildError::RollbackFailed`] carries both.
    pub fn build(&mut self) -> Result<MaterializedFileSystem, BuildError> {
        let root = self.root.clone().ok_or(ConfigError::RootNotSet)?;
        if self.built {
            return Err(ConfigError::AlreadyBuilt { root }.into());
        }
        self.built = true;

        log::debug!(
            "building {} with {} queued entries",
            root.display(),
            self.pending.len()
        );

        create_directory(&root)?;
        let mut trx = Transaction::<Active>::new();
        trx.add_operation(RollbackOperation::RemoveDir(root.clone()));

        match replay(std::mem::take(&mut self.pending), &root) {
            Ok(()) => {
                trx.commit();
                Ok(MaterializedFileSystem::owned(root))
            }
            Err(error) => {
                log::debug!("build of {} failed: {error}", root.display());
                Err(error.after_rollback(trx.cancel().rollback()))
            }
        }
    }
}
impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn replay(pending: Vec<PendingAction>, base: &Path) -> Result<(), BuildError> {
    for PendingAction { relative, action } in pending {
        let path = base.join(relative);
        log::debug!("creating {}", path.display());
        action(&path)?;
    }

    Ok(())
}

/// Creates all directories in the specified path if they do not exist.
fn create_directory(path: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(path)
        .map_err(|error| IoError::new(FileOperation::Mkdir, path.into(), error))?;

    Ok(())
}

/// Writes a file, creating its parent directories first.
fn write_file(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        create_directory(parent)?;
    }

    fs::write(path, contents)
        .map_err(|error| IoError::new(FileOperation::Write, path.into(), error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingStrategy;

    #[test]
    fn test_add_root_twice_fails() {
        let mut builder = TreeBuilder::new();
        builder.add_root("first").unwrap();

        let error = builder.add_root("second").err().unwrap();

        assert!(matches!(
            error,
            ConfigError::RootAlreadySet { root } if root == Path::new("first")
        ));
    }

    #[test]
    fn test_add_root_rejects_empty_path() {
        assert!(matches!(
            TreeBuilder::new().add_root("").err(),
            Some(ConfigError::EmptyRoot)
        ));
    }

    #[test]
    fn test_build_without_root_fails() {
        let error = TreeBuilder::new().empty_file("a").build().unwrap_err();

        assert!(matches!(error, BuildError::Config(ConfigError::RootNotSet)));
    }

    #[test]
    fn test_adding_does_no_io() {
        let scratch = tempfile::tempdir().unwrap();
        let root = scratch.path().join("lazy");

        let mut builder = TreeBuilder::at(&root).unwrap();
        builder.text_file("a.txt", "a").directory("d");

        assert!(!root.exists());
    }

    #[test]
    fn test_resolve_is_pure_path_combination() {
        let builder = TreeBuilder::at("/tmp/root").unwrap();

        assert_eq!(
            builder.resolve("a/b.txt").unwrap(),
            PathBuf::from("/tmp/root/a/b.txt")
        );
        assert!(matches!(
            TreeBuilder::new().resolve("a"),
            Err(ConfigError::RootNotSet)
        ));
    }

    #[test]
    fn test_actions_run_in_insertion_order() {
        let scratch = tempfile::tempdir().unwrap();
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));

        let mut builder = TreeBuilder::at(scratch.path().join("ordered")).unwrap();
        for name in ["z", "a", "m"] {
            let log = log.clone();
            builder.add(name, move |path| {
                log.borrow_mut()
                    .push(path.file_name().unwrap().to_string_lossy().to_string());
                Ok(())
            });
        }
        builder.build().unwrap();

        assert_eq!(*log.borrow(), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_second_build_fails_fast() {
        let scratch = tempfile::tempdir().unwrap();
        let mut builder = TreeBuilder::at(scratch.path().join("once")).unwrap();
        builder.empty_file("a");

        let fs = builder.build().unwrap();
        let error = builder.build().unwrap_err();

        assert!(matches!(
            error,
            BuildError::Config(ConfigError::AlreadyBuilt { .. })
        ));
        assert!(fs.path("a").is_file());
    }

    #[test]
    fn test_nested_plan_is_prefixed() {
        let mut builder = TreeBuilder::at("root").unwrap();
        builder.directory_with("src", |src| {
            src.empty_file("lib.rs").directory("bin");
        });

        let planned: Vec<_> = builder.planned().iter().map(|e| e.path.clone()).collect();

        assert_eq!(
            planned,
            vec![
                PathBuf::from("src"),
                PathBuf::from("src/lib.rs"),
                PathBuf::from("src/bin")
            ]
        );
    }

    #[test]
    fn test_generated_names_need_configuration() {
        let mut builder = TreeBuilder::at("root").unwrap();

        assert!(matches!(
            builder.empty_file_with_generated_name(".txt").err(),
            Some(ConfigError::NameGeneratorMissing)
        ));
    }

    #[test]
    fn test_naming_is_shared_with_nested_builders() {
        let mut builder = TreeBuilder::at("root").unwrap();
        builder.with_naming(NamingConfiguration::new(NamingStrategy::sequential("f")));

        builder.empty_file_with_generated_name(".txt").unwrap();
        builder.directory_with("sub", |sub| {
            sub.empty_file_with_generated_name(".txt").unwrap();
        });
        builder.empty_file_with_generated_name(".txt").unwrap();

        assert_eq!(
            builder.naming().unwrap().state().created,
            vec!["f.txt", "f.txt(1)", "f.txt(2)"]
        );
    }
}
