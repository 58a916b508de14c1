use crate::{
    archive::{create_archive_file, ArchivePlan, EntryContext},
    errors::{BuildError, ConfigError, FileOperation, IoError},
    naming::NamingConfiguration,
    transactions::{Active, Transaction},
};
use std::{
    fs::File,
    io::{self, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

fn zip_error(context: &EntryContext, source: zip::result::ZipError) -> BuildError {
    BuildError::Zip {
        archive: context.archive.clone(),
        entry: context.full_entry_name(),
        source,
    }
}

fn archive_io(context: &EntryContext, error: io::Error) -> BuildError {
    IoError::new(FileOperation::Archive, context.archive.clone(), error).into()
}

/// Queues zip entries and writes them in one pass.
///
/// A builder made with [`ZipBuilder::create`] owns its output file: [`build`](Self::build)
/// creates it and deletes it again if any entry fails. A builder made with
/// [`ZipBuilder::new`] only writes into a caller supplied [`ZipWriter`] through
/// [`write_into`](Self::write_into) and never deletes anything.
pub struct ZipBuilder {
    target: Option<PathBuf>,
    options: SimpleFileOptions,
    plan: ArchivePlan<ZipWriter<File>>,
    built: bool,
}
impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            target: None,
            options: SimpleFileOptions::default(),
            plan: ArchivePlan::new(String::new()),
            built: false,
        }
    }
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Some(path.into()),
            ..Self::new()
        }
    }
    fn nested(&self, prefix: String) -> Self {
        Self {
            target: None,
            options: self.options,
            plan: ArchivePlan::new(prefix),
            built: false,
        }
    }
    pub fn compression(&mut self, method: CompressionMethod) -> &mut Self {
        self.options = self.options.compression_method(method);
        self
    }
    /// `None` picks the method's default level.
    pub fn compression_level(&mut self, level: Option<i64>) -> &mut Self {
        self.options = self.options.compression_level(level);
        self
    }
    pub fn with_naming(&mut self, naming: NamingConfiguration) -> &mut Self {
        self.plan.naming = Some(naming);
        self
    }
    pub(crate) fn take_naming(&mut self) -> Option<NamingConfiguration> {
        self.plan.naming.take()
    }
    /// Points a builder at the file it should write, once that path is known.
    pub(crate) fn retarget(mut self, target: PathBuf) -> Self {
        self.target = Some(target);
        self
    }
    pub fn naming(&self) -> Option<&NamingConfiguration> {
        self.plan.naming.as_ref()
    }
    pub fn prefix(&self) -> &str {
        &self.plan.prefix
    }
    /// Full entry names queued so far at this level, in order.
    pub fn entry_names(&self) -> Vec<String> {
        self.plan.entry_names()
    }
    /// Queues `action`, run at build time with the open writer and the entry context.
    pub fn add<F>(&mut self, name: impl Into<String>, action: F) -> &mut Self
    where
        F: FnOnce(&mut ZipWriter<File>, &EntryContext) -> Result<(), BuildError> + 'static,
    {
        self.plan.push(name.into(), Box::new(action));
        self
    }
    pub fn file(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> &mut Self {
        let content = content.into();
        let options = self.options;

        self.add(name, move |writer, context| {
            write_staged(writer, context, &content, options)
        })
    }
    pub fn text_file(&mut self, name: impl Into<String>, text: &str) -> &mut Self {
        self.file(name, text.as_bytes())
    }
    pub fn empty_file(&mut self, name: impl Into<String>) -> &mut Self {
        self.file(name, Vec::new())
    }
    pub fn directory(&mut self, name: impl Into<String>) -> &mut Self {
        let options = self.options;

        self.add(name, move |writer, context| {
            writer
                .add_directory(context.directory_entry_name(), options)
                .map_err(|source| zip_error(context, source))
        })
    }
    /// Adds a directory entry and fills it through a nested builder scoped to that prefix.
    ///
    /// The nested builder shares this builder's naming configuration and writes into the same
    /// archive.
    pub fn directory_with<F>(&mut self, name: impl Into<String>, fill: F) -> &mut Self
    where
        F: FnOnce(&mut ZipBuilder),
    {
        let name = name.into();
        let prefix = crate::utils::combine_entry_name(&self.plan.prefix, &name);

        let mut nested = self.nested(prefix);
        nested.plan.naming = self.plan.naming.take();
        fill(&mut nested);
        self.plan.naming = nested.plan.naming.take();

        let options = self.options;
        self.add(name, move |writer, context| {
            writer
                .add_directory(context.directory_entry_name(), options)
                .map_err(|source| zip_error(context, source))?;
            nested.plan.replay(writer, &context.archive)
        })
    }
    pub fn file_with_generated_name(
        &mut self,
        extension: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<&mut Self, ConfigError> {
        let name = self.plan.generate_name(extension)?;
        Ok(self.file(name, content))
    }
    pub fn directory_with_generated_name(&mut self) -> Result<&mut Self, ConfigError> {
        let name = self.plan.generate_name("")?;
        Ok(self.directory(name))
    }
    /// Writes the archive to the path given to [`ZipBuilder::create`].
    ///
    /// # Errors
    ///
    /// - [`ConfigError::RootNotSet`] for builders made with [`ZipBuilder::new`].
    /// - [`ConfigError::AlreadyBuilt`] on a second call.
    /// - Any entry failure, after the partial archive was deleted.
    pub fn build(&mut self) -> Result<PathBuf, BuildError> {
        let target = self.target.clone().ok_or(ConfigError::RootNotSet)?;
        if self.built {
            return Err(ConfigError::AlreadyBuilt { root: target }.into());
        }
        self.built = true;

        log::debug!(
            "building zip {} with {} entries",
            target.display(),
            self.plan.len()
        );

        let mut trx = Transaction::<Active>::new();
        let file = create_archive_file(&target, &mut trx)?;

        let mut plan = std::mem::replace(&mut self.plan, ArchivePlan::new(String::new()));
        self.plan.naming = plan.naming.take();

        match write_archive(file, plan, &target) {
            Ok(()) => {
                trx.commit();
                Ok(target)
            }
            Err(error) => Err(error.after_rollback(trx.cancel().rollback())),
        }
    }
    /// Writes every queued entry into an archive owned by the caller. Nothing is deleted on
    /// failure.
    pub fn write_into(
        self,
        writer: &mut ZipWriter<File>,
        archive: &Path,
    ) -> Result<(), BuildError> {
        self.plan.replay(writer, archive)
    }
}
impl Default for ZipBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_archive(
    file: File,
    plan: ArchivePlan<ZipWriter<File>>,
    target: &Path,
) -> Result<(), BuildError> {
    let mut writer = ZipWriter::new(file);

    plan.replay(&mut writer, target)?;

    writer.finish().map_err(|source| BuildError::Zip {
        archive: target.to_path_buf(),
        entry: String::new(),
        source,
    })?;

    Ok(())
}

/// Stages `content` in a temporary file and copies it into a new entry.
fn write_staged(
    writer: &mut ZipWriter<File>,
    context: &EntryContext,
    content: &[u8],
    options: SimpleFileOptions,
) -> Result<(), BuildError> {
    // removed by the OS once the handle is dropped
    let mut staged = tempfile::tempfile().map_err(|error| archive_io(context, error))?;
    staged
        .write_all(content)
        .map_err(|error| archive_io(context, error))?;
    staged
        .seek(SeekFrom::Start(0))
        .map_err(|error| archive_io(context, error))?;

    writer
        .start_file(context.full_entry_name(), options)
        .map_err(|source| zip_error(context, source))?;
    io::copy(&mut staged, writer).map_err(|error| archive_io(context, error))?;

    Ok(())
}
