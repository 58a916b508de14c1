use crate::{
    archive::{create_archive_file, ArchivePlan, EntryContext},
    errors::{BuildError, ConfigError, FileOperation, IoError},
    naming::NamingConfiguration,
    transactions::{Active, Transaction},
    utils::combine_entry_name,
};
use serde::Deserialize;
use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

const FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;

/// Outer compression wrapped around a tar stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TarCompression {
    #[default]
    None,
    Gzip,
    Bzip2,
}
impl TarCompression {
    /// Guesses the compression from the file name, falling back to [`TarCompression::None`].
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::Gzip
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") || name.ends_with(".tbz") {
            Self::Bzip2
        } else {
            Self::None
        }
    }
}

/// The byte sink a tar builder writes into.
pub enum TarSink {
    Plain(File),
    Gzip(flate2::write::GzEncoder<File>),
    Bzip2(bzip2::write::BzEncoder<File>),
}
impl TarSink {
    fn new(file: File, compression: TarCompression) -> Self {
        match compression {
            TarCompression::None => Self::Plain(file),
            TarCompression::Gzip => Self::Gzip(flate2::write::GzEncoder::new(
                file,
                flate2::Compression::default(),
            )),
            TarCompression::Bzip2 => Self::Bzip2(bzip2::write::BzEncoder::new(
                file,
                bzip2::Compression::default(),
            )),
        }
    }
    /// Flushes the compressor trailer, if any.
    fn finish(self) -> io::Result<File> {
        match self {
            Self::Plain(file) => Ok(file),
            Self::Gzip(encoder) => encoder.finish(),
            Self::Bzip2(encoder) => encoder.finish(),
        }
    }
}
impl Write for TarSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(file) => file.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
            Self::Bzip2(encoder) => encoder.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(file) => file.flush(),
            Self::Gzip(encoder) => encoder.flush(),
            Self::Bzip2(encoder) => encoder.flush(),
        }
    }
}

pub type TarWriter = tar::Builder<TarSink>;

fn archive_io(context: &EntryContext, error: io::Error) -> BuildError {
    IoError::new(FileOperation::Archive, context.archive.clone(), error).into()
}

/// Queues tar entries and writes them in one pass. Same ownership rules as
/// [`ZipBuilder`](crate::ZipBuilder).
pub struct TarBuilder {
    target: Option<PathBuf>,
    compression: TarCompression,
    plan: ArchivePlan<TarWriter>,
    built: bool,
}
impl TarBuilder {
    pub fn new() -> Self {
        Self {
            target: None,
            compression: TarCompression::None,
            plan: ArchivePlan::new(String::new()),
            built: false,
        }
    }
    pub fn create(path: impl Into<PathBuf>, compression: TarCompression) -> Self {
        Self {
            target: Some(path.into()),
            compression,
            ..Self::new()
        }
    }
    pub fn compression(&self) -> TarCompression {
        self.compression
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
    pub fn entry_names(&self) -> Vec<String> {
        self.plan.entry_names()
    }
    pub fn add<F>(&mut self, name: impl Into<String>, action: F) -> &mut Self
    where
        F: FnOnce(&mut TarWriter, &EntryContext) -> Result<(), BuildError> + 'static,
    {
        self.plan.push(name.into(), Box::new(action));
        self
    }
    /// Content goes straight from memory into the archive.
    pub fn file(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> &mut Self {
        let content = content.into();

        self.add(name, move |writer, context| {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(FILE_MODE);
            header.set_mtime(now_secs());
            header.set_cksum();

            writer
                .append_data(&mut header, context.full_entry_name(), content.as_slice())
                .map_err(|error| archive_io(context, error))
        })
    }
    pub fn text_file(&mut self, name: impl Into<String>, text: &str) -> &mut Self {
        self.file(name, text.as_bytes())
    }
    pub fn empty_file(&mut self, name: impl Into<String>) -> &mut Self {
        self.file(name, Vec::new())
    }
    pub fn directory(&mut self, name: impl Into<String>) -> &mut Self {
        self.add(name, append_directory)
    }
    /// Same semantics as [`ZipBuilder::directory_with`](crate::ZipBuilder::directory_with).
    pub fn directory_with<F>(&mut self, name: impl Into<String>, fill: F) -> &mut Self
    where
        F: FnOnce(&mut TarBuilder),
    {
        let name = name.into();

        let mut nested = TarBuilder {
            target: None,
            compression: self.compression,
            plan: ArchivePlan::new(combine_entry_name(&self.plan.prefix, &name)),
            built: false,
        };
        nested.plan.naming = self.plan.naming.take();
        fill(&mut nested);
        self.plan.naming = nested.plan.naming.take();

        self.add(name, move |writer, context| {
            append_directory(writer, context)?;
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
    /// Writes the archive to the path given to [`TarBuilder::create`], deleting it again if
    /// any entry fails.
    pub fn build(&mut self) -> Result<PathBuf, BuildError> {
        let target = self.target.clone().ok_or(ConfigError::RootNotSet)?;
        if self.built {
            return Err(ConfigError::AlreadyBuilt { root: target }.into());
        }
        self.built = true;

        log::debug!(
            "building tar {} ({:?}) with {} entries",
            target.display(),
            self.compression,
            self.plan.len()
        );

        let mut trx = Transaction::<Active>::new();
        let file = create_archive_file(&target, &mut trx)?;

        let mut plan = std::mem::replace(&mut self.plan, ArchivePlan::new(String::new()));
        self.plan.naming = plan.naming.take();

        match write_archive(TarSink::new(file, self.compression), plan, &target) {
            Ok(()) => {
                trx.commit();
                Ok(target)
            }
            Err(error) => Err(error.after_rollback(trx.cancel().rollback())),
        }
    }
    /// Writes every queued entry into an archive owned by the caller. Nothing is deleted on
    /// failure.
    pub fn write_into(self, writer: &mut TarWriter, archive: &Path) -> Result<(), BuildError> {
        self.plan.replay(writer, archive)
    }
}
impl Default for TarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_archive(
    sink: TarSink,
    plan: ArchivePlan<TarWriter>,
    target: &Path,
) -> Result<(), BuildError> {
    let mut writer = tar::Builder::new(sink);

    plan.replay(&mut writer, target)?;

    writer
        .into_inner()
        .and_then(TarSink::finish)
        .and_then(|mut file| file.flush())
        .map_err(|error| IoError::new(FileOperation::Archive, target.to_path_buf(), error))?;

    Ok(())
}

fn append_directory(writer: &mut TarWriter, context: &EntryContext) -> Result<(), BuildError> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(DIR_MODE);
    header.set_mtime(now_secs());
    header.set_cksum();

    writer
        .append_data(&mut header, context.directory_entry_name(), io::empty())
        .map_err(|error| archive_io(context, error))
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
