//! Pieces shared by the zip and tar builders: the entry context handed to every queued action,
//! the ordered action list itself, and extraction for archive assertions.

use crate::{
    errors::{BuildError, ConfigError, ExtractError, FileOperation, IoError},
    naming::NamingConfiguration,
    tar_archive::TarCompression,
    transactions::{Active, RollbackOperation, Transaction},
    utils::combine_entry_name,
};
use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};

/// What a queued archive action knows about the entry it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryContext {
    /// The archive file on disk, for error reporting.
    pub archive: PathBuf,
    /// Accumulated directory prefix inside the archive.
    pub prefix: String,
    /// Local entry name, relative to `prefix`.
    pub name: String,
}
impl EntryContext {
    pub fn full_entry_name(&self) -> String {
        combine_entry_name(&self.prefix, &self.name)
    }
    /// Full name with the trailing `/` directory entries carry.
    pub fn directory_entry_name(&self) -> String {
        format!("{}/", self.full_entry_name().trim_end_matches('/'))
    }
}

pub type ArchiveAction<W> = Box<dyn FnOnce(&mut W, &EntryContext) -> Result<(), BuildError>>;

/// Ordered, not yet executed archive actions for one prefix.
pub(crate) struct ArchivePlan<W> {
    pub(crate) prefix: String,
    pending: Vec<(String, ArchiveAction<W>)>,
    pub(crate) naming: Option<NamingConfiguration>,
}
impl<W> ArchivePlan<W> {
    pub(crate) fn new(prefix: String) -> Self {
        Self {
            prefix,
            pending: Vec::new(),
            naming: None,
        }
    }
    pub(crate) fn push(&mut self, name: String, action: ArchiveAction<W>) {
        self.pending.push((name, action));
    }
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
    /// Full entry names in queue order.
    pub(crate) fn entry_names(&self) -> Vec<String> {
        self.pending
            .iter()
            .map(|(name, _)| combine_entry_name(&self.prefix, name))
            .collect()
    }
    pub(crate) fn generate_name(&mut self, extension: &str) -> Result<String, ConfigError> {
        let naming = self
            .naming
            .as_mut()
            .ok_or(ConfigError::NameGeneratorMissing)?;

        Ok(naming.next_name(extension))
    }
    /// Runs every action, in order, against `writer`.
    pub(crate) fn replay(self, writer: &mut W, archive: &Path) -> Result<(), BuildError> {
        for (name, action) in self.pending {
            let context = EntryContext {
                archive: archive.to_path_buf(),
                prefix: self.prefix.clone(),
                name,
            };
            log::debug!(
                "writing entry '{}' into {}",
                context.full_entry_name(),
                archive.display()
            );
            action(writer, &context)?;
        }

        Ok(())
    }
}

/// Creates the archive file and its missing parents, registering both for rollback.
pub(crate) fn create_archive_file(
    path: &Path,
    trx: &mut Transaction<Active>,
) -> Result<File, IoError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        // outermost ancestor that does not exist yet
        let outermost_missing = parent
            .ancestors()
            .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
            .last()
            .map(Path::to_path_buf);

        fs::create_dir_all(parent)
            .map_err(|error| IoError::new(FileOperation::Mkdir, parent.to_path_buf(), error))?;

        if let Some(created) = outermost_missing {
            trx.add_operation(RollbackOperation::RemoveDir(created));
        }
    }

    let file = File::create(path)
        .map_err(|error| IoError::new(FileOperation::Archive, path.to_path_buf(), error))?;
    trx.add_operation(RollbackOperation::RemoveFile(path.to_path_buf()));

    Ok(file)
}

/// Extracts every entry of the zip archive at `archive` into `target`.
pub fn extract_zip(archive: &Path, target: &Path) -> Result<(), ExtractError> {
    log::debug!("extracting {} into {}", archive.display(), target.display());

    let file = File::open(archive)
        .map_err(|error| IoError::new(FileOperation::Extract, archive.to_path_buf(), error))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|source| ExtractError::Zip {
        archive: archive.to_path_buf(),
        source,
    })?;

    zip.extract(target).map_err(|source| ExtractError::Zip {
        archive: archive.to_path_buf(),
        source,
    })
}

/// Extracts every entry of the tar archive at `archive` into `target`.
pub fn extract_tar(
    archive: &Path,
    compression: TarCompression,
    target: &Path,
) -> Result<(), ExtractError> {
    log::debug!(
        "extracting {} ({compression:?}) into {}",
        archive.display(),
        target.display()
    );

    let file = File::open(archive)
        .map_err(|error| IoError::new(FileOperation::Extract, archive.to_path_buf(), error))?;
    let reader: Box<dyn Read> = match compression {
        TarCompression::None => Box::new(file),
        TarCompression::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
        TarCompression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
    };

    tar::Archive::new(reader)
        .unpack(target)
        .map_err(|error| IoError::new(FileOperation::Extract, archive.to_path_buf(), error).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingStrategy;

    #[test]
    fn test_entry_context_names() {
        let context = EntryContext {
            archive: PathBuf::from("a.zip"),
            prefix: "docs/".to_string(),
            name: "guide".to_string(),
        };

        assert_eq!(context.full_entry_name(), "docs/guide");
        assert_eq!(context.directory_entry_name(), "docs/guide/");
    }

    #[test]
    fn test_replay_runs_actions_in_order() {
        let mut plan: ArchivePlan<Vec<String>> = ArchivePlan::new("p".to_string());
        for name in ["c", "a", "b"] {
            plan.push(
                name.to_string(),
                Box::new(|log: &mut Vec<String>, context: &EntryContext| {
                    log.push(context.full_entry_name());
                    Ok(())
                }),
            );
        }
        assert_eq!(plan.entry_names(), vec!["p/c", "p/a", "p/b"]);

        let mut log = Vec::new();
        plan.replay(&mut log, Path::new("x.zip")).unwrap();

        assert_eq!(log, vec!["p/c", "p/a", "p/b"]);
    }

    #[test]
    fn test_replay_stops_at_first_failure() {
        let mut plan: ArchivePlan<Vec<String>> = ArchivePlan::new(String::new());
        plan.push(
            "bad".to_string(),
            Box::new(|_: &mut Vec<String>, context: &EntryContext| {
                Err(BuildError::action(context.full_entry_name(), "nope"))
            }),
        );
        plan.push(
            "never".to_string(),
            Box::new(|log: &mut Vec<String>, _: &EntryContext| {
                log.push("never".to_string());
                Ok(())
            }),
        );

        let mut log = Vec::new();
        let error = plan.replay(&mut log, Path::new("x.zip")).unwrap_err();

        assert!(matches!(error, BuildError::Action { .. }));
        assert!(log.is_empty());
    }

    #[test]
    fn test_create_archive_file_rolls_back_created_parents() {
        let scratch = tempfile::tempdir().unwrap();
        let archive = scratch.path().join("deep/nested/out.zip");

        let mut trx = Transaction::<Active>::new();
        create_archive_file(&archive, &mut trx).unwrap();
        assert!(archive.is_file());

        assert!(trx.cancel().rollback().is_empty());
        assert!(!scratch.path().join("deep").exists());
        assert!(scratch.path().exists());
    }

    #[test]
    fn test_create_archive_file_keeps_existing_parents() {
        let scratch = tempfile::tempdir().unwrap();
        fs::create_dir_all(scratch.path().join("existing")).unwrap();
        let archive = scratch.path().join("existing/out.tar");

        let mut trx = Transaction::<Active>::new();
        create_archive_file(&archive, &mut trx).unwrap();
        assert!(trx.cancel().rollback().is_empty());

        assert!(!archive.exists());
        assert!(scratch.path().join("existing").is_dir());
    }

    #[test]
    fn test_generate_name_requires_naming() {
        let mut plan: ArchivePlan<()> = ArchivePlan::new(String::new());
        assert!(matches!(
            plan.generate_name(".txt"),
            Err(ConfigError::NameGeneratorMissing)
        ));

        plan.naming = Some(NamingConfiguration::new(NamingStrategy::sequential("f")));
        assert_eq!(plan.generate_name(".txt").unwrap(), "f.txt");
    }
}
