//! Declarative trees read from TOML.
//!
//! Every top level key is a path relative to the builder's root. Entries default to files;
//! `entries` nests further entries under directories and archives.
//!
//! ```toml
//! ["docs/readme.md"]
//! content = "# hi"
//!
//! ["bundle.tar.gz"]
//! kind = "tar"
//! entries = { "a.txt" = { content = "a" } }
//! ```

use crate::{
    builder::TreeBuilder,
    errors::{FileOperation, IoError, LayoutError},
    tar_archive::{TarBuilder, TarCompression},
    zip_archive::ZipBuilder,
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::{fs, path::Path, str::FromStr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    #[default]
    File,
    Directory,
    Zip,
    Tar,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutEntry {
    #[serde(default)]
    pub kind: LayoutKind,
    pub content: Option<String>,
    /// Tar only. Guessed from the file name when missing.
    pub compression: Option<TarCompression>,
    #[serde(default)]
    pub entries: IndexMap<String, LayoutEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Layout(pub IndexMap<String, LayoutEntry>);
impl Layout {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LayoutError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?;

        toml::from_str(&content).map_err(|source| LayoutError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
    /// Queues every entry on `builder`, in document order.
    pub fn apply(&self, builder: &mut TreeBuilder) -> Result<(), LayoutError> {
        apply_tree(&self.0, builder)
    }
}
impl FromStr for Layout {
    type Err = LayoutError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        toml::from_str(text).map_err(LayoutError::ParseInline)
    }
}

fn content_of(entry: &LayoutEntry) -> Vec<u8> {
    entry
        .content
        .as_deref()
        .map(|content| content.as_bytes().to_vec())
        .unwrap_or_default()
}

fn apply_tree(
    entries: &IndexMap<String, LayoutEntry>,
    builder: &mut TreeBuilder,
) -> Result<(), LayoutError> {
    for (name, entry) in entries {
        let mut outcome = Ok(());

        match entry.kind {
            LayoutKind::File => {
                builder.file(name, content_of(entry));
            }
            LayoutKind::Directory if entry.entries.is_empty() => {
                builder.directory(name);
            }
            LayoutKind::Directory => {
                builder.directory_with(name, |nested| {
                    outcome = apply_tree(&entry.entries, nested);
                });
            }
            LayoutKind::Zip => {
                builder.zip(name, |zip| {
                    outcome = apply_zip(name, &entry.entries, zip);
                });
            }
            LayoutKind::Tar => {
                let compression = entry
                    .compression
                    .unwrap_or_else(|| TarCompression::from_path(Path::new(name)));

                builder.tar(name, compression, |tar| {
                    outcome = apply_tar(name, &entry.entries, tar);
                });
            }
        }

        outcome?;
    }

    Ok(())
}

fn apply_zip(
    archive: &str,
    entries: &IndexMap<String, LayoutEntry>,
    zip: &mut ZipBuilder,
) -> Result<(), LayoutError> {
    for (name, entry) in entries {
        let mut outcome = Ok(());

        match entry.kind {
            LayoutKind::File => {
                zip.file(name.as_str(), content_of(entry));
            }
            LayoutKind::Directory => {
                zip.directory_with(name.as_str(), |nested| {
                    outcome = apply_zip(archive, &entry.entries, nested);
                });
            }
            LayoutKind::Zip | LayoutKind::Tar => {
                return Err(LayoutError::NestedArchive {
                    entry: format!("{archive}/{name}"),
                })
            }
        }

        outcome?;
    }

    Ok(())
}

fn apply_tar(
    archive: &str,
    entries: &IndexMap<String, LayoutEntry>,
    tar: &mut TarBuilder,
) -> Result<(), LayoutError> {
    for (name, entry) in entries {
        let mut outcome = Ok(());

        match entry.kind {
            LayoutKind::File => {
                tar.file(name.as_str(), content_of(entry));
            }
            LayoutKind::Directory => {
                tar.directory_with(name.as_str(), |nested| {
                    outcome = apply_tar(archive, &entry.entries, nested);
                });
            }
            LayoutKind::Zip | LayoutKind::Tar => {
                return Err(LayoutError::NestedArchive {
                    entry: format!("{archive}/{name}"),
                })
            }
        }

        outcome?;
    }

    Ok(())
}
