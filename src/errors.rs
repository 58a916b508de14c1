use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by user supplied predicates and actions.
pub type PredicateError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error, Diagnostic)]
pub enum FileOperation {
    #[error("reading a file")]
    Read,
    #[error("writing a file")]
    Write,
    #[error("creating a directory")]
    Mkdir,
    #[error("removing an entry")]
    Remove,
    #[error("reading metadata")]
    Metadata,
    #[error("writing an archive")]
    Archive,
    #[error("extracting an archive")]
    Extract,
}
#[derive(Debug, Error, Diagnostic)]
#[error("I/O error: {operation} on path '{path}'")]
#[diagnostic(
    code(fstage::io),
    help("Check file permissions, disk space, or that the path is correct.")
)]
pub struct IoError {
    pub operation: FileOperation,
    pub path: std::path::PathBuf,
    #[source]
    pub source: std::io::Error,
}
impl IoError {
    pub fn new(operation: FileOperation, path: std::path::PathBuf, error: std::io::Error) -> Self {
        Self {
            operation,
            path,
            source: error,
        }
    }
}

/// Mistakes in how a builder was set up. These never touch the disk.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("root directory already set to '{root}'")]
    #[diagnostic(
        code(fstage::config::root_already_set),
        help("Call `add_root` once per builder")
    )]
    RootAlreadySet { root: PathBuf },

    #[error("root directory is not set")]
    #[diagnostic(
        code(fstage::config::root_not_set),
        help("Call `add_root` (or use `TreeBuilder::at`) before resolving paths or building")
    )]
    RootNotSet,

    #[error("root directory path is empty")]
    #[diagnostic(code(fstage::config::empty_root))]
    EmptyRoot,

    #[error("no name generator attached to this builder")]
    #[diagnostic(
        code(fstage::config::name_generator_missing),
        help("Attach one with `with_naming(NamingConfiguration::new(..))`")
    )]
    NameGeneratorMissing,

    #[error("builder for '{root}' was already built")]
    #[diagnostic(
        code(fstage::config::already_built),
        help("Builders are single-use, create a new one for another tree")
    )]
    AlreadyBuilt { root: PathBuf },
}

#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error while building")]
    #[diagnostic(code(fstage::build::io))]
    Io(#[from] IoError),

    #[error("zip error on entry '{entry}' of '{archive}'")]
    #[diagnostic(code(fstage::build::zip))]
    Zip {
        archive: PathBuf,
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("action for '{path}' failed")]
    #[diagnostic(code(fstage::build::action))]
    Action {
        path: PathBuf,
        #[source]
        source: PredicateError,
    },

    #[error("build failed and the rollback did not complete")]
    #[diagnostic(
        code(fstage::build::rollback_failed),
        help("Leftover entries may need to be removed by hand")
    )]
    RollbackFailed {
        #[source]
        source: Box<BuildError>,
        #[related]
        cleanup: Vec<IoError>,
    },
}
impl BuildError {
    /// Wraps any error raised by a custom action.
    pub fn action<P, E>(path: P, error: E) -> Self
    where
        P: Into<PathBuf>,
        E: Into<PredicateError>,
    {
        Self::Action {
            path: path.into(),
            source: error.into(),
        }
    }
    /// Keeps `self` as the primary error and attaches rollback failures, if any.
    pub(crate) fn after_rollback(self, cleanup: Vec<IoError>) -> Self {
        if cleanup.is_empty() {
            self
        } else {
            Self::RollbackFailed {
                source: Box::new(self),
                cleanup,
            }
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(fstage::assertion))]
pub struct AssertionError {
    pub message: String,
    #[source]
    pub source: Option<PredicateError>,
}
impl AssertionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
    pub fn inner(error: PredicateError) -> Self {
        Self {
            message: "inner exception".to_string(),
            source: Some(error),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ExtractError {
    #[error("I/O error while extracting")]
    #[diagnostic(code(fstage::extract::io))]
    Io(#[from] IoError),

    #[error("unable to read zip archive '{archive}'")]
    #[diagnostic(code(fstage::extract::zip), help("Make sure the file is a zip archive"))]
    Zip {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

#[derive(Debug, Error, Diagnostic)]
pub enum LayoutError {
    #[error("I/O error within layout domain")]
    #[diagnostic(code(fstage::layout::io))]
    Io(#[from] IoError),

    #[error("Unable to parse layout at '{path}': {source}")]
    #[diagnostic(code(fstage::layout::parse), help("Review toml file"))]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unable to parse layout: {0}")]
    #[diagnostic(code(fstage::layout::parse_inline), help("Review toml text"))]
    ParseInline(#[source] toml::de::Error),

    #[error("archive '{entry}' cannot be placed inside another archive")]
    #[diagnostic(
        code(fstage::layout::nested_archive),
        help("Archives may only contain `file` and `directory` entries")
    )]
    NestedArchive { entry: String },
}
