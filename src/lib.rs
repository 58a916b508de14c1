//! Declarative temporary file trees and archives for tests.
//!
//! A [`TreeBuilder`] queues files, directories and archives under a root directory and creates
//! them all at once in [`TreeBuilder::build`]. If any step fails, everything created so far is
//! removed again. The resulting [`MaterializedFileSystem`] is checked with a fluent
//! [`FileSystemAssertion`], which also works on the contents of zip and tar archives.
//!
//! ```rust,ignore
//! use fstage::{NamingConfiguration, NamingStrategy, TarCompression, TreeBuilder};
//!
//! let scratch = tempfile::tempdir()?;
//! let fs = TreeBuilder::at(scratch.path().join("fixture"))?
//!     .with_naming(NamingConfiguration::new(NamingStrategy::sequential("report")))
//!     .text_file("README.md", "# fixture")
//!     .zip("bundle.zip", |zip| {
//!         zip.directory_with("docs", |docs| {
//!             docs.text_file("a.md", "a");
//!         });
//!     })
//!     .tar("logs.tar.gz", TarCompression::Gzip, |tar| {
//!         tar.text_file("today.log", "ok");
//!     })
//!     .build()?;
//!
//! fs.should().file_exists("README.md")?.not().exists("missing")?;
//! fs.should_zip("bundle.zip")?.total_file_count("docs", 1)?;
//! ```

pub mod archive;
pub mod assertion;
pub mod builder;
pub mod checks;
pub mod errors;
pub mod layout;
pub mod materialized;
pub mod naming;
pub mod preview;
pub mod tar_archive;
pub mod transactions;
pub mod utils;
pub mod zip_archive;

pub use archive::{extract_tar, extract_zip, EntryContext};
pub use assertion::{AssertionMode, FileSystemAssertion, Normal, Reversed};
pub use builder::{EntryKind, PlannedEntry, TreeBuilder};
pub use checks::{ContentComparison, NamingConvention};
pub use errors::{
    AssertionError, BuildError, ConfigError, ExtractError, FileOperation, IoError, LayoutError,
    PredicateError,
};
pub use layout::{Layout, LayoutEntry, LayoutKind};
pub use materialized::MaterializedFileSystem;
pub use naming::{NamingConfiguration, NamingState, NamingStrategy};
pub use tar_archive::{TarBuilder, TarCompression};
pub use zip_archive::ZipBuilder;
