use crate::{
    errors::{AssertionError, PredicateError},
    materialized::MaterializedFileSystem,
};
use std::{
    fmt,
    marker::PhantomData,
    path::{Path, PathBuf},
};

/// Normal assertion: a predicate holding means success.
pub struct Normal;
/// Reversed assertion: a predicate holding means failure.
pub struct Reversed;
/// A trait that tells an assertion how to read a predicate result.
pub trait AssertionMode {
    const REVERSED: bool;
    /// Inserted into built-in failure messages, `"not "` for reversed assertions.
    const NOT: &'static str;
}
impl AssertionMode for Normal {
    const REVERSED: bool = false;
    const NOT: &'static str = "";
}
impl AssertionMode for Reversed {
    const REVERSED: bool = true;
    const NOT: &'static str = "not ";
}

/// Fluent assertions over a [`MaterializedFileSystem`].
///
/// Every check funnels through [`validate`](Self::validate), so they all fail the same way:
/// an [`AssertionError`] carrying the message, with the predicate's own error as `source`
/// when the predicate could not be evaluated.
///
/// ```rust,ignore
/// fs.should()
///     .file_exists("src/main.rs")?
///     .file_content_equals("README.md", "# demo")?
///     .not()
///     .exists("target")?;
/// ```
pub struct FileSystemAssertion<'fs, M: AssertionMode = Normal> {
    fs: MaterializedFileSystem,
    owner: PhantomData<&'fs MaterializedFileSystem>,
    mode: PhantomData<M>,
}
impl<M: AssertionMode> fmt::Debug for FileSystemAssertion<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemAssertion")
            .field("root", &self.fs.root())
            .field("reversed", &M::REVERSED)
            .finish()
    }
}
impl<'fs> FileSystemAssertion<'fs, Normal> {
    pub fn new(fs: &'fs MaterializedFileSystem) -> Self {
        Self::over(fs, fs.root().to_path_buf())
    }
    /// Assertion over `root`, kept alive by `owner` (used for archive extraction directories).
    pub(crate) fn over(_owner: &'fs MaterializedFileSystem, root: PathBuf) -> Self {
        Self {
            fs: MaterializedFileSystem::view(root),
            owner: PhantomData,
            mode: PhantomData,
        }
    }
    /// The reversed assertion: every check passes exactly when it would fail here.
    pub fn not(&self) -> FileSystemAssertion<'fs, Reversed> {
        self.with_mode()
    }
}
impl<'fs> FileSystemAssertion<'fs, Reversed> {
    /// Back to the normal assertion.
    pub fn no(&self) -> FileSystemAssertion<'fs, Normal> {
        self.with_mode()
    }
}
impl<'fs, M: AssertionMode> FileSystemAssertion<'fs, M> {
    fn with_mode<N: AssertionMode>(&self) -> FileSystemAssertion<'fs, N> {
        FileSystemAssertion {
            fs: MaterializedFileSystem::view(self.fs.root()),
            owner: PhantomData,
            mode: PhantomData,
        }
    }
    pub fn file_system(&self) -> &MaterializedFileSystem {
        &self.fs
    }
    pub fn is_reversed(&self) -> bool {
        M::REVERSED
    }
    /// Evaluates `predicate(relative, file_system)`.
    ///
    /// # Errors
    ///
    /// - `Ok(false)` (or `Ok(true)` when reversed) fails with `message`.
    /// - `Err(e)` fails with an "inner exception" [`AssertionError`] whose source is `e`,
    ///   regardless of the mode.
    pub fn validate<P, F>(
        &self,
        relative: P,
        message: impl Into<String>,
        predicate: F,
    ) -> Result<&Self, AssertionError>
    where
        P: AsRef<Path>,
        F: FnOnce(&Path, &MaterializedFileSystem) -> Result<bool, PredicateError>,
    {
        let relative = relative.as_ref();

        match predicate(relative, &self.fs) {
            Ok(holds) if holds != M::REVERSED => Ok(self),
            Ok(_) => {
                let message = message.into();
                log::debug!("assertion failed on '{}': {message}", relative.display());
                Err(AssertionError::new(message))
            }
            Err(error) => {
                log::debug!(
                    "assertion predicate on '{}' errored: {error}",
                    relative.display()
                );
                Err(AssertionError::inner(error))
            }
        }
    }
    /// Like [`validate`](Self::validate) with the predicate receiving the full path.
    pub(crate) fn check<F>(
        &self,
        relative: &Path,
        message: String,
        predicate: F,
    ) -> Result<&Self, AssertionError>
    where
        F: FnOnce(&Path) -> Result<bool, PredicateError>,
    {
        self.validate(relative, message, |relative, fs| predicate(&fs.path(relative)))
    }
}
