use crate::errors::{FileOperation, IoError};
use std::{fs, io, marker::PhantomData, path::PathBuf};

/// Enum of possible operations to rollback
#[derive(Debug)]
pub enum RollbackOperation {
    RemoveFile(PathBuf),
    RemoveDir(PathBuf),
}
impl RollbackOperation {
    fn undo(self) -> Result<(), IoError> {
        let (path, result) = match self {
            RollbackOperation::RemoveDir(path) => {
                log::debug!("removing dir: {}", path.display());
                let result = fs::remove_dir_all(&path);
                (path, result)
            }
            RollbackOperation::RemoveFile(path) => {
                log::debug!("removing file: {}", path.display());
                let result = fs::remove_file(&path);
                (path, result)
            }
        };

        match result {
            Ok(()) => Ok(()),
            // already gone, nothing to undo
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(IoError::new(FileOperation::Remove, path, error)),
        }
    }
}
/// Active Transaction
pub struct Active;
/// Committed Transaction
pub struct Committed;
/// Canceled Transaction
pub struct Canceled;
/// A trait that tells us if rollback should occur when dropped.
pub trait TransactionState {
    const SHOULD_ROLLBACK: bool;
}
impl TransactionState for Active {
    const SHOULD_ROLLBACK: bool = true;
}
impl TransactionState for Committed {
    const SHOULD_ROLLBACK: bool = false;
}
impl TransactionState for Canceled {
    const SHOULD_ROLLBACK: bool = true;
}
/// Tracks what a build has created so it can be undone.
///
/// An `Active` transaction that is dropped (for example while unwinding from a panic inside a
/// queued action) rolls back on its own, ignoring cleanup errors. The normal failure path is
/// [`Transaction::cancel`] followed by [`Transaction::rollback`], which reports every cleanup
/// step that failed so the caller can attach them to the original error.
///
/// ```rust,ignore
/// let mut trx = Transaction::<Active>::new();
/// trx.add_operation(RollbackOperation::RemoveDir(root.clone()));
/// match run_actions() {
///     Ok(()) => { trx.commit(); }
///     Err(error) => return Err(error.after_rollback(trx.cancel().rollback())),
/// }
/// ```
pub struct Transaction<State: TransactionState> {
    rollback_operations: Vec<RollbackOperation>,
    state: PhantomData<State>,
}
impl Transaction<Active> {
    pub fn new() -> Self {
        Transaction {
            rollback_operations: vec![],
            state: PhantomData,
        }
    }
    /// Registers an operation that undoes something this transaction created.
    pub fn add_operation(&mut self, operation: RollbackOperation) {
        self.rollback_operations.push(operation);
    }
    /// Finalizes the transaction, preventing any rollback from occurring.
    pub fn commit(mut self) -> Transaction<Committed> {
        self.rollback_operations.clear();

        Transaction {
            rollback_operations: vec![],
            state: PhantomData,
        }
    }
    /// Cancels the transaction, preserving the rollback operations.
    pub fn cancel(mut self) -> Transaction<Canceled> {
        let rollback_operations = std::mem::take(&mut self.rollback_operations);

        Transaction {
            rollback_operations,
            state: PhantomData,
        }
    }
}
impl Default for Transaction<Active> {
    fn default() -> Self {
        Self::new()
    }
}
impl Transaction<Canceled> {
    /// Undoes every registered operation, newest first, and returns the steps that failed.
    pub fn rollback(mut self) -> Vec<IoError> {
        log::debug!("rolling back {} operation(s)", self.rollback_operations.len());

        let mut failures = Vec::new();
        while let Some(operation) = self.rollback_operations.pop() {
            if let Err(error) = operation.undo() {
                log::warn!("rollback step failed: {error}");
                failures.push(error);
            }
        }

        failures
    }
}
impl<S: TransactionState> Drop for Transaction<S> {
    fn drop(&mut self) {
        if S::SHOULD_ROLLBACK && !self.rollback_operations.is_empty() {
            log::debug!("transaction dropped with pending operations, rolling back");
            while let Some(operation) = self.rollback_operations.pop() {
                if let Err(error) = operation.undo() {
                    log::warn!("rollback step failed: {error}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_keeps_created_entries() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("kept");
        fs::create_dir(&dir).unwrap();

        let mut trx = Transaction::<Active>::new();
        trx.add_operation(RollbackOperation::RemoveDir(dir.clone()));
        trx.commit();

        assert!(dir.is_dir());
    }

    #[test]
    fn test_rollback_removes_in_reverse_order() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("made");
        let file = dir.join("inside.txt");
        fs::create_dir(&dir).unwrap();
        fs::write(&file, "x").unwrap();

        let mut trx = Transaction::<Active>::new();
        trx.add_operation(RollbackOperation::RemoveDir(dir.clone()));
        trx.add_operation(RollbackOperation::RemoveFile(file.clone()));

        let failures = trx.cancel().rollback();

        assert!(failures.is_empty());
        assert!(!dir.exists());
    }

    #[test]
    fn test_dropping_active_transaction_rolls_back() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("dropped");
        fs::create_dir(&dir).unwrap();

        {
            let mut trx = Transaction::<Active>::new();
            trx.add_operation(RollbackOperation::RemoveDir(dir.clone()));
        }

        assert!(!dir.exists());
    }

    #[test]
    fn test_rollback_ignores_missing_entries() {
        let scratch = tempfile::tempdir().unwrap();

        let mut trx = Transaction::<Active>::new();
        trx.add_operation(RollbackOperation::RemoveFile(scratch.path().join("never")));

        assert!(trx.cancel().rollback().is_empty());
    }
}
