use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{
    pager::{
        cache::{Pager, WriteBack},
        env::{FileLock, StorageEnv},
        page_io,
    },
    types::{
        PageNumber,
        error::{DatabaseError, Result},
    },
};

/// Shared-lock session over one database file. Reads go through the file's
/// shared page cache.
pub struct ReadTransaction {
    env: Arc<StorageEnv>,
    path: PathBuf,
    pager: Arc<Mutex<Pager>>,
    lock: Arc<FileLock>,
    finished: bool,
}

impl ReadTransaction {
    pub fn begin(env: &Arc<StorageEnv>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock = env.file_lock(&path);
        lock.acquire_shared();
        let pager = env.open_pager(&path, None);
        tracing::debug!(path = %path.display(), "read transaction started");
        Ok(Self {
            env: env.clone(),
            path,
            pager,
            lock,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_page(&self, page_number: PageNumber) -> Result<Vec<u8>> {
        if self.finished {
            return Err(ended());
        }
        self.pager.lock().read_page(page_number)
    }

    /// Releases the pager handle and the shared lock.
    pub fn end(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.env.close_pager(&self.path);
        self.lock.release_shared();
        tracing::debug!(path = %self.path.display(), "read transaction ended");
    }

    /// Nothing is buffered by a reader, so there is nothing to discard.
    pub fn abort(&mut self) {}
}

impl Drop for ReadTransaction {
    fn drop(&mut self) {
        self.end();
    }
}

/// Write-back hook bound to one write transaction. An I/O failure poisons the
/// transaction; the next operation on it aborts.
struct TransactionWriteBack {
    aborted: Arc<AtomicBool>,
}

impl WriteBack for TransactionWriteBack {
    fn write_back(&self, path: &Path, page_number: PageNumber, data: &[u8]) {
        if self.aborted.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = page_io::write_page(path, page_number, data) {
            tracing::warn!(
                "write-back of page {} to {} failed, aborting transaction: {}",
                page_number,
                path.display(),
                e
            );
            self.aborted.store(true, Ordering::Release);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Active,
    Aborted,
    Finished,
}

/// Exclusive-lock session over one database file. Writes are buffered in the
/// shared page cache until commit, except for dirty pages the cache evicts.
pub struct WriteTransaction {
    env: Arc<StorageEnv>,
    path: PathBuf,
    pager: Arc<Mutex<Pager>>,
    lock: Arc<FileLock>,
    aborted: Arc<AtomicBool>,
    state: WriteState,
}

impl WriteTransaction {
    pub fn begin(env: &Arc<StorageEnv>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock = env.file_lock(&path);
        lock.acquire_exclusive();
        let aborted = Arc::new(AtomicBool::new(false));
        let hook: Arc<dyn WriteBack> = Arc::new(TransactionWriteBack {
            aborted: aborted.clone(),
        });
        let pager = env.open_pager(&path, Some(hook));
        tracing::debug!(path = %path.display(), "write transaction started");
        Ok(Self {
            env: env.clone(),
            path,
            pager,
            lock,
            aborted,
            state: WriteState::Active,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_aborted(&self) -> bool {
        self.state == WriteState::Aborted || self.aborted.load(Ordering::Acquire)
    }

    pub fn read_page(&self, page_number: PageNumber) -> Result<Vec<u8>> {
        self.check_active()?;
        self.pager.lock().read_page(page_number)
    }

    pub fn write_page(&self, page_number: PageNumber, data: Vec<u8>) -> Result<()> {
        self.check_active()?;
        self.pager.lock().write_page(page_number, data)
    }

    /// Flushes every dirty page. On failure the transaction is aborted
    /// (retrying up to the configured limit) and the flush error returned.
    pub fn commit(&mut self) -> Result<()> {
        self.check_active()?;
        let flushed = self.pager.lock().sync_all().and_then(|()| {
            if self.env.config().sync_on_commit {
                page_io::sync_file(&self.path)
            } else {
                Ok(())
            }
        });

        match flushed {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "write transaction committed");
                self.finish();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "commit failed: {}", e);
                let retries = self.env.config().abort_retry_limit;
                for attempt in 1..=retries {
                    match self.try_abort() {
                        Ok(()) => {
                            self.finish();
                            return Err(e);
                        }
                        Err(abort_err) => {
                            tracing::warn!("abort attempt {} failed: {}", attempt, abort_err);
                        }
                    }
                }
                panic!(
                    "unable to abort transaction on {} after failed commit: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }

    /// Discards every buffered write. Later reads and writes fail with
    /// `TransactionAborted`.
    pub fn abort(&mut self) {
        if self.state != WriteState::Active {
            return;
        }
        if let Err(e) = self.try_abort() {
            tracing::warn!("abort of {} failed: {}", self.path.display(), e);
        }
    }

    /// Ends the transaction, releasing the pager and the exclusive lock.
    /// Call after `commit` or `abort`; an active transaction is aborted first.
    pub fn end(&mut self) {
        if self.state == WriteState::Active {
            self.abort();
        }
        self.finish();
    }

    fn try_abort(&mut self) -> Result<()> {
        self.aborted.store(true, Ordering::Release);
        self.state = WriteState::Aborted;
        let mut pager = self.pager.lock();
        pager.purge();
        if pager.dirty_count() != 0 {
            return Err(DatabaseError::TransactionAborted {
                reason: "dirty pages survived purge".to_string(),
            });
        }
        tracing::warn!(path = %self.path.display(), "write transaction aborted");
        Ok(())
    }

    fn finish(&mut self) {
        if self.state == WriteState::Finished {
            return;
        }
        self.state = WriteState::Finished;
        self.pager.lock().set_write_back(None);
        self.env.close_pager(&self.path);
        self.lock.release_exclusive();
    }

    /// Fails if the transaction ended or aborted. A write-back failure seen
    /// here purges the cache before reporting.
    fn check_active(&self) -> Result<()> {
        match self.state {
            WriteState::Finished => return Err(ended()),
            WriteState::Aborted => {
                return Err(DatabaseError::TransactionAborted {
                    reason: "transaction was aborted".to_string(),
                });
            }
            WriteState::Active => {}
        }
        if self.aborted.load(Ordering::Acquire) {
            self.pager.lock().purge();
            return Err(DatabaseError::TransactionAborted {
                reason: "page write-back failed".to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        self.end();
    }
}

fn ended() -> DatabaseError {
    DatabaseError::TransactionAborted {
        reason: "transaction has ended".to_string(),
    }
}

/// Either kind of transaction, as held by a database session.
pub enum Transaction {
    Read(ReadTransaction),
    Write(WriteTransaction),
}

impl Transaction {
    pub fn is_write(&self) -> bool {
        matches!(self, Transaction::Write(_))
    }

    pub fn path(&self) -> &Path {
        match self {
            Transaction::Read(txn) => txn.path(),
            Transaction::Write(txn) => txn.path(),
        }
    }

    pub fn read_page(&self, page_number: PageNumber) -> Result<Vec<u8>> {
        match self {
            Transaction::Read(txn) => txn.read_page(page_number),
            Transaction::Write(txn) => txn.read_page(page_number),
        }
    }

    /// Panics on a read transaction: a write there is a programming error.
    pub fn write_page(&self, page_number: PageNumber, data: Vec<u8>) -> Result<()> {
        match self {
            Transaction::Read(txn) => panic!(
                "write of page {} through a read transaction on {}",
                page_number,
                txn.path().display()
            ),
            Transaction::Write(txn) => txn.write_page(page_number, data),
        }
    }

    /// Commits a write transaction, or simply ends a read transaction.
    pub fn commit(&mut self) -> Result<()> {
        match self {
            Transaction::Read(txn) => {
                txn.end();
                Ok(())
            }
            Transaction::Write(txn) => {
                let result = txn.commit();
                txn.end();
                result
            }
        }
    }

    pub fn abort(&mut self) {
        match self {
            Transaction::Read(txn) => {
                txn.abort();
                txn.end();
            }
            Transaction::Write(txn) => {
                txn.abort();
                txn.end();
            }
        }
    }
}
