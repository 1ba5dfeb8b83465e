//! The key-value engine underneath the registry.
//!
//! The registry needs very little from storage: named buckets, byte keys,
//! byte values, and a transaction around each call. [`KvStore`] captures
//! exactly that, and [`RedbStore`] provides it on top of `redb`, an
//! embedded, single-writer / multi-reader ACID database.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use redb::backends::InMemoryBackend;
use redb::{Database, DatabaseError, ReadableTable, TableDefinition, TableError};

/// How often `RedbStore::open` retries while another handle holds the file.
const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Errors raised by the storage engine.
///
/// Each redb error type gets its own variant so nothing about the underlying
/// failure is lost on the way up.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    /// Another handle kept the database file locked for the whole wait.
    #[error("database {} still locked after {waited:?}", .path.display())]
    OpenTimeout { path: PathBuf, waited: Duration },
}

/// A transactional byte store with named buckets.
///
/// Every method is its own transaction: once it returns `Ok`, the change
/// is durable and visible to every later call.
pub trait KvStore: Send + Sync {
    /// Creates `bucket` if it doesn't exist yet.
    fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Returns the value stored under `key`, if any.
    fn get(
        &self,
        bucket: &str,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces the value under `key` with `f(current)`.
    ///
    /// The read and the write happen inside one write transaction, so two
    /// concurrent updates of the same key are serialized and neither is
    /// lost.
    fn update<F>(
        &self,
        bucket: &str,
        key: &[u8],
        f: F,
    ) -> Result<(), StorageError>
    where
        F: FnOnce(Option<&[u8]>) -> Vec<u8>;

    /// Removes every key in `bucket`. The bucket itself stays usable.
    fn delete_all(&self, bucket: &str) -> Result<(), StorageError>;

    /// Releases the engine. Consuming `self` means no call can follow.
    fn close(self) -> Result<(), StorageError>
    where
        Self: Sized;
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

/// [`KvStore`] backed by a `redb` database.
pub struct RedbStore {
    db: Database,
}

fn table(bucket: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(bucket)
}

impl RedbStore {
    /// Opens (or creates) the database file at `path`.
    ///
    /// redb allows one handle per file. If another handle holds it, the
    /// open is retried until `timeout` has elapsed, then fails with
    /// [`StorageError::OpenTimeout`].
    pub fn open(
        path: impl AsRef<Path>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let started = Instant::now();

        loop {
            match Database::create(path) {
                Ok(db) => {
                    tracing::info!(path = %path.display(), "session store opened");
                    return Ok(Self { db });
                }
                Err(DatabaseError::DatabaseAlreadyOpen) => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(StorageError::OpenTimeout {
                            path: path.to_path_buf(),
                            waited: timeout,
                        });
                    }
                    tracing::debug!(
                        path = %path.display(),
                        "session store locked, retrying"
                    );
                    std::thread::sleep(OPEN_RETRY_INTERVAL.min(timeout - waited));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Creates a database that lives only in memory. Nothing survives the
    /// handle being dropped.
    pub fn in_memory() -> Result<Self, StorageError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())?;
        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let txn = self.db.begin_write()?;
        {
            let _ = txn.open_table(table(bucket))?;
        }
        txn.commit()?;
        Ok(())
    }

    fn get(
        &self,
        bucket: &str,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(table(bucket)) {
            Ok(table) => table,
            // A bucket nobody wrote to yet holds nothing.
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn update<F>(
        &self,
        bucket: &str,
        key: &[u8],
        f: F,
    ) -> Result<(), StorageError>
    where
        F: FnOnce(Option<&[u8]>) -> Vec<u8>,
    {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table(bucket))?;
            let current = table.get(key)?.map(|guard| guard.value().to_vec());
            let next = f(current.as_deref());
            table.insert(key, next.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn delete_all(&self, bucket: &str) -> Result<(), StorageError> {
        let txn = self.db.begin_write()?;
        {
            txn.delete_table(table(bucket))?;
            // Recreate it in the same transaction so readers never see the
            // bucket missing.
            let _ = txn.open_table(table(bucket))?;
        }
        txn.commit()?;
        Ok(())
    }

    fn close(self) -> Result<(), StorageError> {
        // redb flushes committed transactions as they commit; dropping the
        // handle releases the file lock.
        drop(self.db);
        tracing::debug!("session store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "test";

    fn store() -> RedbStore {
        let store = RedbStore::in_memory().expect("in-memory store");
        store.ensure_bucket(BUCKET).expect("bucket");
        store
    }

    #[test]
    fn test_get_missing_key_returns_none() {
        let store = store();
        assert_eq!(store.get(BUCKET, b"nope").unwrap(), None);
    }

    #[test]
    fn test_get_missing_bucket_returns_none() {
        let store = RedbStore::in_memory().unwrap();
        assert_eq!(store.get("never-created", b"k").unwrap(), None);
    }

    #[test]
    fn test_update_sees_previous_value() {
        let store = store();

        store
            .update(BUCKET, b"k", |current| {
                assert_eq!(current, None);
                b"one".to_vec()
            })
            .unwrap();
        store
            .update(BUCKET, b"k", |current| {
                let mut next = current.expect("first write visible").to_vec();
                next.extend_from_slice(b"+two");
                next
            })
            .unwrap();

        assert_eq!(store.get(BUCKET, b"k").unwrap(), Some(b"one+two".to_vec()));
    }

    #[test]
    fn test_delete_all_clears_bucket_and_keeps_it_usable() {
        let store = store();
        store.update(BUCKET, b"a", |_| b"1".to_vec()).unwrap();
        store.update(BUCKET, b"b", |_| b"2".to_vec()).unwrap();

        store.delete_all(BUCKET).unwrap();

        assert_eq!(store.get(BUCKET, b"a").unwrap(), None);
        assert_eq!(store.get(BUCKET, b"b").unwrap(), None);
        store.update(BUCKET, b"a", |_| b"3".to_vec()).unwrap();
        assert_eq!(store.get(BUCKET, b"a").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn test_buckets_are_independent() {
        let store = store();
        store.ensure_bucket("other").unwrap();
        store.update(BUCKET, b"k", |_| b"mine".to_vec()).unwrap();

        assert_eq!(store.get("other", b"k").unwrap(), None);

        store.delete_all("other").unwrap();
        assert_eq!(store.get(BUCKET, b"k").unwrap(), Some(b"mine".to_vec()));
    }
}
