// crates/ledger/src/store.rs
//! Shared plumbing for the three rocksdb-backed stores: error type,
//! column-family helpers and the staged write batch each store keeps
//! between `new_batch` and `commit_to`.

use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DBCompressionType, IteratorMode, Options,
              WriteBatch, DB};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),
    #[error("codec error: {0}")]
    Codec(#[from] Box<bincode::ErrorKind>),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("merkle store: {0}")]
    Merkle(#[from] crate::merkle::MerkleError),
    #[error("store corrupt: {0}")]
    Corrupt(String),
}

pub(crate) fn open_db(path: &Path, cfs: &[&str]) -> Result<DB, StoreError> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);
    opts.set_compression_type(DBCompressionType::Lz4);
    let descriptors: Vec<_> = cfs
        .iter()
        .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
        .collect();
    Ok(DB::open_cf_descriptors(&opts, path, descriptors)?)
}

pub(crate) fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily, StoreError> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::Corrupt(format!("column family {name} missing")))
}

#[inline]
pub(crate) fn k_height(h: u32) -> [u8; 4] {
    h.to_be_bytes()
}

pub(crate) fn clear_column_families(db: &DB, cfs: &[&str]) -> Result<(), StoreError> {
    let mut wb = WriteBatch::default();
    for name in cfs {
        let handle = cf(db, name)?;
        for item in db.iterator_cf(handle, IteratorMode::Start) {
            let (key, _) = item?;
            wb.delete_cf(handle, key);
        }
    }
    db.write(wb)?;
    Ok(())
}

/// The per-store pending batch. While open, writes are staged and become
/// visible only at `commit`; without one, writes go straight to the DB.
/// Reads always hit the DB.
#[derive(Default)]
pub(crate) struct BatchCell(Mutex<Option<WriteBatch>>);

impl BatchCell {
    pub fn begin(&self) {
        *self.0.lock() = Some(WriteBatch::default());
    }

    pub fn put(
        &self,
        db: &DB,
        handle: &ColumnFamily,
        key: &[u8],
        value: &[u8],
    ) -> Result<(), StoreError> {
        if let Some(batch) = self.0.lock().as_mut() {
            batch.put_cf(handle, key, value);
            return Ok(());
        }
        db.put_cf(handle, key, value)?;
        Ok(())
    }

    pub fn delete(
        &self,
        db: &DB,
        handle: &ColumnFamily,
        key: &[u8],
    ) -> Result<(), StoreError> {
        if let Some(batch) = self.0.lock().as_mut() {
            batch.delete_cf(handle, key);
            return Ok(());
        }
        db.delete_cf(handle, key)?;
        Ok(())
    }

    pub fn commit(&self, db: &DB) -> Result<(), StoreError> {
        let batch = self
            .0
            .lock()
            .take()
            .ok_or_else(|| StoreError::Corrupt("commit without an open batch".into()))?;
        db.write(batch)?;
        Ok(())
    }
}
