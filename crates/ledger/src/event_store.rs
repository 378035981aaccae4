// crates/ledger/src/event_store.rs
//! Persistence for per-transaction execute-notifies and per-block
//! transaction-hash lists. Re-saving the same records writes the same
//! bytes under the same keys, which keeps recovery replay idempotent.

use crate::contract::ExecuteNotify;
use crate::hash::Hash256;
use crate::store::{cf, clear_column_families, k_height, open_db, BatchCell, StoreError};
use rocksdb::DB;
use std::path::Path;

const CF_META: &str = "meta";
const CF_NOTIFY: &str = "notify";
const CF_BLOCK: &str = "block";
const CFS: &[&str] = &[CF_META, CF_NOTIFY, CF_BLOCK];

const KEY_CURRENT_BLOCK: &[u8] = b"current_block";

pub struct EventStore {
    db: DB,
    batch: BatchCell,
}

impl EventStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            db: open_db(path, CFS)?,
            batch: BatchCell::default(),
        })
    }

    pub fn clear_all(&self) -> Result<(), StoreError> {
        clear_column_families(&self.db, CFS)
    }

    pub fn new_batch(&self) {
        self.batch.begin();
    }

    pub fn commit_to(&self) -> Result<(), StoreError> {
        self.batch.commit(&self.db)
    }

    pub fn save_current_block(&self, height: u32, hash: Hash256) -> Result<(), StoreError> {
        let value = bincode::serialize(&(hash, height))?;
        self.batch
            .put(&self.db, cf(&self.db, CF_META)?, KEY_CURRENT_BLOCK, &value)
    }

    pub fn get_current_block(&self) -> Result<Option<(Hash256, u32)>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_META)?, KEY_CURRENT_BLOCK)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_notify(&self, tx_hash: &Hash256, notify: &ExecuteNotify) -> Result<(), StoreError> {
        let value = bincode::serialize(notify)?;
        self.batch
            .put(&self.db, cf(&self.db, CF_NOTIFY)?, &tx_hash.0, &value)
    }

    pub fn get_event_notify_by_tx(
        &self,
        tx_hash: &Hash256,
    ) -> Result<Option<ExecuteNotify>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_NOTIFY)?, tx_hash.0)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_event_notify_by_block(
        &self,
        height: u32,
        tx_hashes: &[Hash256],
    ) -> Result<(), StoreError> {
        let value = bincode::serialize(&tx_hashes.to_vec())?;
        self.batch
            .put(&self.db, cf(&self.db, CF_BLOCK)?, &k_height(height), &value)
    }

    /// Notifies of every executed transaction in the block. Transactions
    /// with no recorded notify (opaque kinds) are skipped.
    pub fn get_event_notify_by_block(
        &self,
        height: u32,
    ) -> Result<Option<Vec<ExecuteNotify>>, StoreError> {
        let tx_hashes: Vec<Hash256> =
            match self.db.get_cf(cf(&self.db, CF_BLOCK)?, k_height(height))? {
                Some(bytes) => bincode::deserialize(&bytes)?,
                None => return Ok(None),
            };
        let mut notifies = Vec::with_capacity(tx_hashes.len());
        for tx_hash in &tx_hashes {
            if let Some(notify) = self.get_event_notify_by_tx(tx_hash)? {
                notifies.push(notify);
            }
        }
        Ok(Some(notifies))
    }

    pub fn close(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}
