// crates/ledger/src/overlay.rs
//! Staged state layers for block execution.
//!
//! An [`OverlayDb`] wraps the persistent state snapshot and accumulates a
//! block's writes; a [`CacheDb`] is the per-transaction scratch on top of
//! it, reset between transactions and merged in only on success. The
//! overlay outlives every cache it spawns.

use crate::address::Address;
use crate::block::DeployCode;
use crate::hash::Hash256;
use crate::store::{cf, StoreError};
use rocksdb::DB;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) const PREFIX_CONTRACT: u8 = 0x01;
pub(crate) const PREFIX_STORAGE: u8 = 0x02;

/// Key of one storage item inside a contract's key space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKey {
    pub contract: Address,
    pub key: Vec<u8>,
}

pub(crate) fn contract_key(addr: &Address) -> Vec<u8> {
    let mut k = Vec::with_capacity(1 + addr.0.len());
    k.push(PREFIX_CONTRACT);
    k.extend_from_slice(&addr.0);
    k
}

pub(crate) fn storage_item_key(key: &StorageKey) -> Vec<u8> {
    let mut k = Vec::with_capacity(1 + key.contract.0.len() + key.key.len());
    k.push(PREFIX_STORAGE);
    k.extend_from_slice(&key.contract.0);
    k.extend_from_slice(&key.key);
    k
}

/// Block-level staging layer over the persistent state column family.
///
/// Read faults do not surface at the call site (the VM API has no channel
/// for them); the first one is recorded and checked by the block-save
/// path, which treats it as fatal for the whole block.
pub struct OverlayDb {
    db: Arc<DB>,
    cf_name: &'static str,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    error: Option<StoreError>,
}

impl OverlayDb {
    pub(crate) fn new(db: Arc<DB>, cf_name: &'static str) -> Self {
        Self {
            db,
            cf_name,
            writes: BTreeMap::new(),
            error: None,
        }
    }

    pub fn get(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(staged) = self.writes.get(key) {
            return staged.clone();
        }
        let handle = match cf(&self.db, self.cf_name) {
            Ok(h) => h,
            Err(e) => {
                self.record(e);
                return None;
            }
        };
        match self.db.get_cf(handle, key) {
            Ok(value) => value,
            Err(e) => {
                self.record(e.into());
                None
            }
        }
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.writes.insert(key, None);
    }

    fn record(&mut self, e: StoreError) {
        if self.error.is_none() {
            self.error = Some(e);
        }
    }

    /// First read fault seen through this overlay, if any.
    pub fn error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<StoreError> {
        self.error.take()
    }

    /// Digest over the accumulated mutations, keyed in sorted order.
    /// Deletions are folded in with a distinct tag.
    pub fn change_hash(&self) -> Hash256 {
        let mut hasher = Sha3_256::new();
        hasher.update(b"STELE-STATE\0");
        for (key, value) in &self.writes {
            hasher.update((key.len() as u32).to_le_bytes());
            hasher.update(key);
            match value {
                Some(v) => {
                    hasher.update([1u8]);
                    hasher.update((v.len() as u32).to_le_bytes());
                    hasher.update(v);
                }
                None => hasher.update([0u8]),
            }
        }
        let out = hasher.finalize();
        let mut h = [0u8; 32];
        h.copy_from_slice(&out);
        Hash256(h)
    }

    pub(crate) fn into_changes(self) -> BTreeMap<Vec<u8>, Option<Vec<u8>>> {
        self.writes
    }
}

/// Per-transaction scratch over the overlay.
pub struct CacheDb<'a> {
    overlay: &'a mut OverlayDb,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> CacheDb<'a> {
    pub fn new(overlay: &'a mut OverlayDb) -> Self {
        Self {
            overlay,
            writes: BTreeMap::new(),
        }
    }

    pub fn get(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(staged) = self.writes.get(key) {
            return staged.clone();
        }
        self.overlay.get(key)
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.writes.insert(key, None);
    }

    /// Discard the transaction's staged writes.
    pub fn reset(&mut self) {
        self.writes.clear();
    }

    /// Merge the transaction's writes into the overlay.
    pub fn commit(&mut self) {
        for (key, value) in std::mem::take(&mut self.writes) {
            match value {
                Some(v) => self.overlay.put(key, v),
                None => self.overlay.delete(key),
            }
        }
    }

    pub fn overlay_error(&mut self) -> Option<StoreError> {
        self.overlay.take_error()
    }

    pub fn get_contract(&mut self, addr: &Address) -> Result<Option<DeployCode>, StoreError> {
        match self.get(&contract_key(addr)) {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_contract(&mut self, addr: &Address, code: &DeployCode) -> Result<(), StoreError> {
        let bytes = bincode::serialize(code)?;
        self.put(contract_key(addr), bytes);
        Ok(())
    }

    pub fn get_storage(&mut self, key: &StorageKey) -> Option<Vec<u8>> {
        self.get(&storage_item_key(key))
    }

    pub fn put_storage(&mut self, key: &StorageKey, value: &[u8]) {
        self.put(storage_item_key(key), value.to_vec());
    }
}
