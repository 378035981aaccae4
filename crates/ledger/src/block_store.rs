// crates/ledger/src/block_store.rs
//! Persistence for blocks, headers, the transaction index, header-index
//! batches and per-block system fees.

use crate::block::{Block, Header, Transaction};
use crate::hash::Hash256;
use crate::store::{cf, clear_column_families, k_height, open_db, BatchCell, StoreError};
use rocksdb::{IteratorMode, DB};
use std::path::Path;

const CF_META: &str = "meta";
const CF_HEADER: &str = "header";
const CF_BLOCK: &str = "block";
const CF_TX: &str = "tx";
const CF_BLOCK_HASH: &str = "block_hash";
const CF_HEADER_INDEX: &str = "header_index";
const CF_SYS_FEE: &str = "sys_fee";
const CFS: &[&str] = &[
    CF_META,
    CF_HEADER,
    CF_BLOCK,
    CF_TX,
    CF_BLOCK_HASH,
    CF_HEADER_INDEX,
    CF_SYS_FEE,
];

const KEY_VERSION: &[u8] = b"version";
const KEY_CURRENT_BLOCK: &[u8] = b"current_block";

pub struct BlockStore {
    db: DB,
    batch: BatchCell,
}

impl BlockStore {
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

    pub fn save_version(&self, version: u8) -> Result<(), StoreError> {
        self.batch
            .put(&self.db, cf(&self.db, CF_META)?, KEY_VERSION, &[version])
    }

    pub fn get_version(&self) -> Result<Option<u8>, StoreError> {
        let value = self.db.get_cf(cf(&self.db, CF_META)?, KEY_VERSION)?;
        Ok(value.and_then(|v| v.first().copied()))
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

    pub fn save_block_hash(&self, height: u32, hash: Hash256) -> Result<(), StoreError> {
        self.batch.put(
            &self.db,
            cf(&self.db, CF_BLOCK_HASH)?,
            &k_height(height),
            &hash.0,
        )
    }

    pub fn get_block_hash(&self, height: u32) -> Result<Option<Hash256>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_BLOCK_HASH)?, k_height(height))? {
            Some(bytes) => {
                let raw: [u8; 32] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::Corrupt(format!("block hash at height {height}")))?;
                Ok(Some(Hash256(raw)))
            }
            None => Ok(None),
        }
    }

    /// Persist the header, the ordered tx-hash list, every transaction
    /// with its including height, and the block's declared fee total.
    pub fn save_block(&self, block: &Block) -> Result<(), StoreError> {
        let hash = block.hash();
        let height = block.header.height;

        let header_bytes = bincode::serialize(&block.header)?;
        self.batch
            .put(&self.db, cf(&self.db, CF_HEADER)?, &hash.0, &header_bytes)?;

        let tx_hashes: Vec<Hash256> = block.transactions.iter().map(|tx| tx.hash()).collect();
        let list_bytes = bincode::serialize(&tx_hashes)?;
        self.batch
            .put(&self.db, cf(&self.db, CF_BLOCK)?, &hash.0, &list_bytes)?;

        let cf_tx = cf(&self.db, CF_TX)?;
        let mut sys_fee = 0u64;
        for tx in &block.transactions {
            let record = bincode::serialize(&(height, tx))?;
            self.batch.put(&self.db, cf_tx, &tx.hash().0, &record)?;
            sys_fee = sys_fee.saturating_add(tx.fee());
        }

        let fee_bytes = bincode::serialize(&sys_fee)?;
        self.batch
            .put(&self.db, cf(&self.db, CF_SYS_FEE)?, &hash.0, &fee_bytes)
    }

    pub fn contain_block(&self, hash: &Hash256) -> Result<bool, StoreError> {
        Ok(self.db.get_cf(cf(&self.db, CF_HEADER)?, hash.0)?.is_some())
    }

    pub fn get_header(&self, hash: &Hash256) -> Result<Option<Header>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_HEADER)?, hash.0)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reassemble the block from its header and per-transaction records.
    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, StoreError> {
        let header = match self.get_header(hash)? {
            Some(h) => h,
            None => return Ok(None),
        };
        let tx_hashes: Vec<Hash256> = match self.db.get_cf(cf(&self.db, CF_BLOCK)?, hash.0)? {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => return Ok(None),
        };
        let mut transactions = Vec::with_capacity(tx_hashes.len());
        for tx_hash in &tx_hashes {
            let (_, tx) = self.get_transaction(tx_hash)?.ok_or_else(|| {
                StoreError::Corrupt(format!("block {hash} references missing tx {tx_hash}"))
            })?;
            transactions.push(tx);
        }
        Ok(Some(Block {
            header,
            transactions,
        }))
    }

    pub fn get_transaction(
        &self,
        tx_hash: &Hash256,
    ) -> Result<Option<(u32, Transaction)>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_TX)?, tx_hash.0)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn contain_transaction(&self, tx_hash: &Hash256) -> Result<bool, StoreError> {
        Ok(self.db.get_cf(cf(&self.db, CF_TX)?, tx_hash.0)?.is_some())
    }

    pub fn get_sys_fee_amount(&self, hash: &Hash256) -> Result<Option<u64>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_SYS_FEE)?, hash.0)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The durably stored header-index prefix, dense from height 0.
    pub fn get_header_index_list(&self) -> Result<Vec<Hash256>, StoreError> {
        let handle = cf(&self.db, CF_HEADER_INDEX)?;
        let mut list: Vec<Hash256> = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (key, value) = item?;
            let raw: [u8; 4] = key
                .as_ref()
                .try_into()
                .map_err(|_| StoreError::Corrupt("header index batch key".into()))?;
            let start = u32::from_be_bytes(raw);
            if start as usize != list.len() {
                return Err(StoreError::Corrupt(format!(
                    "header index batch starts at {start}, expected {}",
                    list.len()
                )));
            }
            let hashes: Vec<Hash256> = bincode::deserialize(&value)?;
            list.extend(hashes);
        }
        Ok(list)
    }

    pub fn save_header_index_list(
        &self,
        start: u32,
        hashes: &[Hash256],
    ) -> Result<(), StoreError> {
        let value = bincode::serialize(&hashes.to_vec())?;
        self.batch.put(
            &self.db,
            cf(&self.db, CF_HEADER_INDEX)?,
            &k_height(start),
            &value,
        )
    }

    pub fn close(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::block::{InvokeCode, TxPayload};

    fn store() -> (BlockStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (BlockStore::open(&dir.path().join("block")).unwrap(), dir)
    }

    fn block_with_tx(height: u32) -> Block {
        let tx = Transaction {
            version: 0,
            nonce: height,
            gas_price: 2,
            gas_limit: 10,
            payer: Address::ZERO,
            payload: TxPayload::Invoke(InvokeCode { code: vec![1, 2] }),
        };
        Block {
            header: Header {
                version: 0,
                prev_block_hash: Hash256::ZERO,
                transactions_root: Block::compute_transactions_root(std::slice::from_ref(&tx)),
                timestamp: height + 1,
                height,
                consensus_payload: Vec::new(),
                next_bookkeeper: Address::ZERO,
                bookkeepers: Vec::new(),
                sig_data: Vec::new(),
            },
            transactions: vec![tx],
        }
    }

    #[test]
    fn block_roundtrip_with_tx_index() {
        let (store, _dir) = store();
        let block = block_with_tx(1);
        let hash = block.hash();
        store.save_block(&block).unwrap();

        assert!(store.contain_block(&hash).unwrap());
        assert_eq!(store.get_block(&hash).unwrap().unwrap(), block);

        let tx_hash = block.transactions[0].hash();
        let (height, tx) = store.get_transaction(&tx_hash).unwrap().unwrap();
        assert_eq!(height, 1);
        assert_eq!(tx, block.transactions[0]);
        assert!(store.contain_transaction(&tx_hash).unwrap());
        assert_eq!(store.get_sys_fee_amount(&hash).unwrap(), Some(20));
    }

    #[test]
    fn staged_writes_are_invisible_until_commit() {
        let (store, _dir) = store();
        store.new_batch();
        store.save_version(1).unwrap();
        assert_eq!(store.get_version().unwrap(), None);
        store.commit_to().unwrap();
        assert_eq!(store.get_version().unwrap(), Some(1));
    }

    #[test]
    fn header_index_batches_must_be_dense() {
        let (store, _dir) = store();
        let hashes: Vec<Hash256> = (0..4u32)
            .map(|i| Hash256::digest(b"h", &i.to_le_bytes()))
            .collect();
        store.save_header_index_list(0, &hashes[..2]).unwrap();
        store.save_header_index_list(2, &hashes[2..]).unwrap();
        assert_eq!(store.get_header_index_list().unwrap(), hashes);

        store
            .save_header_index_list(9, &hashes[..1])
            .unwrap();
        assert!(store.get_header_index_list().is_err());
    }

    #[test]
    fn clear_all_wipes_everything() {
        let (store, _dir) = store();
        let block = block_with_tx(0);
        store.save_block(&block).unwrap();
        store.save_version(1).unwrap();
        store.clear_all().unwrap();
        assert_eq!(store.get_version().unwrap(), None);
        assert!(!store.contain_block(&block.hash()).unwrap());
    }
}
