// crates/ledger/src/state_store.rs
//! Persistence for contract state, the bookkeeper committee and the
//! merkle tree of per-block transaction roots, plus the deploy/invoke
//! transaction handlers that mutate state through the overlay layers.

use crate::block::{Block, DeployCode, Transaction, TxPayload};
use crate::bookkeeper::BookkeeperState;
use crate::contract::{
    calc_gas_by_code_len, ContractState, ContractVm, ExecConfig, ExecuteNotify, VmError,
    CONTRACT_CREATE_NAME, DEPLOY_CODE_LEN_NAME,
};
use crate::hash::Hash256;
use crate::merkle::CompactMerkleTree;
use crate::overlay::{contract_key, storage_item_key, CacheDb, OverlayDb, StorageKey};
use crate::store::{cf, clear_column_families, open_db, BatchCell, StoreError};
use parking_lot::Mutex;
use rocksdb::DB;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const CF_META: &str = "meta";
const CF_STATE: &str = "state";
const CFS: &[&str] = &[CF_META, CF_STATE];

const KEY_CURRENT_BLOCK: &[u8] = b"current_block";
const KEY_BOOKKEEPER: &[u8] = b"bookkeeper";
const KEY_MERKLE_STATE: &[u8] = b"merkle_state";
const KEY_SCHEMA_VERSION: &[u8] = b"schema_version";

const SCHEMA_VERSION: u8 = 1;

pub struct StateStore {
    db: Arc<DB>,
    batch: BatchCell,
    merkle: Mutex<CompactMerkleTree>,
}

impl StateStore {
    pub fn open(path: &Path, merkle_path: &Path) -> Result<Self, StoreError> {
        let db = Arc::new(open_db(path, CFS)?);
        let (tree_size, frontier): (u32, Vec<Hash256>) =
            match db.get_cf(cf(&db, CF_META)?, KEY_MERKLE_STATE)? {
                Some(bytes) => bincode::deserialize(&bytes)?,
                None => (0, Vec::new()),
            };
        let merkle = CompactMerkleTree::open(merkle_path, tree_size, frontier)?;
        Ok(Self {
            db,
            batch: BatchCell::default(),
            merkle: Mutex::new(merkle),
        })
    }

    pub fn clear_all(&self) -> Result<(), StoreError> {
        clear_column_families(&self.db, CFS)?;
        self.merkle.lock().reset()?;
        Ok(())
    }

    pub fn new_batch(&self) {
        self.batch.begin();
    }

    /// Node-file writes are made durable before the KV batch lands, so a
    /// crash in between leaves at worst surplus file nodes (truncated on
    /// the next open).
    pub fn commit_to(&self) -> Result<(), StoreError> {
        self.merkle.lock().sync()?;
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

    pub fn save_bookkeeper_state(&self, state: &BookkeeperState) -> Result<(), StoreError> {
        let value = bincode::serialize(state)?;
        self.batch
            .put(&self.db, cf(&self.db, CF_META)?, KEY_BOOKKEEPER, &value)
    }

    pub fn get_bookkeeper_state(&self) -> Result<Option<BookkeeperState>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_META)?, KEY_BOOKKEEPER)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Committed contract record (overlay writes excluded).
    pub fn get_contract_state(&self, addr: &crate::address::Address) -> Result<Option<DeployCode>, StoreError> {
        match self.db.get_cf(cf(&self.db, CF_STATE)?, contract_key(addr))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Committed storage item (overlay writes excluded).
    pub fn get_storage_item(&self, key: &StorageKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .db
            .get_cf(cf(&self.db, CF_STATE)?, storage_item_key(key))?)
    }

    /// Append a block's transaction root and stage the tree bookkeeping
    /// into the pending batch.
    pub fn add_merkle_tree_root(&self, tx_root: Hash256) -> Result<(), StoreError> {
        let mut tree = self.merkle.lock();
        tree.append(tx_root)?;
        let value = bincode::serialize(&(tree.tree_size(), tree.frontier().to_vec()))?;
        self.batch
            .put(&self.db, cf(&self.db, CF_META)?, KEY_MERKLE_STATE, &value)
    }

    /// Audit path for the tx root at `proof_height` relative to the tree
    /// formed by roots `0..=root_height`.
    pub fn get_merkle_proof(
        &self,
        proof_height: u32,
        root_height: u32,
    ) -> Result<Vec<Hash256>, StoreError> {
        Ok(self
            .merkle
            .lock()
            .inclusion_proof(proof_height, root_height + 1)?)
    }

    /// Block root the tree would commit to after appending `tx_root`.
    pub fn get_block_root_with_new_tx_root(&self, tx_root: Hash256) -> Hash256 {
        self.merkle.lock().root_with_new_leaf(tx_root)
    }

    pub fn new_overlay_db(&self) -> OverlayDb {
        OverlayDb::new(Arc::clone(&self.db), CF_STATE)
    }

    /// Move a block's accumulated state writes into the pending batch.
    pub fn merge_overlay(&self, overlay: OverlayDb) -> Result<(), StoreError> {
        let handle = cf(&self.db, CF_STATE)?;
        for (key, value) in overlay.into_changes() {
            match value {
                Some(v) => self.batch.put(&self.db, handle, &key, &v)?,
                None => self.batch.delete(&self.db, handle, &key)?,
            }
        }
        Ok(())
    }

    /// Deploy: store the contract under its code address. Re-deploying an
    /// existing contract is a no-op; the notify still reports success with
    /// the synthetic deploy gas.
    pub fn handle_deploy_transaction(
        &self,
        gas_table: &BTreeMap<String, u64>,
        cache: &mut CacheDb<'_>,
        tx: &Transaction,
        _block: &Block,
        notify: &mut ExecuteNotify,
    ) -> Result<(), VmError> {
        let deploy = match &tx.payload {
            TxPayload::Deploy(d) => d,
            _ => return Err(VmError::NotExecutable),
        };
        let addr = deploy.address();
        if cache
            .get_contract(&addr)
            .map_err(|e| VmError::Fault(e.to_string()))?
            .is_none()
        {
            cache
                .put_contract(&addr, deploy)
                .map_err(|e| VmError::Fault(e.to_string()))?;
        }
        cache.commit();

        let create_gas = gas_table.get(CONTRACT_CREATE_NAME).copied().unwrap_or(0);
        let len_factor = gas_table.get(DEPLOY_CODE_LEN_NAME).copied().unwrap_or(0);
        notify.state = ContractState::Success;
        notify.gas_consumed =
            create_gas.saturating_add(calc_gas_by_code_len(deploy.code.len(), len_factor));
        Ok(())
    }

    /// Invoke: run the code through the VM with the transaction's gas
    /// limit. The cache is merged only on success.
    pub fn handle_invoke_transaction(
        &self,
        vm: &dyn ContractVm,
        cache: &mut CacheDb<'_>,
        tx: &Transaction,
        block: &Block,
        notify: &mut ExecuteNotify,
    ) -> Result<(), VmError> {
        let invoke = match &tx.payload {
            TxPayload::Invoke(i) => i,
            _ => return Err(VmError::NotExecutable),
        };
        let cfg = ExecConfig {
            time: block.header.timestamp,
            height: block.header.height,
            block_hash: block.hash(),
            tx_hash: tx.hash(),
            pre_exec: false,
        };
        let mut gas = tx.gas_limit;
        let mut events = Vec::new();
        vm.invoke(&cfg, cache, &invoke.code, &mut gas, &mut events)?;
        cache.commit();

        notify.state = ContractState::Success;
        notify.gas_consumed = tx.gas_limit.saturating_sub(gas);
        notify.notify = events;
        Ok(())
    }

    /// Check and repair lingering schema incompatibilities: stamp the
    /// schema version on first use, refuse a newer one, and make sure the
    /// merkle tree tracks the committed tip.
    pub fn check_storage(&self) -> Result<(), StoreError> {
        let handle = cf(&self.db, CF_META)?;
        match self.db.get_cf(handle, KEY_SCHEMA_VERSION)? {
            None => self.db.put_cf(handle, KEY_SCHEMA_VERSION, [SCHEMA_VERSION])?,
            Some(v) if v.first() == Some(&SCHEMA_VERSION) => {}
            Some(v) => {
                return Err(StoreError::Corrupt(format!(
                    "state schema version {:?} is newer than supported {SCHEMA_VERSION}",
                    v.first()
                )))
            }
        }
        if let Some((_, height)) = self.get_current_block()? {
            let tree_size = self.merkle.lock().tree_size();
            if tree_size != height + 1 {
                return Err(StoreError::Corrupt(format!(
                    "merkle tree has {tree_size} roots for tip height {height}"
                )));
            }
        }
        Ok(())
    }

    pub fn close(&self) -> Result<(), StoreError> {
        self.merkle.lock().sync()?;
        self.db.flush()?;
        Ok(())
    }
}
