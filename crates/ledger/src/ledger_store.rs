// crates/ledger/src/ledger_store.rs
//! The ledger coordinator: admits headers, saves blocks through the three
//! stores as one crash-consistent commit unit, and recovers from partial
//! shutdowns.
//!
//! Commit order is block store, then event store, then state store. The
//! event store is idempotent under re-save, so recovery can always replay
//! forward from the state store's tip: a crash anywhere between the three
//! commits leaves the block store ahead and the state store behind, never
//! the other way around.

use crate::address::Address;
use crate::block::{Block, Header, Transaction, TxType};
use crate::bookkeeper::BookkeeperState;
use crate::block_store::BlockStore;
use crate::codec::{serialize_param_names, CodecError, Params};
use crate::config::LedgerConfig;
use crate::contract::{
    calc_gas_by_code_len, ContractState, ContractVm, ExecConfig, ExecuteNotify, PreExecResult,
    VmError, CONTRACT_CREATE_NAME, DEPLOY_CODE_LEN_NAME, GET_GLOBAL_PARAM_METHOD,
    GLOBAL_PARAMS_ADDRESS, INVOKE_CODE_LEN_NAME, MIN_TRANSACTION_GAS,
};
use crate::event_store::EventStore;
use crate::events::{LedgerEventPublisher, SaveBlockCompleteMsg};
use crate::hash::{to_lower_hex, Hash256};
use crate::keys::{sort_public_keys, PublicKey};
use crate::multisig::{quorum, verify_multi_signature, MultisigError};
use crate::overlay::{CacheDb, StorageKey};
use crate::state_store::StateStore;
use crate::store::StoreError;
use crate::vbft::{peer_map, vbft_block_info, VbftError};
use log::{debug, error, info};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Version byte whose presence in the block store marks an installed
/// genesis.
pub const SYSTEM_VERSION: u8 = 0x01;
/// Flush cadence of the durable header index.
pub const HEADER_INDEX_BATCH_SIZE: u32 = 2000;

pub const DIR_BLOCK: &str = "block";
pub const DIR_STATE: &str = "states";
pub const DIR_EVENT: &str = "ledgerevent";
pub const MERKLE_TREE_STORE_PATH: &str = "merkle_tree.db";

/// Protocol violations found while verifying a header. The store is never
/// touched when one of these is reported.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("cannot find previous header {0}")]
    UnknownPrevHeader(Hash256),
    #[error("header height {next} does not follow previous height {prev}")]
    HeightLink { prev: u32, next: u32 },
    #[error("header timestamp {got} is not after previous {prev}")]
    Timestamp { prev: u32, got: u32 },
    #[error("header carries no bookkeepers")]
    NoBookkeepers,
    #[error("bookkeeper {0} not in current peer set")]
    UnknownBookkeeper(String),
    #[error("bookkeeper address does not match previous next_bookkeeper")]
    NextBookkeeperMismatch,
    #[error(transparent)]
    Multisig(#[from] MultisigError),
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("header verification: {0}")]
    Verify(#[from] VerifyError),
    #[error("vm: {0}")]
    Vm(#[from] VmError),
    #[error("codec: {0}")]
    Codec(#[from] CodecError),
    #[error("consensus payload: {0}")]
    Vbft(#[from] VbftError),
    #[error("execute tx {tx}: {source}")]
    TxExecution { tx: Hash256, source: StoreError },
    #[error("header height {got} not equal next header height {want}")]
    HeaderHeightMismatch { got: u32, want: u32 },
    #[error("block height {got} not equal next block height {want}")]
    BlockHeightMismatch { got: u32, want: u32 },
    #[error("genesis block is not the one this store was initialized with")]
    GenesisMismatch,
    #[error("global param {name} is not a u64: {value}")]
    BadGlobalParam { name: String, value: String },
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Everything guarded by the coordinator's read-write lock. Lock hold
/// times are short and never span store I/O.
#[derive(Default)]
struct LedgerState {
    stored_index_count: u32,
    curr_block_height: u32,
    curr_block_hash: Hash256,
    /// Headers admitted but whose blocks are not yet persisted.
    header_cache: HashMap<Hash256, Header>,
    /// Dense `height -> block hash` for all admitted heights.
    header_index: HashMap<u32, Hash256>,
    /// Peer set for header admission (may run ahead of blocks).
    vbft_peer_info_header: HashMap<String, u32>,
    /// Peer set contemporaneous with block execution.
    vbft_peer_info_block: HashMap<String, u32>,
}

pub struct Ledger {
    block_store: BlockStore,
    state_store: StateStore,
    event_store: EventStore,
    config: LedgerConfig,
    vm: Arc<dyn ContractVm>,
    publisher: Option<Arc<LedgerEventPublisher>>,
    /// Protocol gas parameters, refreshed at every non-genesis block save.
    gas_table: RwLock<BTreeMap<String, u64>>,
    state: RwLock<LedgerState>,
    saving_block: AtomicBool,
}

/// Clears the single-flight flag when the save path unwinds.
struct SaveGuard<'a>(&'a AtomicBool);

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Ledger {
    /// Construct the three sub-stores under `data_dir`. The contract VM
    /// and the optional event publisher are explicit dependencies; there
    /// are no process-wide singletons.
    pub fn open(
        data_dir: &Path,
        config: LedgerConfig,
        vm: Arc<dyn ContractVm>,
        publisher: Option<Arc<LedgerEventPublisher>>,
    ) -> Result<Ledger, LedgerError> {
        let block_store = BlockStore::open(&data_dir.join(DIR_BLOCK))?;
        let states_dir = data_dir.join(DIR_STATE);
        let state_store = StateStore::open(&states_dir, &states_dir.join(MERKLE_TREE_STORE_PATH))?;
        let event_store = EventStore::open(&data_dir.join(DIR_EVENT))?;
        Ok(Ledger {
            block_store,
            state_store,
            event_store,
            config,
            vm,
            publisher,
            gas_table: RwLock::new(BTreeMap::new()),
            state: RwLock::new(LedgerState::default()),
            saving_block: AtomicBool::new(false),
        })
    }

    /// First operation after `open`. Installs the genesis block on a
    /// fresh store, or verifies it and recovers the tip on an existing
    /// one. Under VBFT, also loads the active chain config into both peer
    /// sets.
    pub fn init_with_genesis(
        &self,
        genesis: &Block,
        default_bookkeepers: &[PublicKey],
    ) -> Result<(), LedgerError> {
        if !self.has_already_init_genesis()? {
            self.block_store.clear_all()?;
            self.state_store.clear_all()?;
            self.event_store.clear_all()?;

            let sorted = sort_public_keys(default_bookkeepers.to_vec());
            self.state_store.save_bookkeeper_state(&BookkeeperState {
                curr_bookkeeper: sorted.clone(),
                next_bookkeeper: sorted,
            })?;
            self.save_block(genesis)?;
            self.block_store.save_version(SYSTEM_VERSION)?;
            info!("genesis block installed, hash {}", genesis.hash());
        } else {
            if !self.block_store.contain_block(&genesis.hash())? {
                return Err(LedgerError::GenesisMismatch);
            }
            self.init()?;
        }

        if self.config.consensus.is_vbft() {
            self.load_active_chain_config()?;
        }

        // check and fix incompatible states left by earlier releases
        self.state_store.check_storage()?;
        Ok(())
    }

    fn has_already_init_genesis(&self) -> Result<bool, LedgerError> {
        Ok(self.block_store.get_version()? == Some(SYSTEM_VERSION))
    }

    /// The active config is the one in the tip block, or the one the tip's
    /// `last_config_block_num` points at.
    fn load_active_chain_config(&self) -> Result<(), LedgerError> {
        let height = self.get_current_block_height();
        let block = self
            .get_block_by_height(height)?
            .ok_or_else(|| LedgerError::Fatal(format!("missing tip block at height {height}")))?;
        let info = vbft_block_info(&block.header)?;
        let cfg = match info.new_chain_config {
            Some(cfg) => cfg,
            None => {
                let cfg_block = self.get_block_by_height(info.last_config_block_num)?.ok_or_else(
                    || {
                        LedgerError::Fatal(format!(
                            "missing config block at height {}",
                            info.last_config_block_num
                        ))
                    },
                )?;
                vbft_block_info(&cfg_block.header)?
                    .new_chain_config
                    .ok_or_else(|| {
                        LedgerError::Fatal(format!(
                            "no chain config at block {}",
                            info.last_config_block_num
                        ))
                    })?
            }
        };
        let peers = peer_map(&cfg);
        let mut st = self.state.write();
        st.vbft_peer_info_header = peers.clone();
        st.vbft_peer_info_block = peers;
        Ok(())
    }

    /// Recovery after an unclean shutdown: the block store is the
    /// authoritative tip; the header index is rebuilt, then the state and
    /// event stores are replayed forward to the tip.
    fn init(&self) -> Result<(), LedgerError> {
        self.init_current_block()?;
        self.init_header_index_list()?;
        self.init_store()?;
        Ok(())
    }

    fn init_current_block(&self) -> Result<(), LedgerError> {
        let (hash, height) = self
            .block_store
            .get_current_block()?
            .ok_or_else(|| LedgerError::Fatal("block store has no current block".into()))?;
        info!("init current block: height {height} hash {hash}");
        let mut st = self.state.write();
        st.curr_block_hash = hash;
        st.curr_block_height = height;
        Ok(())
    }

    fn init_header_index_list(&self) -> Result<(), LedgerError> {
        let curr_height = self.get_current_block_height();
        let stored = self.block_store.get_header_index_list()?;
        let stored_count = stored.len() as u32;
        {
            let mut st = self.state.write();
            st.stored_index_count = stored_count;
            st.header_index = stored
                .into_iter()
                .enumerate()
                .map(|(h, hash)| (h as u32, hash))
                .collect();
        }
        for height in stored_count..=curr_height {
            let hash = self.block_store.get_block_hash(height)?.ok_or_else(|| {
                LedgerError::Fatal(format!("no block hash below tip at height {height}"))
            })?;
            if hash.is_zero() {
                return Err(LedgerError::Fatal(format!(
                    "zero block hash below tip at height {height}"
                )));
            }
            self.state.write().header_index.insert(height, hash);
        }
        Ok(())
    }

    /// Replay every block the state store has not committed yet. Events
    /// commit before state: the event store tolerates re-saves, the
    /// forward replay does not tolerate state running ahead.
    fn init_store(&self) -> Result<(), LedgerError> {
        let block_height = self.get_current_block_height();
        let state_height = match self.state_store.get_current_block()? {
            Some((_, height)) => height,
            None => {
                return Err(LedgerError::Fatal(
                    "state store has no current block".into(),
                ))
            }
        };
        for prev in state_height..block_height {
            let height = prev + 1;
            let hash = self.block_store.get_block_hash(height)?.ok_or_else(|| {
                LedgerError::Fatal(format!("no block hash for replay at height {height}"))
            })?;
            let block = self.block_store.get_block(&hash)?.ok_or_else(|| {
                LedgerError::Fatal(format!("no block for replay at height {height}"))
            })?;
            self.event_store.new_batch();
            self.state_store.new_batch();
            self.save_block_to_state_store(&block)?;
            self.save_block_to_event_store(&block)?;
            self.event_store.commit_to()?;
            self.state_store.commit_to()?;
        }
        Ok(())
    }

    /// Verify `header` against the peer set `peers`. Returns the
    /// replacement peer set when the header carries a new chain config.
    /// Genesis verification is a no-op.
    fn verify_header(
        &self,
        header: &Header,
        peers: &HashMap<String, u32>,
    ) -> Result<Option<HashMap<String, u32>>, LedgerError> {
        if header.height == 0 {
            return Ok(None);
        }
        let prev = self
            .get_header_by_hash(&header.prev_block_hash)?
            .ok_or(VerifyError::UnknownPrevHeader(header.prev_block_hash))?;
        if prev.height + 1 != header.height {
            return Err(VerifyError::HeightLink {
                prev: prev.height,
                next: header.height,
            }
            .into());
        }
        if prev.timestamp >= header.timestamp {
            return Err(VerifyError::Timestamp {
                prev: prev.timestamp,
                got: header.timestamp,
            }
            .into());
        }
        if header.bookkeepers.is_empty() {
            return Err(VerifyError::NoBookkeepers.into());
        }
        let m = quorum(header.bookkeepers.len());
        let hash = header.hash();

        if self.config.consensus.is_vbft() {
            for key in &header.bookkeepers {
                let id = key.peer_id();
                if !peers.contains_key(&id) {
                    error!("invalid bookkeeper {id} at height {}", header.height);
                    return Err(VerifyError::UnknownBookkeeper(id).into());
                }
            }
            verify_multi_signature(hash.as_bytes(), &header.bookkeepers, m, &header.sig_data)
                .map_err(|e| {
                    error!(
                        "multisig failed at height {}: {e}, bookkeepers {}, peers {}",
                        header.height,
                        header.bookkeepers.len(),
                        peers.len()
                    );
                    VerifyError::from(e)
                })?;
            let info = vbft_block_info(header)?;
            if let Some(cfg) = info.new_chain_config {
                return Ok(Some(peer_map(&cfg)));
            }
            Ok(None)
        } else {
            let address = Address::from_bookkeepers(&header.bookkeepers);
            if prev.next_bookkeeper != address {
                return Err(VerifyError::NextBookkeeperMismatch.into());
            }
            verify_multi_signature(hash.as_bytes(), &header.bookkeepers, m, &header.sig_data)
                .map_err(VerifyError::from)?;
            Ok(None)
        }
    }

    /// Admit a header ahead of its block. Requires exactly the next
    /// header height.
    pub fn add_header(&self, header: Header) -> Result<(), LedgerError> {
        let next = self.get_current_header_height() + 1;
        if header.height != next {
            return Err(LedgerError::HeaderHeightMismatch {
                got: header.height,
                want: next,
            });
        }
        let peers = self.state.read().vbft_peer_info_header.clone();
        let updated = self.verify_header(&header, &peers)?;

        let hash = header.hash();
        let height = header.height;
        let mut st = self.state.write();
        if let Some(peers) = updated {
            st.vbft_peer_info_header = peers;
        }
        st.header_cache.insert(hash, header);
        st.header_index.insert(height, hash);
        Ok(())
    }

    /// Batch admission, lowest height first; stops at the first failure.
    pub fn add_headers(&self, mut headers: Vec<Header>) -> Result<(), LedgerError> {
        headers.sort_by_key(|h| h.height);
        for header in headers {
            self.add_header(header)?;
        }
        Ok(())
    }

    /// Append the next block: re-verify its header against the block peer
    /// set, execute, and commit all three stores. A block at or below the
    /// tip is silently accepted; a gap is an error.
    pub fn add_block(&self, block: Block) -> Result<(), LedgerError> {
        let curr = self.get_current_block_height();
        let height = block.header.height;
        if height <= curr {
            return Ok(());
        }
        if height != curr + 1 {
            return Err(LedgerError::BlockHeightMismatch {
                got: height,
                want: curr + 1,
            });
        }
        let peers = self.state.read().vbft_peer_info_block.clone();
        let updated = self.verify_header(&block.header, &peers)?;
        if let Some(peers) = updated {
            self.state.write().vbft_peer_info_block = peers;
        }

        self.save_block(&block)?;
        self.state.write().header_cache.remove(&block.hash());
        Ok(())
    }

    fn save_block_to_block_store(&self, block: &Block) -> Result<(), LedgerError> {
        let hash = block.hash();
        let height = block.header.height;

        self.state.write().header_index.insert(height, hash);
        self.save_header_index_list()?;
        self.block_store.save_current_block(height, hash)?;
        self.block_store.save_block_hash(height, hash)?;
        self.block_store.save_block(block)?;
        Ok(())
    }

    fn save_block_to_state_store(&self, block: &Block) -> Result<(), LedgerError> {
        let hash = block.hash();
        let height = block.header.height;

        if height != 0 {
            self.refresh_global_param(block)?;
        }

        let mut overlay = self.state_store.new_overlay_db();
        {
            let mut cache = CacheDb::new(&mut overlay);
            for tx in &block.transactions {
                cache.reset();
                self.handle_transaction(&mut cache, block, tx)?;
            }
        }

        self.state_store
            .add_merkle_tree_root(block.header.transactions_root)?;
        self.state_store.save_current_block(height, hash)?;

        debug!(
            "state transition hash of block {height} is {}",
            overlay.change_hash()
        );
        self.state_store.merge_overlay(overlay)?;
        Ok(())
    }

    fn save_block_to_event_store(&self, block: &Block) -> Result<(), LedgerError> {
        let hash = block.hash();
        let height = block.header.height;

        let tx_hashes: Vec<Hash256> = block.transactions.iter().map(|tx| tx.hash()).collect();
        if !tx_hashes.is_empty() {
            self.event_store
                .save_event_notify_by_block(height, &tx_hashes)?;
        }
        self.event_store.save_current_block(height, hash)?;
        Ok(())
    }

    /// Execute the smart contract and commit the block to all stores.
    /// Single-flight: a save already in progress makes this a no-op.
    fn save_block(&self, block: &Block) -> Result<(), LedgerError> {
        let hash = block.hash();
        let height = block.header.height;
        if self
            .saving_block
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // already saving or saved by a concurrent caller
            return Ok(());
        }
        let _guard = SaveGuard(&self.saving_block);
        if height > 0 && height != self.get_current_block_height() + 1 {
            return Ok(());
        }

        self.block_store.new_batch();
        self.state_store.new_batch();
        self.event_store.new_batch();
        self.save_block_to_block_store(block)?;
        self.save_block_to_state_store(block)?;
        self.save_block_to_event_store(block)?;

        self.block_store.commit_to()?;
        // the event store is idempotent under the recovery replay, so it
        // commits before the state store
        self.event_store.commit_to()?;
        self.state_store.commit_to()?;

        {
            let mut st = self.state.write();
            st.curr_block_hash = hash;
            st.curr_block_height = height;
        }

        if let Some(publisher) = &self.publisher {
            publisher.publish(SaveBlockCompleteMsg {
                block: Arc::new(block.clone()),
            });
        }
        Ok(())
    }

    fn handle_transaction(
        &self,
        cache: &mut CacheDb<'_>,
        block: &Block,
        tx: &Transaction,
    ) -> Result<(), LedgerError> {
        let tx_hash = tx.hash();
        let mut notify = ExecuteNotify::fail(tx_hash);
        match tx.tx_type() {
            TxType::Deploy => {
                let gas_table = self.gas_table.read().clone();
                let result = self.state_store.handle_deploy_transaction(
                    &gas_table,
                    cache,
                    tx,
                    block,
                    &mut notify,
                );
                if let Some(source) = cache.overlay_error() {
                    return Err(LedgerError::TxExecution { tx: tx_hash, source });
                }
                if let Err(e) = result {
                    debug!("deploy tx {tx_hash} failed: {e}");
                }
                self.event_store.save_notify(&tx_hash, &notify)?;
            }
            TxType::Invoke => {
                let result = self.state_store.handle_invoke_transaction(
                    self.vm.as_ref(),
                    cache,
                    tx,
                    block,
                    &mut notify,
                );
                if let Some(source) = cache.overlay_error() {
                    return Err(LedgerError::TxExecution { tx: tx_hash, source });
                }
                if let Err(e) = result {
                    debug!("invoke tx {tx_hash} failed: {e}");
                }
                self.event_store.save_notify(&tx_hash, &notify)?;
            }
            TxType::Opaque => {}
        }
        Ok(())
    }

    /// Flush a full header-index batch once the tip is a whole batch past
    /// the durable prefix. Snapshot under the read lock, write unlocked,
    /// then advance the counter under the write lock.
    fn save_header_index_list(&self) -> Result<(), LedgerError> {
        let (start, slice) = {
            let st = self.state.read();
            if st.curr_block_height - st.stored_index_count < HEADER_INDEX_BATCH_SIZE {
                return Ok(());
            }
            let mut slice = Vec::with_capacity(HEADER_INDEX_BATCH_SIZE as usize);
            for i in 0..HEADER_INDEX_BATCH_SIZE {
                let height = st.stored_index_count + i;
                let hash = st.header_index.get(&height).copied().ok_or_else(|| {
                    LedgerError::Fatal(format!("header index missing height {height}"))
                })?;
                slice.push(hash);
            }
            (st.stored_index_count, slice)
        };

        self.block_store.save_header_index_list(start, &slice)?;

        self.state.write().stored_index_count += HEADER_INDEX_BATCH_SIZE;
        Ok(())
    }

    fn refresh_global_param(&self, block: &Block) -> Result<(), LedgerError> {
        let cfg = ExecConfig {
            time: block.header.timestamp,
            height: block.header.height,
            block_hash: block.hash(),
            tx_hash: Hash256::ZERO,
            pre_exec: false,
        };
        let mut overlay = self.state_store.new_overlay_db();
        let mut cache = CacheDb::new(&mut overlay);
        let table = self.get_global_params(&cfg, &mut cache)?;
        let mut gas_table = self.gas_table.write();
        for (name, value) in table {
            gas_table.insert(name, value);
        }
        Ok(())
    }

    /// Read the gas-table parameters through the global-params native
    /// contract. Missing or empty values are omitted silently.
    fn get_global_params(
        &self,
        cfg: &ExecConfig,
        cache: &mut CacheDb<'_>,
    ) -> Result<BTreeMap<String, u64>, LedgerError> {
        let names = [
            CONTRACT_CREATE_NAME,
            INVOKE_CODE_LEN_NAME,
            DEPLOY_CODE_LEN_NAME,
        ];
        let request = serialize_param_names(&names);
        let response = self.vm.native_call(
            cfg,
            cache,
            GLOBAL_PARAMS_ADDRESS,
            GET_GLOBAL_PARAM_METHOD,
            &request,
        )?;
        let params = Params::deserialize(&response)?;
        let mut table = BTreeMap::new();
        for name in names {
            match params.get(name) {
                Some(value) if !value.is_empty() => {
                    let parsed = value.parse::<u64>().map_err(|_| {
                        LedgerError::BadGlobalParam {
                            name: name.into(),
                            value: value.into(),
                        }
                    })?;
                    table.insert(name.to_string(), parsed);
                }
                _ => {}
            }
        }
        Ok(table)
    }

    /// No-commit simulation of `tx` at the pending height.
    pub fn pre_execute_contract(&self, tx: &Transaction) -> Result<PreExecResult, LedgerError> {
        let height = self.get_current_block_height();
        let cfg = ExecConfig {
            time: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as u32)
                .unwrap_or_default(),
            height: height + 1,
            block_hash: self.get_block_hash(height).unwrap_or(Hash256::ZERO),
            tx_hash: tx.hash(),
            pre_exec: true,
        };

        let mut overlay = self.state_store.new_overlay_db();
        let mut cache = CacheDb::new(&mut overlay);
        let pre_gas = self.get_global_params(&cfg, &mut cache)?;

        match &tx.payload {
            crate::block::TxPayload::Invoke(invoke) => {
                let len_factor = pre_gas.get(INVOKE_CODE_LEN_NAME).copied().unwrap_or(0);
                let mut gas = u64::MAX - calc_gas_by_code_len(invoke.code.len(), len_factor);
                let mut notify = Vec::new();
                let result = self
                    .vm
                    .invoke(&cfg, &mut cache, &invoke.code, &mut gas, &mut notify)?;
                let gas_cost = (u64::MAX - gas).max(MIN_TRANSACTION_GAS);
                Ok(PreExecResult {
                    state: ContractState::Success,
                    gas: gas_cost,
                    result: Some(to_lower_hex(&result)),
                    notify,
                })
            }
            crate::block::TxPayload::Deploy(deploy) => {
                let create_gas = pre_gas.get(CONTRACT_CREATE_NAME).copied().unwrap_or(0);
                let len_factor = pre_gas.get(DEPLOY_CODE_LEN_NAME).copied().unwrap_or(0);
                Ok(PreExecResult {
                    state: ContractState::Success,
                    gas: create_gas
                        .saturating_add(calc_gas_by_code_len(deploy.code.len(), len_factor)),
                    result: None,
                    notify: Vec::new(),
                })
            }
            crate::block::TxPayload::Opaque(_) => Err(VmError::NotExecutable.into()),
        }
    }

    // ── read path ──────────────────────────────────────────────────────

    pub fn get_current_block(&self) -> (u32, Hash256) {
        let st = self.state.read();
        (st.curr_block_height, st.curr_block_hash)
    }

    pub fn get_current_block_hash(&self) -> Hash256 {
        self.state.read().curr_block_hash
    }

    pub fn get_current_block_height(&self) -> u32 {
        self.state.read().curr_block_height
    }

    /// Highest admitted header height; usually ahead of the block height
    /// while syncing.
    pub fn get_current_header_height(&self) -> u32 {
        let st = self.state.read();
        match st.header_index.len() as u32 {
            0 => 0,
            size => size - 1,
        }
    }

    pub fn get_current_header_hash(&self) -> Hash256 {
        let st = self.state.read();
        match st.header_index.len() as u32 {
            0 => Hash256::ZERO,
            size => st.header_index.get(&(size - 1)).copied().unwrap_or(Hash256::ZERO),
        }
    }

    pub fn get_block_hash(&self, height: u32) -> Option<Hash256> {
        self.state.read().header_index.get(&height).copied()
    }

    /// Cached header if the block is not yet persisted, stored one
    /// otherwise. `Ok(None)` when the hash is unknown.
    pub fn get_header_by_hash(&self, hash: &Hash256) -> Result<Option<Header>, LedgerError> {
        if let Some(header) = self.state.read().header_cache.get(hash) {
            return Ok(Some(header.clone()));
        }
        Ok(self.block_store.get_header(hash)?)
    }

    pub fn get_header_by_height(&self, height: u32) -> Result<Option<Header>, LedgerError> {
        match self.get_block_hash(height) {
            Some(hash) => self.get_header_by_hash(&hash),
            None => Ok(None),
        }
    }

    pub fn get_block_by_hash(&self, hash: &Hash256) -> Result<Option<Block>, LedgerError> {
        Ok(self.block_store.get_block(hash)?)
    }

    pub fn get_block_by_height(&self, height: u32) -> Result<Option<Block>, LedgerError> {
        match self.get_block_hash(height) {
            Some(hash) => self.get_block_by_hash(&hash),
            None => Ok(None),
        }
    }

    /// Transaction plus the height of its including block.
    pub fn get_transaction(
        &self,
        tx_hash: &Hash256,
    ) -> Result<Option<(Transaction, u32)>, LedgerError> {
        Ok(self
            .block_store
            .get_transaction(tx_hash)?
            .map(|(height, tx)| (tx, height)))
    }

    pub fn is_contain_block(&self, hash: &Hash256) -> Result<bool, LedgerError> {
        Ok(self.block_store.contain_block(hash)?)
    }

    pub fn is_contain_transaction(&self, tx_hash: &Hash256) -> Result<bool, LedgerError> {
        Ok(self.block_store.contain_transaction(tx_hash)?)
    }

    pub fn get_sys_fee_amount(&self, hash: &Hash256) -> Result<Option<u64>, LedgerError> {
        Ok(self.block_store.get_sys_fee_amount(hash)?)
    }

    pub fn get_bookkeeper_state(&self) -> Result<Option<BookkeeperState>, LedgerError> {
        Ok(self.state_store.get_bookkeeper_state()?)
    }

    pub fn get_merkle_proof(
        &self,
        proof_height: u32,
        root_height: u32,
    ) -> Result<Vec<Hash256>, LedgerError> {
        Ok(self.state_store.get_merkle_proof(proof_height, root_height)?)
    }

    /// Root of the block-root tree after a hypothetical append of
    /// `tx_root`.
    pub fn get_block_root_with_new_tx_root(&self, tx_root: Hash256) -> Hash256 {
        self.state_store.get_block_root_with_new_tx_root(tx_root)
    }

    pub fn get_contract_state(
        &self,
        addr: &Address,
    ) -> Result<Option<crate::block::DeployCode>, LedgerError> {
        Ok(self.state_store.get_contract_state(addr)?)
    }

    pub fn get_storage_item(&self, key: &StorageKey) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.state_store.get_storage_item(key)?)
    }

    pub fn get_event_notify_by_tx(
        &self,
        tx_hash: &Hash256,
    ) -> Result<Option<ExecuteNotify>, LedgerError> {
        Ok(self.event_store.get_event_notify_by_tx(tx_hash)?)
    }

    pub fn get_event_notify_by_block(
        &self,
        height: u32,
    ) -> Result<Option<Vec<ExecuteNotify>>, LedgerError> {
        Ok(self.event_store.get_event_notify_by_block(height)?)
    }

    /// Close all three stores. Every store is attempted; the first error
    /// is reported.
    pub fn close(&self) -> Result<(), LedgerError> {
        let block = self.block_store.close();
        let state = self.state_store.close();
        let event = self.event_store.close();
        block?;
        state?;
        event?;
        Ok(())
    }
}
