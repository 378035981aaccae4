//! Ledger storage engine for the stele permissioned chain.
//!
//! The [`Ledger`] coordinator persists the canonical chain across three
//! stores — blocks, contract state, and execution events — one block at a
//! time, recovering from partial crashes. Headers can be admitted ahead of
//! their blocks during sync; under VBFT the verifying peer set rolls
//! forward at config blocks.
//!
//! The key-value backends, the contract VM and the event publisher are
//! owned by the caller: the VM and publisher are injected at
//! [`Ledger::open`], and all reads and writes flow through the store
//! contracts in this crate.

pub mod address;
pub mod block;
pub mod block_store;
pub mod bookkeeper;
pub mod codec;
pub mod config;
pub mod contract;
pub mod event_store;
pub mod events;
pub mod hash;
pub mod keys;
pub mod ledger_store;
pub mod merkle;
pub mod multisig;
pub mod overlay;
pub mod state_store;
pub mod store;
pub mod vbft;

pub use address::Address;
pub use block::{Block, DeployCode, Header, InvokeCode, Transaction, TxPayload, TxType};
pub use bookkeeper::BookkeeperState;
pub use config::{ConsensusType, LedgerConfig};
pub use contract::{
    ContractState, ContractVm, ExecConfig, ExecuteNotify, NotifyEventInfo, PreExecResult, VmError,
};
pub use events::{LedgerEventPublisher, SaveBlockCompleteMsg, TOPIC_SAVE_BLOCK_COMPLETE};
pub use hash::Hash256;
pub use keys::{sort_public_keys, PublicKey};
pub use ledger_store::{
    Ledger, LedgerError, VerifyError, HEADER_INDEX_BATCH_SIZE, SYSTEM_VERSION,
};
pub use overlay::{CacheDb, OverlayDb, StorageKey};
pub use store::StoreError;
