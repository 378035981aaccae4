// crates/ledger/tests/support/mod.rs
#![allow(dead_code)]

use ed25519_dalek::{Signer, SigningKey};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use stele_ledger::codec::{read_string, read_var_uint, Params};
use stele_ledger::contract::{
    GET_GLOBAL_PARAM_METHOD, GLOBAL_PARAMS_ADDRESS,
};
use stele_ledger::multisig::quorum;
use stele_ledger::vbft::{ChainConfig, VbftBlockInfo, VbftPeerInfo};
use stele_ledger::{
    Address, Block, CacheDb, ConsensusType, ContractVm, DeployCode, ExecConfig, Hash256, Header,
    InvokeCode, Ledger, LedgerConfig, LedgerEventPublisher, NotifyEventInfo, PublicKey,
    Transaction, TxPayload, VmError,
};

/// Address the stub VM writes contract storage under.
pub const STUB_CONTRACT: Address = Address([0xee; 20]);

/// Flat gas the stub VM burns per invoke.
pub const STUB_INVOKE_GAS: u64 = 600;

/// Deterministic stand-in for the smart-contract VM.
///
/// Invoke opcodes (first code byte):
///   0x00: echo the rest of the code as the result
///   0x01: `[0x01, klen, key.., value..]` writes a storage item under
///         `STUB_CONTRACT` and emits one notify event
///   0x02: fault
/// `native_call` serves `getGlobalParam` from a fixed parameter table.
pub struct StubVm {
    pub params: BTreeMap<String, String>,
}

impl Default for StubVm {
    fn default() -> Self {
        let mut params = BTreeMap::new();
        params.insert("contract.create".to_string(), "500000".to_string());
        params.insert("invoke.codeLen".to_string(), "20000".to_string());
        params.insert("deploy.codeLen".to_string(), "10000".to_string());
        Self { params }
    }
}

impl ContractVm for StubVm {
    fn invoke(
        &self,
        _cfg: &ExecConfig,
        cache: &mut CacheDb<'_>,
        code: &[u8],
        gas: &mut u64,
        notify: &mut Vec<NotifyEventInfo>,
    ) -> Result<Vec<u8>, VmError> {
        if *gas < STUB_INVOKE_GAS {
            return Err(VmError::OutOfGas);
        }
        *gas -= STUB_INVOKE_GAS;
        match code.first() {
            Some(0x00) => Ok(code[1..].to_vec()),
            Some(0x01) => {
                let klen = *code.get(1).ok_or_else(|| VmError::Fault("short code".into()))?
                    as usize;
                if code.len() < 2 + klen {
                    return Err(VmError::Fault("short code".into()));
                }
                let key = code[2..2 + klen].to_vec();
                let value = code[2 + klen..].to_vec();
                cache.put_storage(
                    &stele_ledger::StorageKey {
                        contract: STUB_CONTRACT,
                        key,
                    },
                    &value,
                );
                notify.push(NotifyEventInfo {
                    contract: STUB_CONTRACT,
                    states: value.clone(),
                });
                Ok(value)
            }
            Some(0x02) => Err(VmError::Fault("assertion failed".into())),
            _ => Err(VmError::Fault("bad opcode".into())),
        }
    }

    fn native_call(
        &self,
        _cfg: &ExecConfig,
        _cache: &mut CacheDb<'_>,
        contract: Address,
        method: &str,
        args: &[u8],
    ) -> Result<Vec<u8>, VmError> {
        if contract != GLOBAL_PARAMS_ADDRESS {
            return Err(VmError::UnknownNative(contract));
        }
        if method != GET_GLOBAL_PARAM_METHOD {
            return Err(VmError::UnknownMethod(method.to_string()));
        }
        let mut input = args;
        let count =
            read_var_uint(&mut input).map_err(|e| VmError::Fault(e.to_string()))?;
        let mut out = Vec::new();
        for _ in 0..count {
            let name = read_string(&mut input).map_err(|e| VmError::Fault(e.to_string()))?;
            if let Some(value) = self.params.get(&name) {
                out.push((name, value.clone()));
            }
        }
        Ok(Params(out).serialize())
    }
}

/// A signing committee with deterministic keys.
pub struct Committee {
    pub keys: Vec<SigningKey>,
    pub pubs: Vec<PublicKey>,
}

impl Committee {
    /// Keys seeded from `seed_base + i`; stable across runs.
    pub fn new(n: usize, seed_base: u8) -> Committee {
        let keys: Vec<SigningKey> = (0..n)
            .map(|i| SigningKey::from_bytes(&[seed_base + i as u8; 32]))
            .collect();
        let pubs = keys
            .iter()
            .map(|k| PublicKey::from(&k.verifying_key()))
            .collect();
        Committee { keys, pubs }
    }

    pub fn address(&self) -> Address {
        Address::from_bookkeepers(&self.pubs)
    }

    pub fn quorum(&self) -> usize {
        quorum(self.pubs.len())
    }

    /// Stamp the committee onto the header and sign with the first
    /// `signers` keys.
    pub fn sign_header(&self, header: &mut Header, signers: usize) {
        header.bookkeepers = self.pubs.clone();
        let hash = header.hash();
        header.sig_data = self
            .keys
            .iter()
            .take(signers)
            .map(|k| k.sign(&hash.0).to_bytes().to_vec())
            .collect();
    }
}

/// JSON consensus payload carrying this committee as the new chain config.
pub fn vbft_config_payload(pubs: &[PublicKey], last_config_block_num: u32) -> Vec<u8> {
    let info = VbftBlockInfo {
        proposer: 0,
        last_config_block_num,
        new_chain_config: Some(ChainConfig {
            peers: pubs
                .iter()
                .enumerate()
                .map(|(i, pk)| VbftPeerInfo {
                    index: i as u32 + 1,
                    id: pk.peer_id(),
                })
                .collect(),
        }),
    };
    serde_json::to_vec(&info).expect("payload encode")
}

/// JSON consensus payload pointing back at an earlier config block.
pub fn vbft_plain_payload(last_config_block_num: u32) -> Vec<u8> {
    let info = VbftBlockInfo {
        proposer: 0,
        last_config_block_num,
        new_chain_config: None,
    };
    serde_json::to_vec(&info).expect("payload encode")
}

pub fn genesis_block(committee: &Committee, consensus_payload: Vec<u8>) -> Block {
    Block {
        header: Header {
            version: 0,
            prev_block_hash: Hash256::ZERO,
            transactions_root: Block::compute_transactions_root(&[]),
            timestamp: 1_000,
            height: 0,
            consensus_payload,
            next_bookkeeper: committee.address(),
            bookkeepers: Vec::new(),
            sig_data: Vec::new(),
        },
        transactions: Vec::new(),
    }
}

/// Next block in the chain, signed by `signers` members of `committee`.
pub fn next_block(
    prev: &Header,
    committee: &Committee,
    transactions: Vec<Transaction>,
    consensus_payload: Vec<u8>,
    signers: usize,
) -> Block {
    let mut header = Header {
        version: 0,
        prev_block_hash: prev.hash(),
        transactions_root: Block::compute_transactions_root(&transactions),
        timestamp: prev.timestamp + 1,
        height: prev.height + 1,
        consensus_payload,
        next_bookkeeper: committee.address(),
        bookkeepers: Vec::new(),
        sig_data: Vec::new(),
    };
    committee.sign_header(&mut header, signers);
    Block {
        header,
        transactions,
    }
}

pub fn storage_tx(nonce: u32, key: &[u8], value: &[u8]) -> Transaction {
    let mut code = vec![0x01, key.len() as u8];
    code.extend_from_slice(key);
    code.extend_from_slice(value);
    Transaction {
        version: 0,
        nonce,
        gas_price: 1,
        gas_limit: 100_000,
        payer: Address::ZERO,
        payload: TxPayload::Invoke(InvokeCode { code }),
    }
}

pub fn faulty_tx(nonce: u32) -> Transaction {
    Transaction {
        version: 0,
        nonce,
        gas_price: 1,
        gas_limit: 100_000,
        payer: Address::ZERO,
        payload: TxPayload::Invoke(InvokeCode { code: vec![0x02] }),
    }
}

pub fn deploy_tx(nonce: u32, code: Vec<u8>) -> Transaction {
    Transaction {
        version: 0,
        nonce,
        gas_price: 1,
        gas_limit: 100_000,
        payer: Address::ZERO,
        payload: TxPayload::Deploy(DeployCode {
            code,
            name: "example".into(),
            version: "1.0".into(),
            author: "tester".into(),
            email: "tester@example.com".into(),
            description: "test contract".into(),
        }),
    }
}

pub fn opaque_tx(nonce: u32) -> Transaction {
    Transaction {
        version: 0,
        nonce,
        gas_price: 1,
        gas_limit: 100_000,
        payer: Address::ZERO,
        payload: TxPayload::Opaque(vec![0xaa]),
    }
}

pub fn open_ledger(
    data_dir: &Path,
    consensus: ConsensusType,
) -> (Ledger, Arc<LedgerEventPublisher>) {
    let publisher = Arc::new(LedgerEventPublisher::new());
    let ledger = Ledger::open(
        data_dir,
        LedgerConfig { consensus },
        Arc::new(StubVm::default()),
        Some(Arc::clone(&publisher)),
    )
    .expect("open ledger");
    (ledger, publisher)
}
