// crates/ledger/src/block.rs

use crate::address::Address;
use crate::hash::Hash256;
use crate::keys::PublicKey;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// Block header. `hash()` covers every field except the signing material
/// (`bookkeepers`, `sig_data`), so the identity hash doubles as the
/// multisig message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    pub prev_block_hash: Hash256,
    pub transactions_root: Hash256,
    /// Seconds; strictly increasing along the chain.
    pub timestamp: u32,
    pub height: u32,
    /// Opaque consensus payload; VBFT encodes a JSON `VbftBlockInfo` here.
    pub consensus_payload: Vec<u8>,
    /// Signer program address expected for the *next* header (non-VBFT).
    pub next_bookkeeper: Address,
    /// Keys that signed this header.
    pub bookkeepers: Vec<PublicKey>,
    /// Detached multisig shares over `hash()`.
    pub sig_data: Vec<Vec<u8>>,
}

impl Header {
    pub fn hash(&self) -> Hash256 {
        header_hash(self)
    }
}

/// Deterministic header hash (domain-separated, signing fields excluded).
pub fn header_hash(h: &Header) -> Hash256 {
    let mut hasher = Sha3_256::new();
    hasher.update(b"STELE-HDR\0");
    hasher.update(h.version.to_le_bytes());
    hasher.update(h.prev_block_hash.0);
    hasher.update(h.transactions_root.0);
    hasher.update(h.timestamp.to_le_bytes());
    hasher.update(h.height.to_le_bytes());
    hasher.update((h.consensus_payload.len() as u64).to_le_bytes());
    hasher.update(&h.consensus_payload);
    hasher.update(h.next_bookkeeper.0);
    let out = hasher.finalize();
    let mut h32 = [0u8; 32];
    h32.copy_from_slice(&out);
    Hash256(h32)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    Deploy,
    Invoke,
    /// Carried in blocks, no state effect.
    Opaque,
}

/// Contract deployment payload: code plus descriptive metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployCode {
    pub code: Vec<u8>,
    pub name: String,
    pub version: String,
    pub author: String,
    pub email: String,
    pub description: String,
}

impl DeployCode {
    /// Deployed contracts live at the digest address of their code.
    pub fn address(&self) -> Address {
        let mut hasher = Sha3_256::new();
        hasher.update(b"stele.addr.contract.v1\0");
        hasher.update(&self.code);
        let out = hasher.finalize();
        let mut a = [0u8; crate::address::ADDR_LEN];
        a.copy_from_slice(&out[..crate::address::ADDR_LEN]);
        Address(a)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeCode {
    pub code: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPayload {
    Deploy(DeployCode),
    Invoke(InvokeCode),
    Opaque(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub nonce: u32,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub payer: Address,
    pub payload: TxPayload,
}

impl Transaction {
    pub fn tx_type(&self) -> TxType {
        match self.payload {
            TxPayload::Deploy(_) => TxType::Deploy,
            TxPayload::Invoke(_) => TxType::Invoke,
            TxPayload::Opaque(_) => TxType::Opaque,
        }
    }

    pub fn hash(&self) -> Hash256 {
        let bytes = bincode::serialize(self).expect("transaction encode");
        Hash256::digest(b"STELE-TX\0", &bytes)
    }

    /// Declared fee: price times limit, saturating.
    pub fn fee(&self) -> u64 {
        self.gas_price.saturating_mul(self.gas_limit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    #[inline]
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Root over the ordered transaction hashes; what `transactions_root`
    /// is expected to carry.
    pub fn compute_transactions_root(txs: &[Transaction]) -> Hash256 {
        let mut hasher = Sha3_256::new();
        hasher.update(b"STELE-TXROOT\0");
        for tx in txs {
            hasher.update(tx.hash().0);
        }
        let out = hasher.finalize();
        let mut h = [0u8; 32];
        h.copy_from_slice(&out);
        Hash256(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            version: 0,
            prev_block_hash: Hash256::ZERO,
            transactions_root: Hash256::ZERO,
            timestamp: 1,
            height: 0,
            consensus_payload: Vec::new(),
            next_bookkeeper: Address::ZERO,
            bookkeepers: Vec::new(),
            sig_data: Vec::new(),
        }
    }

    #[test]
    fn header_hash_ignores_signing_fields() {
        let mut a = sample_header();
        let mut b = sample_header();
        b.bookkeepers = vec![PublicKey([9u8; 32])];
        b.sig_data = vec![vec![1, 2, 3]];
        assert_eq!(a.hash(), b.hash());

        a.timestamp = 2;
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn tx_hash_changes_with_payload() {
        let mut tx = Transaction {
            version: 0,
            nonce: 0,
            gas_price: 0,
            gas_limit: 0,
            payer: Address::ZERO,
            payload: TxPayload::Invoke(InvokeCode { code: vec![1] }),
        };
        let h1 = tx.hash();
        tx.payload = TxPayload::Invoke(InvokeCode { code: vec![2] });
        assert_ne!(h1, tx.hash());
    }
}
