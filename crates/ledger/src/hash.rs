// crates/ledger/src/hash.rs

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;

pub const HASH_LEN: usize = 32;

/// 256-bit hash used for block, transaction and merkle-node identities.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; HASH_LEN]);

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        to_lower_hex(&self.0)
    }

    /// Domain-separated Sha3-256 over `data`.
    pub fn digest(domain: &[u8], data: &[u8]) -> Hash256 {
        let mut hasher = Sha3_256::new();
        hasher.update(domain);
        hasher.update(data);
        let out = hasher.finalize();
        let mut h = [0u8; HASH_LEN];
        h.copy_from_slice(&out);
        Hash256(h)
    }
}

impl From<[u8; HASH_LEN]> for Hash256 {
    fn from(b: [u8; HASH_LEN]) -> Self {
        Hash256(b)
    }
}

impl From<Hash256> for [u8; HASH_LEN] {
    fn from(h: Hash256) -> [u8; HASH_LEN] {
        h.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

// helper: lower-hex encode bytes without adding a new dependency
pub fn to_lower_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX[(b >> 4) as usize] as char);
        s.push(HEX[(b & 0x0f) as usize] as char);
    }
    s
}
