// crates/ledger/src/address.rs

use crate::hash::to_lower_hex;
use crate::keys::{sort_public_keys, PublicKey};
use crate::multisig::quorum;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;

pub const ADDR_LEN: usize = 20;

/// 20-byte account / contract address.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDR_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDR_LEN]);

    #[inline]
    pub fn as_bytes(&self) -> &[u8; ADDR_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        to_lower_hex(&self.0)
    }

    /// Address of a single signer: first 20 bytes of the key digest.
    pub fn from_pubkey(pk: &PublicKey) -> Address {
        first20(b"stele.addr.key.v1\0", std::iter::once(pk), 1)
    }

    /// Address of the bookkeeper multisig program: threshold plus the
    /// canonically sorted keys. A single key degenerates to `from_pubkey`.
    pub fn from_bookkeepers(keys: &[PublicKey]) -> Address {
        if keys.len() == 1 {
            return Address::from_pubkey(&keys[0]);
        }
        let sorted = sort_public_keys(keys.to_vec());
        let m = quorum(sorted.len());
        first20(b"stele.addr.multisig.v1\0", sorted.iter(), m as u16)
    }
}

fn first20<'a>(domain: &[u8], keys: impl Iterator<Item = &'a PublicKey>, m: u16) -> Address {
    let mut hasher = Sha3_256::new();
    hasher.update(domain);
    hasher.update(m.to_le_bytes());
    for key in keys {
        hasher.update(key.0);
    }
    let out = hasher.finalize();
    let mut a = [0u8; ADDR_LEN];
    a.copy_from_slice(&out[..ADDR_LEN]);
    Address(a)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}
