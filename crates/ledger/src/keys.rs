// crates/ledger/src/keys.rs

use crate::hash::to_lower_hex;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PUBLIC_KEY_LEN: usize = 32;

/// Raw ed25519 verifying-key bytes of a bookkeeper.
///
/// Kept as bytes so the type is `Copy`, orderable and serializable; the
/// dalek key is materialized only at verification time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Lower-hex identity string, used as the peer id in chain configs.
    pub fn peer_id(&self) -> String {
        to_lower_hex(&self.0)
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, ed25519_dalek::SignatureError> {
        VerifyingKey::from_bytes(&self.0)
    }
}

impl From<&VerifyingKey> for PublicKey {
    fn from(vk: &VerifyingKey) -> Self {
        PublicKey(vk.to_bytes())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.peer_id())
    }
}

/// Sort keys by raw bytes ascending. Bookkeeper sets are kept in this
/// canonical order everywhere they are stored or hashed.
pub fn sort_public_keys(mut keys: Vec<PublicKey>) -> Vec<PublicKey> {
    keys.sort();
    keys
}
