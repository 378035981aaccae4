// crates/ledger/src/multisig.rs
//! Threshold multi-signature verification over header hashes.
//!
//! A header carries the bookkeeper keys that signed it plus a list of
//! detached signature shares. Verification succeeds when at least `m`
//! distinct keys have produced a valid share, `m = n - (n - 1) / 3`.

use crate::keys::PublicKey;
use ed25519_dalek::{Signature, Verifier};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MultisigError {
    #[error("malformed bookkeeper public key")]
    BadPublicKey,
    #[error("malformed signature share")]
    BadSignature,
    #[error("signature share matches no unused bookkeeper key")]
    UnmatchedSignature,
    #[error("{got} signature shares for {keys} keys")]
    TooManySignatures { got: usize, keys: usize },
    #[error("{got} valid signatures, {need} required")]
    BelowThreshold { got: usize, need: usize },
}

/// BFT quorum for `n` signers.
#[inline]
pub fn quorum(n: usize) -> usize {
    n - (n - 1) / 3
}

/// Verify that `sig_data` contains at least `m` valid shares over `data`,
/// each from a distinct key in `keys`.
pub fn verify_multi_signature(
    data: &[u8],
    keys: &[PublicKey],
    m: usize,
    sig_data: &[Vec<u8>],
) -> Result<(), MultisigError> {
    if sig_data.len() > keys.len() {
        return Err(MultisigError::TooManySignatures {
            got: sig_data.len(),
            keys: keys.len(),
        });
    }

    let mut used = vec![false; keys.len()];
    let mut valid = 0usize;
    for raw in sig_data {
        let sig = Signature::from_slice(raw).map_err(|_| MultisigError::BadSignature)?;
        let mut matched = false;
        for (i, key) in keys.iter().enumerate() {
            if used[i] {
                continue;
            }
            let vk = key
                .verifying_key()
                .map_err(|_| MultisigError::BadPublicKey)?;
            if vk.verify(data, &sig).is_ok() {
                used[i] = true;
                matched = true;
                valid += 1;
                break;
            }
        }
        if !matched {
            return Err(MultisigError::UnmatchedSignature);
        }
    }

    if valid < m {
        return Err(MultisigError::BelowThreshold { got: valid, need: m });
    }
    Ok(())
}
