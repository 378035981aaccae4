// crates/ledger/src/vbft.rs
//! VBFT consensus-payload parsing.
//!
//! Headers carry an opaque payload; under VBFT it is a JSON-encoded
//! [`VbftBlockInfo`]. A block whose info carries a `new_chain_config`
//! redefines the live peer set from that height on.

use crate::block::Header;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VbftError {
    #[error("malformed consensus payload at height {height}: {source}")]
    Payload {
        height: u32,
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VbftPeerInfo {
    pub index: u32,
    pub id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub peers: Vec<VbftPeerInfo>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VbftBlockInfo {
    #[serde(default)]
    pub proposer: u32,
    #[serde(default)]
    pub last_config_block_num: u32,
    #[serde(default)]
    pub new_chain_config: Option<ChainConfig>,
}

/// Parse the header's consensus payload. An empty payload decodes to the
/// default info (no new config, config block 0).
pub fn vbft_block_info(header: &Header) -> Result<VbftBlockInfo, VbftError> {
    if header.consensus_payload.is_empty() {
        return Ok(VbftBlockInfo::default());
    }
    serde_json::from_slice(&header.consensus_payload).map_err(|source| VbftError::Payload {
        height: header.height,
        source,
    })
}

/// `peer id -> peer index` map used by header verification.
pub fn peer_map(cfg: &ChainConfig) -> HashMap<String, u32> {
    cfg.peers.iter().map(|p| (p.id.clone(), p.index)).collect()
}
