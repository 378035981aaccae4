// crates/ledger/src/bookkeeper.rs

use crate::keys::PublicKey;
use serde::{Deserialize, Serialize};

/// Current and scheduled bookkeeper committee, both kept in canonical
/// sorted order. Seeded at genesis, rotated only at config blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookkeeperState {
    pub curr_bookkeeper: Vec<PublicKey>,
    pub next_bookkeeper: Vec<PublicKey>,
}
