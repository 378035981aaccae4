// crates/ledger/tests/merkle_props.rs
//! Property tests for the compact merkle tree.

use proptest::prelude::*;
use stele_ledger::merkle::{root_from_proof, CompactMerkleTree};
use stele_ledger::Hash256;

fn leaf(i: u32) -> Hash256 {
    Hash256::digest(b"prop-leaf", &i.to_le_bytes())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_proof_of_every_version_verifies(n in 1u32..40) {
        let dir = tempfile::tempdir().unwrap();
        let mut tree =
            CompactMerkleTree::open(&dir.path().join("merkle_tree.db"), 0, Vec::new()).unwrap();
        for i in 0..n {
            tree.append(leaf(i)).unwrap();
        }

        for size in 1..=n {
            let mut expected = None;
            for index in 0..size {
                let path = tree.inclusion_proof(index, size).unwrap();
                let root = root_from_proof(leaf(index), index, size, &path).unwrap();
                match expected {
                    None => expected = Some(root),
                    Some(e) => prop_assert_eq!(e, root),
                }
            }
        }
    }

    #[test]
    fn speculative_root_equals_root_after_append(n in 0u32..40) {
        let dir = tempfile::tempdir().unwrap();
        let mut tree =
            CompactMerkleTree::open(&dir.path().join("merkle_tree.db"), 0, Vec::new()).unwrap();
        for i in 0..n {
            tree.append(leaf(i)).unwrap();
        }
        let speculative = tree.root_with_new_leaf(leaf(n));
        tree.append(leaf(n)).unwrap();
        prop_assert_eq!(speculative, tree.root());
    }

    #[test]
    fn tampered_leaf_fails_verification(n in 2u32..40, tweak in any::<u8>()) {
        let dir = tempfile::tempdir().unwrap();
        let mut tree =
            CompactMerkleTree::open(&dir.path().join("merkle_tree.db"), 0, Vec::new()).unwrap();
        for i in 0..n {
            tree.append(leaf(i)).unwrap();
        }
        let index = n / 2;
        let path = tree.inclusion_proof(index, n).unwrap();
        let honest = root_from_proof(leaf(index), index, n, &path).unwrap();

        let mut forged = leaf(index);
        forged.0[0] ^= tweak | 1; // always flips at least one bit
        let dishonest = root_from_proof(forged, index, n, &path).unwrap();
        prop_assert_ne!(honest, dishonest);
    }
}
